use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use dofbot_core::protocol::{list_ports, ClientConfig, ServoProtocolClient};

mod routines;

use routines::{ServoReading, Step};

const DEFAULT_PORT: &str = "/dev/tty.usbserial-2130";

/// Drive the Dofbot arm over its serial link
#[derive(Parser, Debug)]
#[command(name = "dofbot", version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Serial device connected to the arm
    #[arg(long, global = true)]
    port: Option<String>,

    /// Seconds to wait after connecting before sending commands
    #[arg(long, global = true, default_value_t = 0.1)]
    init_delay: f64,

    /// JSON client configuration; --port overrides its port_name
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Move a single servo (id 0 moves all six)
    Servo {
        #[arg(long)]
        id: u8,
        #[arg(long)]
        angle: u16,
        /// Movement time in milliseconds
        #[arg(long, default_value_t = 500)]
        time: u16,
    },
    /// Move all six servos, e.g. --angles 90,90,90,90,90,90
    All {
        #[arg(long, value_delimiter = ',', required = true)]
        angles: Vec<u16>,
        #[arg(long, default_value_t = 500)]
        time: u16,
    },
    /// Poll servos 1-6, printing ping response and angle
    Read,
    /// Continuous left/right sweep
    Sweep,
    /// Looping dance routine
    Dance,
    /// Buzzer demo
    Beep,
    /// List serial ports
    Ports,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(common: &CommonArgs) -> Result<ClientConfig> {
    let mut config = match &common.config {
        Some(path) => ClientConfig::from_json_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => ClientConfig::new(DEFAULT_PORT),
    };
    if let Some(port) = &common.port {
        config.port_name = port.clone();
    }
    if config.port_name.is_empty() {
        config.port_name = DEFAULT_PORT.to_string();
    }
    Ok(config)
}

fn stop_token() -> Result<CancellationToken> {
    let token = CancellationToken::new();
    let handler_token = token.clone();
    ctrlc::set_handler(move || {
        tracing::info!("Stop requested");
        handler_token.cancel();
    })
    .context("installing Ctrl+C handler")?;
    Ok(token)
}

fn print_readings(readings: &[ServoReading]) {
    for r in readings {
        let angle = r.angle.map(i32::from).unwrap_or(-1);
        println!("Servo {} ping: {:#04x}, angle: {}°", r.id, r.ping, angle);
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.common.verbose);

    if let Commands::Ports = cli.command {
        for port in list_ports() {
            match port.product {
                Some(product) => println!("{} ({})", port.name, product),
                None => println!("{}", port.name),
            }
        }
        return Ok(());
    }

    if !(cli.common.init_delay >= 0.0 && cli.common.init_delay.is_finite()) {
        bail!("--init-delay must be a non-negative number of seconds");
    }

    let config = load_config(&cli.common)?;
    let token = stop_token()?;
    let mut arm = ServoProtocolClient::connect(&config)
        .with_context(|| format!("opening {}", config.port_name))?;
    std::thread::sleep(Duration::from_secs_f64(cli.common.init_delay));

    match cli.command {
        Commands::Servo { id, angle, time } => arm.write_one(id, angle, time)?,
        Commands::All { angles, time } => {
            let angles: [u16; 6] = angles
                .try_into()
                .map_err(|_| anyhow::anyhow!("expected exactly six angles"))?;
            arm.write_all(angles, time)?;
        }
        Commands::Read => {
            while !token.is_cancelled() {
                print_readings(&routines::poll_servos(&mut arm, &token)?);
                routines::pause(&token, Duration::from_millis(100));
            }
        }
        Commands::Sweep => {
            if routines::run_steps(&mut arm, &routines::home_steps(), &token)? {
                println!("Running sweep. Press Ctrl+C to stop.");
                routines::run_loop(&mut arm, &routines::sweep_steps(), &token)?;
            }
        }
        Commands::Dance => {
            if routines::run_steps(&mut arm, &routines::home_steps(), &token)? {
                routines::run_loop(&mut arm, &routines::dance_steps(), &token)?;
            }
        }
        Commands::Beep => {
            let steps = routines::beep_steps();
            if !routines::run_steps(&mut arm, &steps, &token)? {
                // Never leave the buzzer sounding
                routines::run_steps(&mut arm, &[Step::Silence], &CancellationToken::new())?;
            }
        }
        Commands::Ports => {}
    }

    arm.close();
    println!("Program closed.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_all_angles() {
        let cli = Cli::try_parse_from([
            "dofbot",
            "--port",
            "/dev/ttyUSB0",
            "all",
            "--angles",
            "90,90,90,90,270,90",
            "--time",
            "1000",
        ])
        .unwrap();
        assert_eq!(cli.common.port.as_deref(), Some("/dev/ttyUSB0"));
        match cli.command {
            Commands::All { angles, time } => {
                assert_eq!(angles, vec![90, 90, 90, 90, 270, 90]);
                assert_eq!(time, 1000);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_rejects_negative_angle() {
        assert!(Cli::try_parse_from(["dofbot", "servo", "--id", "1", "--angle", "-5"]).is_err());
    }

    #[test]
    fn test_port_override() {
        let cli = Cli::try_parse_from(["dofbot", "read", "--port", "/dev/ttyACM0"]).unwrap();
        let config = load_config(&cli.common).unwrap();
        assert_eq!(config.port_name, "/dev/ttyACM0");

        let cli = Cli::try_parse_from(["dofbot", "read"]).unwrap();
        assert_eq!(load_config(&cli.common).unwrap().port_name, DEFAULT_PORT);
    }
}
