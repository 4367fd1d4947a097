//! Serial port handling
//!
//! Provides low-level byte access to the arm controller's UART.

use serialport::{
    ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortInfo, SerialPortType,
    StopBits,
};
use std::collections::HashMap;
#[cfg(target_os = "linux")]
use std::fs;
use std::io::{self, Read, Write};
use std::time::Duration;

use super::{ArmError, ClientConfig, WriteMode, DEFAULT_BAUD_RATE, DEFAULT_BYTE_TIMEOUT_MS};

/// Byte-level link to the controller
///
/// The frame codec and the client only ever talk to the board through this
/// trait, so a scripted transport can stand in for the serial port.
pub trait ByteTransport {
    /// Write the whole buffer in a single call, returning the number of
    /// bytes the link accepted
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, ArmError>;

    /// Wait up to `timeout` for one byte; `None` on timeout, on a closed
    /// link and on I/O failure alike
    fn read_byte(&mut self, timeout: Duration) -> Option<u8>;

    /// Drop any bytes received but not yet read
    fn clear_input(&mut self) {}

    /// Release the link. Calling it again is a no-op.
    fn close(&mut self) {}
}

impl<T: ByteTransport + ?Sized> ByteTransport for Box<T> {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, ArmError> {
        (**self).write_bytes(data)
    }

    fn read_byte(&mut self, timeout: Duration) -> Option<u8> {
        (**self).read_byte(timeout)
    }

    fn clear_input(&mut self) {
        (**self).clear_input()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyUSB0" or "COM3")
    pub name: String,

    /// USB vendor ID (if USB device)
    pub vid: Option<u16>,

    /// USB product ID (if USB device)
    pub pid: Option<u16>,

    /// Product name (if available)
    pub product: Option<String>,
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        let (vid, pid, product) = match info.port_type {
            SerialPortType::UsbPort(usb_info) => {
                (Some(usb_info.vid), Some(usb_info.pid), usb_info.product)
            }
            _ => (None, None, None),
        };

        Self {
            name: info.port_name,
            vid,
            pid,
            product,
        }
    }
}

/// Sort key ranking the board's own adapters first: the `myserial` udev
/// alias, then USB-serial bridges (`*.usbserial-*`, ttyUSB*), then ttyACM*,
/// then everything else
fn port_sort_key(name: &str) -> (u8, usize, String) {
    let basename = name.rsplit('/').next().unwrap_or(name);
    if basename == "myserial" {
        return (0, 0, basename.to_string());
    }
    if let Some((_, rest)) = basename.split_once(".usbserial-") {
        let num = rest.parse::<usize>().unwrap_or(usize::MAX);
        return (1, num, basename.to_string());
    }
    if let Some(rest) = basename.strip_prefix("ttyUSB") {
        let num = rest.parse::<usize>().unwrap_or(usize::MAX);
        return (2, num, basename.to_string());
    }
    if let Some(rest) = basename.strip_prefix("ttyACM") {
        let num = rest.parse::<usize>().unwrap_or(usize::MAX);
        return (3, num, basename.to_string());
    }
    (4, 0, basename.to_string())
}

/// List all available serial ports, with /dev fallbacks and deterministic ordering
pub fn list_ports() -> Vec<PortInfo> {
    let mut map: HashMap<String, PortInfo> = HashMap::new();
    for info in serialport::available_ports().unwrap_or_default() {
        let p = PortInfo::from(info);
        map.entry(p.name.clone()).or_insert(p);
    }

    // Linux: USB adapters the enumeration API missed
    #[cfg(target_os = "linux")]
    if let Ok(entries) = fs::read_dir("/dev") {
        for entry in entries.flatten() {
            if let Some(fname) = entry.file_name().to_str() {
                let adapter = fname == "myserial"
                    || fname.starts_with("ttyUSB")
                    || fname.starts_with("ttyACM");
                if adapter {
                    let full = format!("/dev/{}", fname);
                    map.entry(full.clone()).or_insert_with(|| PortInfo {
                        name: full,
                        vid: None,
                        pid: None,
                        product: None,
                    });
                }
            }
        }
    }

    let mut v: Vec<PortInfo> = map.into_values().collect();
    v.sort_by_key(|p| port_sort_key(&p.name));
    v
}

/// Open a serial port configured for the controller: 8N1, no flow control,
/// raw byte mode
pub fn open_port(name: &str, baud_rate: Option<u32>) -> Result<Box<dyn SerialPort>, ArmError> {
    let baud = baud_rate.unwrap_or(DEFAULT_BAUD_RATE);

    serialport::new(name, baud)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(Duration::from_millis(DEFAULT_BYTE_TIMEOUT_MS))
        .open()
        .map_err(|e| ArmError::ConnectionFailed(format!("{}: {}", name, e)))
}

/// Apply the partial-write policy to the outcome of a single write
pub(crate) fn check_write(mode: WriteMode, written: usize, expected: usize) -> Result<usize, ArmError> {
    if written < expected {
        match mode {
            WriteMode::Lenient => {
                tracing::warn!("Only wrote {} of {} bytes", written, expected);
            }
            WriteMode::Strict => return Err(ArmError::ShortWrite { written, expected }),
        }
    }
    Ok(written)
}

/// Serial connection owned by one client
pub struct SerialTransport {
    port: Option<Box<dyn SerialPort>>,
    port_name: String,
    write_mode: WriteMode,
    /// Timeout currently programmed into the port
    timeout: Duration,
}

impl SerialTransport {
    /// Open `path` with the default configuration
    pub fn open(path: &str) -> Result<Self, ArmError> {
        Self::open_with(&ClientConfig::new(path))
    }

    /// Open and configure the port described by `config`, then wait for
    /// the link to settle
    pub fn open_with(config: &ClientConfig) -> Result<Self, ArmError> {
        let mut port = open_port(&config.port_name, Some(config.baud_rate))?;
        port.set_timeout(config.byte_timeout())
            .map_err(|e| ArmError::ConnectionFailed(e.to_string()))?;

        std::thread::sleep(config.settle_time());
        tracing::info!("Serial port {} opened", config.port_name);

        Ok(Self {
            port: Some(port),
            port_name: config.port_name.clone(),
            write_mode: config.write_mode,
            timeout: config.byte_timeout(),
        })
    }
}

impl ByteTransport for SerialTransport {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, ArmError> {
        let port = self.port.as_mut().ok_or(ArmError::NotConnected)?;
        let written = port.write(data)?;
        tracing::debug!("tx {:02x?}", data);
        check_write(self.write_mode, written, data.len())
    }

    fn read_byte(&mut self, timeout: Duration) -> Option<u8> {
        let port = self.port.as_mut()?;
        if self.timeout != timeout {
            if let Err(e) = port.set_timeout(timeout) {
                tracing::warn!("Failed to set read timeout: {}", e);
                return None;
            }
            self.timeout = timeout;
        }

        let mut byte = [0u8; 1];
        match port.read(&mut byte) {
            Ok(1) => Some(byte[0]),
            Ok(_) => None,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => None,
            Err(e) => {
                tracing::warn!("Serial read error: {}", e);
                None
            }
        }
    }

    fn clear_input(&mut self) {
        if let Some(port) = self.port.as_mut() {
            if let Err(e) = port.clear(ClearBuffer::Input) {
                tracing::warn!("Failed to clear input buffer: {}", e);
            }
        }
    }

    fn close(&mut self) {
        if let Some(port) = self.port.take() {
            drop(port);
            tracing::info!("Serial port {} closed", self.port_name);
        }
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_ports() {
        // Only checks that enumeration doesn't panic
        let ports = list_ports();
        for port in &ports {
            println!("Found port: {} - {:?}", port.name, port.product);
        }
    }

    #[test]
    fn test_port_sorting() {
        let names = vec![
            "/dev/ttyUSB1",
            "/dev/ttyACM1",
            "/dev/ttyS0",
            "/dev/ttyUSB0",
            "/dev/tty.usbserial-2130",
            "/dev/myserial",
            "/dev/ttyACM0",
        ];
        let mut sorted: Vec<&str> = names.clone();
        sorted.sort_by_key(|n| port_sort_key(n));

        assert_eq!(
            sorted,
            vec![
                "/dev/myserial",
                "/dev/tty.usbserial-2130",
                "/dev/ttyUSB0",
                "/dev/ttyUSB1",
                "/dev/ttyACM0",
                "/dev/ttyACM1",
                "/dev/ttyS0",
            ]
        );
    }

    #[test]
    fn test_short_write_lenient() {
        assert_eq!(check_write(WriteMode::Lenient, 3, 9).unwrap(), 3);
        assert_eq!(check_write(WriteMode::Lenient, 9, 9).unwrap(), 9);
    }

    #[test]
    fn test_short_write_strict() {
        let err = check_write(WriteMode::Strict, 3, 9).unwrap_err();
        assert!(matches!(
            err,
            ArmError::ShortWrite {
                written: 3,
                expected: 9
            }
        ));
        assert!(check_write(WriteMode::Strict, 9, 9).is_ok());
    }

    #[test]
    fn test_open_missing_device() {
        let err = SerialTransport::open("/dev/definitely-not-a-dofbot").err().unwrap();
        assert!(matches!(err, ArmError::ConnectionFailed(_)));
    }
}
