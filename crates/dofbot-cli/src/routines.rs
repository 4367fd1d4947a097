//! Demo routines
//!
//! Fixed motion sequences built only from the client's public operations.
//! Each routine checks the cancellation token between servo commands; a
//! command that has started always runs to completion.

use dofbot_core::protocol::{ArmError, ByteTransport, ServoProtocolClient};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const HOME: [u16; 6] = [90, 90, 90, 90, 90, 90];

/// Granularity of cancellable sleeps
const PAUSE_SLICE: Duration = Duration::from_millis(50);

/// One step of a scripted routine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Move one servo: id, angle, duration in ms
    Servo(u8, u16, u16),
    /// Move all six servos
    All([u16; 6], u16),
    /// Sound the buzzer for the given duration code
    Beep(u8),
    Silence,
    /// Wait, in milliseconds
    Pause(u64),
}

/// Sleep in short slices so a stop request is noticed quickly.
/// Returns false if the token was cancelled.
pub fn pause(token: &CancellationToken, duration: Duration) -> bool {
    let mut remaining = duration;
    while !remaining.is_zero() {
        if token.is_cancelled() {
            return false;
        }
        let slice = remaining.min(PAUSE_SLICE);
        std::thread::sleep(slice);
        remaining -= slice;
    }
    !token.is_cancelled()
}

/// Run `steps` in order. Returns Ok(false) if cancelled part way.
pub fn run_steps<T: ByteTransport>(
    arm: &mut ServoProtocolClient<T>,
    steps: &[Step],
    token: &CancellationToken,
) -> Result<bool, ArmError> {
    for step in steps {
        if token.is_cancelled() {
            return Ok(false);
        }
        match *step {
            Step::Servo(id, angle, time_ms) => arm.write_one(id, angle, time_ms)?,
            Step::All(angles, time_ms) => arm.write_all(angles, time_ms)?,
            Step::Beep(duration) => arm.buzzer_on(duration),
            Step::Silence => arm.buzzer_off(),
            Step::Pause(ms) => {
                if !pause(token, Duration::from_millis(ms)) {
                    return Ok(false);
                }
            }
        }
    }
    Ok(true)
}

/// Repeat `steps` until cancelled
pub fn run_loop<T: ByteTransport>(
    arm: &mut ServoProtocolClient<T>,
    steps: &[Step],
    token: &CancellationToken,
) -> Result<usize, ArmError> {
    let mut rounds = 0;
    while run_steps(arm, steps, token)? {
        rounds += 1;
        tracing::info!("Routine round {} complete", rounds);
    }
    Ok(rounds)
}

/// Return to the home pose
pub fn home_steps() -> Vec<Step> {
    vec![Step::All(HOME, 500), Step::Pause(1000)]
}

/// Left/right sweep of the base and elbow
pub fn sweep_steps() -> Vec<Step> {
    vec![
        Step::Servo(3, 0, 1000),
        Step::Pause(1),
        Step::Servo(4, 180, 1000),
        Step::Pause(1000),
        Step::Servo(1, 180, 500),
        Step::Pause(500),
        Step::Servo(1, 0, 1000),
        Step::Pause(1000),
        Step::All(HOME, 1000),
        Step::Pause(1500),
    ]
}

/// Compound motions of shoulder, elbow, wrist and gripper
pub fn dance_steps() -> Vec<Step> {
    const MOVE: u16 = 500;
    const SLOW: u16 = 1000;
    const BEAT: u64 = 500;
    const STEP: u64 = 1;

    let mut steps = Vec::new();
    let mut arm_pose = |s2: u16, s3: u16, s4: u16| {
        steps.extend([
            Step::Servo(2, s2, MOVE),
            Step::Pause(STEP),
            Step::Servo(3, s3, MOVE),
            Step::Pause(STEP),
            Step::Servo(4, s4, MOVE),
            Step::Pause(BEAT),
        ]);
    };
    arm_pose(60, 120, 60);
    arm_pose(45, 135, 45);
    arm_pose(60, 120, 60);
    arm_pose(90, 90, 90);
    arm_pose(100, 80, 80);
    arm_pose(120, 60, 60);
    arm_pose(135, 45, 45);
    arm_pose(90, 90, 90);

    for _ in 0..2 {
        steps.extend([
            Step::Servo(4, 20, MOVE),
            Step::Pause(STEP),
            Step::Servo(6, 150, MOVE),
            Step::Pause(BEAT),
            Step::Servo(4, 90, MOVE),
            Step::Pause(STEP),
            Step::Servo(6, 90, MOVE),
            Step::Pause(BEAT),
        ]);
    }

    steps.extend([
        Step::Servo(1, 0, MOVE),
        Step::Pause(STEP),
        Step::Servo(5, 0, MOVE),
        Step::Pause(BEAT),
        Step::Servo(3, 180, MOVE),
        Step::Pause(STEP),
        Step::Servo(4, 0, MOVE),
        Step::Pause(BEAT),
        Step::Servo(6, 180, MOVE),
        Step::Pause(BEAT),
        Step::Servo(6, 0, SLOW),
        Step::Pause(BEAT),
        Step::Servo(6, 90, SLOW),
        Step::Pause(STEP),
        Step::Servo(1, 90, MOVE),
        Step::Pause(STEP),
        Step::Servo(5, 90, MOVE),
        Step::Pause(BEAT),
        Step::Servo(3, 90, MOVE),
        Step::Pause(STEP),
        Step::Servo(4, 90, MOVE),
        Step::Pause(BEAT),
    ]);
    steps
}

/// Short, long and continuous beeps
pub fn beep_steps() -> Vec<Step> {
    vec![
        Step::Beep(1),
        Step::Pause(1000),
        Step::Beep(3),
        Step::Pause(1000),
        Step::Beep(dofbot_core::protocol::client::BUZZER_CONTINUOUS),
        Step::Pause(1000),
        Step::Silence,
        Step::Pause(1000),
    ]
}

/// Reading of one servo by the polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoReading {
    pub id: u8,
    pub ping: u8,
    pub angle: Option<u16>,
}

/// Ping and read servos 1-6 once, stopping early if cancelled
pub fn poll_servos<T: ByteTransport>(
    arm: &mut ServoProtocolClient<T>,
    token: &CancellationToken,
) -> Result<Vec<ServoReading>, ArmError> {
    let mut readings = Vec::with_capacity(6);
    for id in 1..=dofbot_core::angle::SERVO_COUNT {
        if token.is_cancelled() {
            break;
        }
        let ping = arm.ping(id)?;
        arm.set_torque(true);
        let angle = arm.read_angle(id)?;
        readings.push(ServoReading { id, ping, angle });
    }
    Ok(readings)
}
