//! Servo client
//!
//! Public operation surface of the driver. Builds command frames, writes
//! them and, for queries, decodes the reply.
//!
//! Id and angle violations are returned as errors before any byte is sent.
//! Write failures on fire-and-forget commands are logged and swallowed, and
//! queries that get no usable reply degrade to `None` (or 0 for `ping`).

use serde::{Deserialize, Serialize};

use super::{
    decode, ArmError, ByteTransport, ClientConfig, Command, Frame, FrameBuilder, ReadTimeouts,
    ResponseKind, SerialTransport,
};
use crate::angle::{to_angle, to_position, SERVO_COUNT, STANDARD_RANGE};

/// Largest id a bus servo can carry
pub const MAX_BUS_SERVO_ID: u8 = 250;

/// Largest speech entry id; command bytes run from 0x60 up to 0xFF
pub const MAX_SPEECH_ID: u8 = 0xFF - 0x60;

/// Ping reply of a healthy servo
pub const PING_OK: u8 = 0xDA;

/// Buzzer duration that keeps it sounding until switched off
pub const BUZZER_CONTINUOUS: u8 = 0xFF;

/// Playback mode of the recorded action group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionMode {
    Stop = 0,
    Once = 1,
    Loop = 2,
}

/// Result of the last mid-point offset calibration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OffsetState {
    /// No servo with the requested id answered
    NotFound,
    Success,
    /// The current position is too far from the mid-point
    OutOfRange,
    Unknown(u8),
}

impl From<u8> for OffsetState {
    fn from(value: u8) -> Self {
        match value {
            0 => OffsetState::NotFound,
            1 => OffsetState::Success,
            2 => OffsetState::OutOfRange,
            other => OffsetState::Unknown(other),
        }
    }
}

/// Driver for the arm's expansion board
pub struct ServoProtocolClient<T: ByteTransport = SerialTransport> {
    transport: T,
    timeouts: ReadTimeouts,
    read_attempts: usize,
}

impl ServoProtocolClient<SerialTransport> {
    /// Open `path` with the default configuration
    pub fn open(path: &str) -> Result<Self, ArmError> {
        Self::connect(&ClientConfig::new(path))
    }

    /// Open the serial port described by `config`
    pub fn connect(config: &ClientConfig) -> Result<Self, ArmError> {
        let transport = SerialTransport::open_with(config)?;
        Ok(Self::with_transport(transport, config))
    }
}

impl<T: ByteTransport> ServoProtocolClient<T> {
    /// Drive an already opened transport
    pub fn with_transport(transport: T, config: &ClientConfig) -> Self {
        Self {
            transport,
            timeouts: ReadTimeouts {
                byte: config.byte_timeout(),
                overall: config.response_deadline(),
            },
            read_attempts: config.read_attempts.max(1),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Close the link; later commands fail to write and are logged
    pub fn close(&mut self) {
        self.transport.close();
    }

    /// Write a frame, logging rather than returning any failure
    fn send(&mut self, op: &str, frame: &[u8]) {
        if let Err(e) = self.transport.write_bytes(frame) {
            tracing::warn!("{} serial error: {}", op, e);
        }
    }

    /// Write a request and wait for one valid reply, retrying the whole
    /// exchange up to `attempts` times.
    ///
    /// Input left over from earlier exchanges is discarded before each write.
    /// With `kind` set, a reply of any other type counts as a failed attempt.
    fn query(
        &mut self,
        op: &str,
        frame: &[u8],
        attempts: usize,
        kind: Option<ResponseKind>,
    ) -> Option<Frame> {
        for attempt in 1..=attempts {
            self.transport.clear_input();
            if let Err(e) = self.transport.write_bytes(frame) {
                tracing::warn!("{} serial error: {}", op, e);
                return None;
            }
            let result = decode(&mut self.transport, self.timeouts).and_then(|reply| {
                match kind {
                    Some(kind) if reply.kind != kind.byte() => Err(ArmError::UnexpectedResponse {
                        expected: kind.byte(),
                        actual: reply.kind,
                    }),
                    _ => Ok(reply),
                }
            });
            match result {
                Ok(reply) => return Some(reply),
                Err(e) => tracing::debug!("{} attempt {}/{}: {}", op, attempt, attempts, e),
            }
        }
        None
    }

    /// [`query`](Self::query) with the configured retries and reply type
    fn query_kind(&mut self, op: &str, frame: &[u8], kind: ResponseKind) -> Option<Frame> {
        self.query(op, frame, self.read_attempts, Some(kind))
    }

    /// Move all six servos in one frame.
    ///
    /// Every angle is validated before anything is written, so a bad angle
    /// never leaves a partial command on the wire.
    pub fn write_all(&mut self, angles: [u16; 6], time_ms: u16) -> Result<(), ArmError> {
        let frame = six_servo_frame(Command::WriteAll, angles, time_ms)?;
        self.send("write_all", &frame);
        Ok(())
    }

    /// Like [`write_all`](Self::write_all), but sent as the board's array
    /// command (0x1E): same layout and validation
    pub fn write_all_sync(&mut self, angles: [u16; 6], time_ms: u16) -> Result<(), ArmError> {
        let frame = six_servo_frame(Command::WriteAllSync, angles, time_ms)?;
        self.send("write_all_sync", &frame);
        Ok(())
    }

    /// Move one servo; id 0 moves all six to the same angle
    pub fn write_one(&mut self, id: u8, angle: u16, time_ms: u16) -> Result<(), ArmError> {
        if id == 0 {
            return self.write_all([angle; 6], time_ms);
        }
        let position = to_position(id, angle)?;
        let frame = FrameBuilder::new(Command::WriteServo(id).byte())
            .u16_be(position)
            .u16_be(time_ms)
            .build();
        self.send("write_one", &frame);
        Ok(())
    }

    /// Torque on or off for every servo
    pub fn set_torque(&mut self, enabled: bool) {
        let frame = FrameBuilder::new(Command::Torque.byte())
            .byte(enabled as u8)
            .build();
        self.send("set_torque", &frame);
    }

    /// Ping a bus servo and return the first byte of its reply.
    ///
    /// 0 means no reply arrived in time; a reply whose first byte is 0
    /// looks exactly the same.
    pub fn ping(&mut self, id: u8) -> Result<u8, ArmError> {
        check_bus_id(id)?;
        let frame = FrameBuilder::new(Command::Ping.byte()).byte(id).build();
        let code = self
            .query("ping", &frame, 1, None)
            .and_then(|reply| reply.payload.first().copied())
            .unwrap_or(0);
        Ok(code)
    }

    /// Read the angle of arm servo `id` (1-6).
    ///
    /// `None` when no valid position report arrives, the report is malformed
    /// or the position maps outside the servo's range.
    pub fn read_angle(&mut self, id: u8) -> Result<Option<u16>, ArmError> {
        if !(1..=SERVO_COUNT).contains(&id) {
            return Err(ArmError::InvalidServoId {
                id,
                min: 1,
                max: SERVO_COUNT,
            });
        }
        let frame = FrameBuilder::new(Command::ReadPosition(id).byte()).build();
        let angle = self
            .query_kind("read_angle", &frame, ResponseKind::ServoPosition)
            .filter(|reply| reply.payload.len() >= 3)
            .and_then(|reply| reply.u16_be(0))
            .and_then(|position| to_angle(id, position));
        Ok(angle)
    }

    /// Sound the buzzer for `duration` (0 silences it, [`BUZZER_CONTINUOUS`]
    /// keeps it on)
    pub fn buzzer_on(&mut self, duration: u8) {
        let frame = FrameBuilder::new(Command::Buzzer.byte())
            .byte(duration)
            .build();
        self.send("buzzer_on", &frame);
    }

    pub fn buzzer_off(&mut self) {
        self.buzzer_on(0);
    }

    pub fn set_rgb(&mut self, red: u8, green: u8, blue: u8) {
        let frame = FrameBuilder::new(Command::SetRgb.byte())
            .bytes(&[red, green, blue])
            .build();
        self.send("set_rgb", &frame);
    }

    /// K1 button mode: 0 default, 1 learning
    pub fn set_button_mode(&mut self, mode: u8) {
        let frame = FrameBuilder::new(Command::ButtonMode.byte())
            .byte(mode)
            .build();
        self.send("set_button_mode", &frame);
    }

    pub fn select_product(&mut self, index: u8) {
        let frame = FrameBuilder::new(Command::ProductSelect.byte())
            .byte(index)
            .build();
        self.send("select_product", &frame);
    }

    pub fn reset_board(&mut self) {
        let frame = FrameBuilder::new(Command::Reset.byte()).byte(1).build();
        self.send("reset_board", &frame);
    }

    /// Give the single servo attached to the bus a new id
    pub fn set_servo_id(&mut self, id: u8) -> Result<(), ArmError> {
        check_bus_id(id)?;
        let frame = FrameBuilder::new(Command::SetServoId.byte())
            .byte(id)
            .build();
        self.send("set_servo_id", &frame);
        Ok(())
    }

    /// Move any bus servo (1-250) on the 0-180° scale, without inversion
    pub fn write_any(&mut self, id: u8, angle: u16, time_ms: u16) -> Result<(), ArmError> {
        check_bus_id(id)?;
        check_standard_angle(id, angle)?;
        let frame = FrameBuilder::new(Command::WriteAny.byte())
            .byte(id)
            .u16_be(STANDARD_RANGE.position_of(angle))
            .u16_be(time_ms)
            .build();
        self.send("write_any", &frame);
        Ok(())
    }

    /// Read any bus servo (1-250) on the 0-180° scale.
    ///
    /// This report carries the position low byte first.
    pub fn read_any(&mut self, id: u8) -> Result<Option<u16>, ArmError> {
        check_bus_id(id)?;
        let frame = FrameBuilder::new(Command::ReadAny.byte()).byte(id).build();
        let angle = self
            .query_kind("read_any", &frame, ResponseKind::ServoPosition)
            .and_then(|reply| match reply.payload.as_slice() {
                [low, high, ..] => Some(u16::from_le_bytes([*low, *high])),
                _ => None,
            })
            .and_then(|position| STANDARD_RANGE.angle_of(position));
        Ok(angle)
    }

    /// Drive a PWM servo header; id 0 drives all of them
    pub fn pwm_servo_write(&mut self, id: u8, angle: u16) -> Result<(), ArmError> {
        let command = match id {
            0 => Command::PwmAll,
            1..=SERVO_COUNT => Command::PwmServo(id),
            _ => {
                return Err(ArmError::InvalidServoId {
                    id,
                    min: 0,
                    max: SERVO_COUNT,
                })
            }
        };
        check_standard_angle(id, angle)?;
        let frame = FrameBuilder::new(command.byte())
            .byte(angle as u8)
            .build();
        self.send("pwm_servo_write", &frame);
        Ok(())
    }

    /// Store the current position of servo `id` as its mid-point; id 0
    /// restores the factory offsets
    pub fn offset_switch(&mut self, id: u8) -> Result<(), ArmError> {
        if id > SERVO_COUNT {
            return Err(ArmError::InvalidServoId {
                id,
                min: 0,
                max: SERVO_COUNT,
            });
        }
        let frame = FrameBuilder::new(Command::OffsetSwitch.byte())
            .byte(id)
            .build();
        self.send("offset_switch", &frame);
        Ok(())
    }

    pub fn offset_state(&mut self) -> Option<OffsetState> {
        let frame = FrameBuilder::new(Command::OffsetState.byte()).build();
        self.first_byte_of("offset_state", &frame, ResponseKind::OffsetState)
            .map(OffsetState::from)
    }

    /// Firmware version of the expansion board
    pub fn version(&mut self) -> Option<u8> {
        let frame = FrameBuilder::new(Command::Version.byte()).build();
        self.first_byte_of("version", &frame, ResponseKind::Version)
    }

    pub fn set_action_mode(&mut self, mode: ActionMode) {
        let frame = FrameBuilder::new(Command::ActionMode.byte())
            .byte(mode as u8)
            .build();
        self.send("set_action_mode", &frame);
    }

    /// Append the current pose to the action group (learning mode)
    pub fn record_action(&mut self) {
        let frame = FrameBuilder::new(Command::RecordAction.byte())
            .byte(1)
            .build();
        self.send("record_action", &frame);
    }

    pub fn action_count(&mut self) -> Option<u8> {
        let frame = FrameBuilder::new(Command::ActionCount.byte())
            .byte(1)
            .build();
        self.first_byte_of("action_count", &frame, ResponseKind::ActionCount)
    }

    pub fn clear_actions(&mut self) {
        let frame = FrameBuilder::new(Command::ClearActions.byte())
            .byte(1)
            .build();
        self.send("clear_actions", &frame);
    }

    /// Play the speech module's announcement
    pub fn speak(&mut self) {
        let frame = FrameBuilder::new(Command::Speak.byte()).build();
        self.send("speak", &frame);
    }

    /// Ask the speech module for entry `id` and return its result code
    pub fn ask_speech(&mut self, id: u8) -> Result<Option<u8>, ArmError> {
        if id > MAX_SPEECH_ID {
            return Err(ArmError::InvalidSpeechId {
                id,
                max: MAX_SPEECH_ID,
            });
        }
        let frame = FrameBuilder::new(Command::AskSpeech(id).byte()).build();
        Ok(self.first_byte_of("ask_speech", &frame, ResponseKind::SpeechResult))
    }

    fn first_byte_of(&mut self, op: &str, frame: &[u8], kind: ResponseKind) -> Option<u8> {
        self.query_kind(op, frame, kind)
            .and_then(|reply| reply.payload.first().copied())
    }
}

impl<T: ByteTransport> Drop for ServoProtocolClient<T> {
    fn drop(&mut self) {
        self.transport.close();
    }
}

/// Bulk frame carrying all six positions and the move time
fn six_servo_frame(
    command: Command,
    angles: [u16; 6],
    time_ms: u16,
) -> Result<Vec<u8>, ArmError> {
    let mut builder = FrameBuilder::new(command.byte());
    for (id, &degrees) in (1..=SERVO_COUNT).zip(angles.iter()) {
        builder = builder.u16_be(to_position(id, degrees)?);
    }
    Ok(builder.u16_be(time_ms).build())
}

fn check_bus_id(id: u8) -> Result<(), ArmError> {
    if id == 0 || id > MAX_BUS_SERVO_ID {
        return Err(ArmError::InvalidServoId {
            id,
            min: 1,
            max: MAX_BUS_SERVO_ID,
        });
    }
    Ok(())
}

fn check_standard_angle(id: u8, angle: u16) -> Result<(), ArmError> {
    if angle > STANDARD_RANGE.max_angle {
        return Err(ArmError::AngleOutOfRange {
            id,
            angle,
            max: STANDARD_RANGE.max_angle,
        });
    }
    Ok(())
}
