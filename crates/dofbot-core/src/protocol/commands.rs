//! Protocol commands
//!
//! Command bytes understood by the expansion board and the reply types it
//! sends back.

use serde::{Deserialize, Serialize};

/// Commands sent to the expansion board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Query firmware version
    Version,

    /// Set the RGB LED colour
    SetRgb,

    /// Set the K1 button mode
    ButtonMode,

    /// Select the product colour preset
    ProductSelect,

    /// Reboot the driver board
    Reset,

    /// Sound the buzzer
    Buzzer,

    /// Move one arm servo (1-6)
    WriteServo(u8),

    /// Assign a new id to the attached bus servo
    SetServoId,

    /// Move an arbitrary bus servo (1-250)
    WriteAny,

    /// Torque on/off for all servos
    Torque,

    /// Read the state of the last mid-point offset calibration
    OffsetState,

    /// Store the current position as mid-point offset
    OffsetSwitch,

    /// Move all six arm servos at once
    WriteAll,

    /// Move all six arm servos at once, array form
    WriteAllSync,

    /// Start/stop the recorded action group
    ActionMode,

    /// Read the number of recorded actions
    ActionCount,

    /// Erase the recorded action group
    ClearActions,

    /// Record the current pose into the action group
    RecordAction,

    /// Play the speech module announcement
    Speak,

    /// Read the position of one arm servo (1-6)
    ReadPosition(u8),

    /// Read the position of an arbitrary bus servo
    ReadAny,

    /// Ping a bus servo
    Ping,

    /// Drive one PWM servo (1-6)
    PwmServo(u8),

    /// Drive all PWM servos
    PwmAll,

    /// Query a speech module entry
    AskSpeech(u8),
}

impl Command {
    /// Command byte as it appears on the wire
    pub fn byte(&self) -> u8 {
        match self {
            Command::Version => 0x01,
            Command::SetRgb => 0x02,
            Command::ButtonMode => 0x03,
            Command::ProductSelect => 0x04,
            Command::Reset => 0x05,
            Command::Buzzer => 0x06,
            Command::WriteServo(id) => 0x10 + id,
            Command::SetServoId => 0x18,
            Command::WriteAny => 0x19,
            Command::Torque => 0x1A,
            Command::OffsetState => 0x1B,
            Command::OffsetSwitch => 0x1C,
            Command::WriteAll => 0x1D,
            Command::WriteAllSync => 0x1E,
            Command::ActionMode => 0x20,
            Command::ActionCount => 0x22,
            Command::ClearActions => 0x23,
            Command::RecordAction => 0x24,
            Command::Speak => 0x2A,
            Command::ReadPosition(id) => 0x30 + id,
            Command::ReadAny => 0x37,
            Command::Ping => 0x38,
            Command::PwmServo(id) => 0x50 + id,
            Command::PwmAll => 0x57,
            Command::AskSpeech(id) => 0x60 + id,
        }
    }

    /// Reply type the board answers this command with, if any
    pub fn response(&self) -> Option<ResponseKind> {
        match self {
            Command::Version => Some(ResponseKind::Version),
            Command::ReadPosition(_) | Command::ReadAny => Some(ResponseKind::ServoPosition),
            Command::OffsetState => Some(ResponseKind::OffsetState),
            Command::ActionCount => Some(ResponseKind::ActionCount),
            Command::AskSpeech(_) => Some(ResponseKind::SpeechResult),
            // Ping replies are accepted whatever their type
            _ => None,
        }
    }
}

/// Type byte of a reply frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseKind {
    Version,
    ServoPosition,
    ActionCount,
    SpeechResult,
    OffsetState,
}

impl ResponseKind {
    pub fn byte(&self) -> u8 {
        match self {
            ResponseKind::Version => 0x01,
            ResponseKind::ServoPosition => 0x0A,
            ResponseKind::ActionCount => 0x22,
            ResponseKind::SpeechResult => 0x2A,
            ResponseKind::OffsetState => 0x33,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(ResponseKind::Version),
            0x0A => Some(ResponseKind::ServoPosition),
            0x22 => Some(ResponseKind::ActionCount),
            0x2A => Some(ResponseKind::SpeechResult),
            0x33 => Some(ResponseKind::OffsetState),
            _ => None,
        }
    }
}
