//! Protocol errors

use thiserror::Error;

/// Errors that can occur while talking to the arm controller
#[derive(Error, Debug)]
pub enum ArmError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Serial port is not open")]
    NotConnected,

    #[error("Servo ID {id} out of range ({min}-{max})")]
    InvalidServoId { id: u8, min: u8, max: u8 },

    #[error("Angle {angle} out of range for servo {id} (0-{max})")]
    AngleOutOfRange { id: u8, angle: u16, max: u16 },

    #[error("Speech entry {id} out of range (0-{max})")]
    InvalidSpeechId { id: u8, max: u8 },

    #[error("Short write: only wrote {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    #[error("Timed out waiting for a response frame")]
    Timeout,

    #[error("Invalid frame length byte: {0:#04x}")]
    InvalidLength(u8),

    #[error("Checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    #[error("Unexpected response type: expected {expected:#04x}, got {actual:#04x}")]
    UnexpectedResponse { expected: u8, actual: u8 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArmError {
    /// True for id/angle violations, which are rejected before any I/O
    pub fn is_range_error(&self) -> bool {
        matches!(
            self,
            ArmError::InvalidServoId { .. }
                | ArmError::AngleOutOfRange { .. }
                | ArmError::InvalidSpeechId { .. }
        )
    }

    /// True for framing problems that the driver recovers from locally
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            ArmError::Timeout
                | ArmError::InvalidLength(_)
                | ArmError::ChecksumMismatch { .. }
                | ArmError::UnexpectedResponse { .. }
        )
    }
}
