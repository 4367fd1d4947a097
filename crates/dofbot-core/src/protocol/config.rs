//! Client configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::{
    ArmError, DEFAULT_BAUD_RATE, DEFAULT_BYTE_TIMEOUT_MS, DEFAULT_READ_ATTEMPTS,
    DEFAULT_RESPONSE_DEADLINE_MS, DEFAULT_SETTLE_MS,
};

/// How the transport treats a write that the OS only partially accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Log the short write and carry on
    #[default]
    Lenient,
    /// Report the short write as an error
    Strict,
}

/// Connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Serial port name
    pub port_name: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Timeout for each byte of a reply in milliseconds
    pub byte_timeout_ms: u64,
    /// Overall bound on one reply decode, `None` for no bound
    pub response_deadline_ms: Option<u64>,
    /// Pause after open before the first write, in milliseconds
    pub settle_ms: u64,
    /// Write+await cycles for commands that expect a reply
    pub read_attempts: usize,
    /// Partial write handling
    pub write_mode: WriteMode,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            byte_timeout_ms: DEFAULT_BYTE_TIMEOUT_MS,
            response_deadline_ms: Some(DEFAULT_RESPONSE_DEADLINE_MS),
            settle_ms: DEFAULT_SETTLE_MS,
            read_attempts: DEFAULT_READ_ATTEMPTS,
            write_mode: WriteMode::Lenient,
        }
    }
}

impl ClientConfig {
    /// Default configuration for the given port
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            ..Self::default()
        }
    }

    /// Load a configuration from a JSON file; missing fields take defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ArmError> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| ArmError::Io(e.into()))
    }

    pub fn byte_timeout(&self) -> Duration {
        Duration::from_millis(self.byte_timeout_ms)
    }

    pub fn response_deadline(&self) -> Option<Duration> {
        self.response_deadline_ms.map(Duration::from_millis)
    }

    pub fn settle_time(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}
