//! Serial Protocol Communication
//!
//! Implements the binary framing protocol spoken by the Dofbot expansion
//! board over its UART link.
//!
//! Outgoing frames carry device id `0xFC` and a checksum seeded with 5;
//! replies carry device id `0xFB` and a checksum over length, type and
//! payload only.

pub mod client;
pub mod commands;
mod config;
mod error;
pub mod frame;
pub mod serial;

pub use client::ServoProtocolClient;
pub use commands::{Command, ResponseKind};
pub use config::{ClientConfig, WriteMode};
pub use error::ArmError;
pub use frame::{decode, encode, Frame, FrameBuilder, ReadTimeouts};
pub use serial::{list_ports, open_port, ByteTransport, PortInfo, SerialTransport};

/// Frame header sentinel
pub const HEAD: u8 = 0xFF;

/// Device id carried by outgoing frames
pub const DEVICE_ID: u8 = 0xFC;

/// Device id carried by replies from the board
pub const REPLY_DEVICE_ID: u8 = DEVICE_ID - 1;

/// Seed of the outgoing checksum (257 - DEVICE_ID)
pub const COMPLEMENT: u8 = 5;

/// Default baud rate of the expansion board
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Default timeout for a single byte read in milliseconds
pub const DEFAULT_BYTE_TIMEOUT_MS: u64 = 200;

/// Default overall bound on one frame decode in milliseconds
pub const DEFAULT_RESPONSE_DEADLINE_MS: u64 = 1000;

/// Pause after opening the port before any traffic is sent
pub const DEFAULT_SETTLE_MS: u64 = 200;

/// Write+await cycles attempted by queries before giving up
pub const DEFAULT_READ_ATTEMPTS: usize = 2;
