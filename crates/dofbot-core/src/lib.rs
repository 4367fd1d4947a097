//! # Dofbot Core Library
//!
//! Serial protocol driver for the six-servo Dofbot robotic arm.
//!
//! This library provides:
//! - Checksummed frame encoding for commands sent to the expansion board
//! - Self-resynchronizing decoding of reply frames from a noisy link
//! - Angle ↔ servo position conversion, including the inverted joints
//! - A client for moving, reading and pinging servos
//!
//! ## Example
//!
//! ```rust,ignore
//! use dofbot_core::protocol::ServoProtocolClient;
//!
//! let mut arm = ServoProtocolClient::open("/dev/ttyUSB0")?;
//! arm.write_all([90, 90, 90, 90, 90, 90], 500)?;
//!
//! match arm.read_angle(1)? {
//!     Some(angle) => println!("Servo 1 at {}°", angle),
//!     None => println!("Servo 1 did not answer"),
//! }
//! ```

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod angle;
pub mod protocol;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::angle::{to_angle, to_position, SERVO_COUNT};
    pub use crate::protocol::client::{ActionMode, OffsetState};
    pub use crate::protocol::{
        ArmError, ByteTransport, ClientConfig, SerialTransport, ServoProtocolClient, WriteMode,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
