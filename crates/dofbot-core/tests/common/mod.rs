//! Scripted stand-in for the expansion board

#![allow(dead_code)]

use dofbot_core::protocol::{ArmError, ByteTransport};
use std::collections::VecDeque;
use std::io;
use std::time::Duration;

/// Records every write and answers each one with the next scripted reply
pub struct MockBoard {
    pub writes: Vec<Vec<u8>>,
    replies: VecDeque<Vec<u8>>,
    rx: VecDeque<u8>,
    pub fail_writes: bool,
    pub open: bool,
    pub close_calls: usize,
}

impl MockBoard {
    pub fn new() -> Self {
        Self {
            writes: Vec::new(),
            replies: VecDeque::new(),
            rx: VecDeque::new(),
            fail_writes: false,
            open: true,
            close_calls: 0,
        }
    }

    /// Bytes sent back after the next write that has no reply yet
    pub fn reply(mut self, bytes: Vec<u8>) -> Self {
        self.replies.push_back(bytes);
        self
    }

    /// Bytes already waiting before anything is written
    pub fn pending(mut self, bytes: &[u8]) -> Self {
        self.rx.extend(bytes.iter().copied());
        self
    }

    /// Bytes arriving unprompted, e.g. a reply that came in too late
    pub fn inject(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }

    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::new()
        }
    }
}

impl ByteTransport for MockBoard {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, ArmError> {
        if self.fail_writes || !self.open {
            return Err(ArmError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "device unplugged",
            )));
        }
        self.writes.push(data.to_vec());
        if let Some(reply) = self.replies.pop_front() {
            self.rx.extend(reply);
        }
        Ok(data.len())
    }

    fn read_byte(&mut self, _timeout: Duration) -> Option<u8> {
        if !self.open {
            return None;
        }
        self.rx.pop_front()
    }

    fn clear_input(&mut self) {
        self.rx.clear();
    }

    fn close(&mut self) {
        self.close_calls += 1;
        self.open = false;
    }
}
