//! Frame encoding/decoding
//!
//! Frame format:
//! - 1 byte: header (`0xFF`)
//! - 1 byte: device id (`0xFC` towards the board, `0xFB` from it)
//! - 1 byte: length (payload + 3: length, type and checksum bytes included)
//! - 1 byte: command or reply type
//! - N bytes: payload
//! - 1 byte: checksum
//!
//! The two directions use different checksums. Outgoing frames sum every
//! byte from the header on, seeded with [`COMPLEMENT`]. Replies sum only
//! length, type and payload.

use byteorder::{BigEndian, ByteOrder};
use std::time::{Duration, Instant};

use super::{
    ArmError, ByteTransport, ResponseKind, COMPLEMENT, DEFAULT_BYTE_TIMEOUT_MS, DEVICE_ID, HEAD,
    REPLY_DEVICE_ID,
};

/// Length byte overhead on top of the payload
const LENGTH_OVERHEAD: usize = 3;

/// A decoded reply frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Reply type byte
    pub kind: u8,
    /// Payload, checksum excluded
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(kind: u8, payload: Vec<u8>) -> Self {
        Self { kind, payload }
    }

    /// Length byte of this frame on the wire
    pub fn length_byte(&self) -> u8 {
        (self.payload.len() + LENGTH_OVERHEAD) as u8
    }

    /// Reply checksum: length + type + payload, low byte
    pub fn checksum(&self) -> u8 {
        let sum = self
            .payload
            .iter()
            .fold(self.length_byte() as u32 + self.kind as u32, |acc, &b| {
                acc + b as u32
            });
        (sum % 256) as u8
    }

    /// Encode as the board would send it
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.payload.len() + 5);
        bytes.extend_from_slice(&[HEAD, REPLY_DEVICE_ID, self.length_byte(), self.kind]);
        bytes.extend_from_slice(&self.payload);
        bytes.push(self.checksum());
        bytes
    }

    pub fn response_kind(&self) -> Option<ResponseKind> {
        ResponseKind::from_byte(self.kind)
    }

    /// Big-endian u16 at `offset` of the payload
    pub fn u16_be(&self, offset: usize) -> Option<u16> {
        self.payload
            .get(offset..offset + 2)
            .map(BigEndian::read_u16)
    }
}

/// Outgoing checksum: 5 + every byte, low byte
pub fn outgoing_checksum(bytes: &[u8]) -> u8 {
    let sum = bytes
        .iter()
        .fold(COMPLEMENT as u32, |acc, &b| acc + b as u32);
    (sum & 0xFF) as u8
}

/// Append the outgoing checksum to `command_bytes` and return the frame
pub fn encode(command_bytes: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(command_bytes.len() + 1);
    frame.extend_from_slice(command_bytes);
    frame.push(outgoing_checksum(command_bytes));
    frame
}

/// Builder for outgoing frames
pub struct FrameBuilder {
    command: u8,
    payload: Vec<u8>,
}

impl FrameBuilder {
    pub fn new(command: u8) -> Self {
        Self {
            command,
            payload: Vec::new(),
        }
    }

    /// Add a single byte
    pub fn byte(mut self, b: u8) -> Self {
        self.payload.push(b);
        self
    }

    /// Add a 16-bit value (big-endian)
    pub fn u16_be(mut self, value: u16) -> Self {
        let mut bytes = [0u8; 2];
        BigEndian::write_u16(&mut bytes, value);
        self.payload.extend_from_slice(&bytes);
        self
    }

    /// Add raw bytes
    pub fn bytes(mut self, data: &[u8]) -> Self {
        self.payload.extend_from_slice(data);
        self
    }

    /// Header, device id, length, command and payload, checksum appended
    pub fn build(self) -> Vec<u8> {
        let length = (self.payload.len() + LENGTH_OVERHEAD) as u8;
        let mut cmd = Vec::with_capacity(self.payload.len() + 4);
        cmd.extend_from_slice(&[HEAD, DEVICE_ID, length, self.command]);
        cmd.extend_from_slice(&self.payload);
        encode(&cmd)
    }
}

/// Timing bounds for reading one reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadTimeouts {
    /// Wait for any single byte
    pub byte: Duration,
    /// Bound on the whole decode, resync included
    pub overall: Option<Duration>,
}

impl Default for ReadTimeouts {
    fn default() -> Self {
        Self {
            byte: Duration::from_millis(DEFAULT_BYTE_TIMEOUT_MS),
            overall: None,
        }
    }
}

struct ByteReader<'a, T: ?Sized> {
    transport: &'a mut T,
    timeouts: ReadTimeouts,
    started: Instant,
}

impl<T: ByteTransport + ?Sized> ByteReader<'_, T> {
    fn next(&mut self) -> Result<u8, ArmError> {
        if let Some(limit) = self.timeouts.overall {
            if self.started.elapsed() >= limit {
                return Err(ArmError::Timeout);
            }
        }
        self.transport
            .read_byte(self.timeouts.byte)
            .ok_or(ArmError::Timeout)
    }
}

/// Read bytes until a valid reply frame is assembled.
///
/// Bytes before a header, headers followed by the wrong device id and
/// frames with a bad checksum are skipped. Fails with [`ArmError::Timeout`]
/// once a byte read times out or the overall bound passes, and with
/// [`ArmError::InvalidLength`] on a length byte below 3.
pub fn decode<T: ByteTransport + ?Sized>(
    transport: &mut T,
    timeouts: ReadTimeouts,
) -> Result<Frame, ArmError> {
    let mut reader = ByteReader {
        transport,
        timeouts,
        started: Instant::now(),
    };

    loop {
        if reader.next()? != HEAD {
            continue;
        }
        // A mismatching id byte is dropped, not rescanned as a header
        if reader.next()? != REPLY_DEVICE_ID {
            continue;
        }

        let length = reader.next()?;
        let kind = reader.next()?;
        let data_len = length as usize;
        if data_len <= 2 {
            return Err(ArmError::InvalidLength(length));
        }

        let mut payload = Vec::with_capacity(data_len - 3);
        let mut sum = length as u32 + kind as u32;
        for _ in 0..data_len - 3 {
            let value = reader.next()?;
            sum += value as u32;
            payload.push(value);
        }
        let received = reader.next()?;
        let expected = (sum % 256) as u8;

        if expected != received {
            tracing::warn!(
                "{}; dropping frame type {:#04x} {:02x?}",
                ArmError::ChecksumMismatch {
                    expected,
                    actual: received
                },
                kind,
                payload
            );
            continue;
        }

        tracing::debug!("rx type {:#04x} {:02x?}", kind, payload);
        return Ok(Frame { kind, payload });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;

    struct Scripted(VecDeque<u8>);

    impl Scripted {
        fn new(bytes: &[u8]) -> Self {
            Self(bytes.iter().copied().collect())
        }
    }

    impl ByteTransport for Scripted {
        fn write_bytes(&mut self, data: &[u8]) -> Result<usize, ArmError> {
            Ok(data.len())
        }

        fn read_byte(&mut self, _timeout: Duration) -> Option<u8> {
            self.0.pop_front()
        }
    }

    /// Never times out, never forms a header
    struct Noise;

    impl ByteTransport for Noise {
        fn write_bytes(&mut self, data: &[u8]) -> Result<usize, ArmError> {
            Ok(data.len())
        }

        fn read_byte(&mut self, _timeout: Duration) -> Option<u8> {
            Some(0x55)
        }
    }

    #[test]
    fn test_outgoing_checksum_seed() {
        // Read-position request for servo 1
        assert_eq!(encode(&[0xFF, 0xFC, 0x03, 0x31]), vec![0xFF, 0xFC, 0x03, 0x31, 0x34]);
        assert_eq!(outgoing_checksum(&[]), 5);
    }

    #[test]
    fn test_builder_length_byte() {
        let frame = FrameBuilder::new(0x11).u16_be(2000).u16_be(500).build();
        assert_eq!(frame.len(), 9);
        assert_eq!(&frame[..8], &[0xFF, 0xFC, 0x07, 0x11, 0x07, 0xD0, 0x01, 0xF4]);
        assert_eq!(frame[8], outgoing_checksum(&frame[..8]));

        let read = FrameBuilder::new(0x31).build();
        assert_eq!(read[2], 0x03);
    }

    #[test]
    fn test_reply_checksum() {
        let frame = Frame::new(0x0A, vec![0x07, 0xD0, 0x31]);
        // 6 + 0x0A + 0x07 + 0xD0 + 0x31
        assert_eq!(frame.checksum(), 0x18);
        assert_eq!(
            frame.to_bytes(),
            vec![0xFF, 0xFB, 0x06, 0x0A, 0x07, 0xD0, 0x31, 0x18]
        );
        assert_eq!(frame.u16_be(0), Some(2000));
        assert_eq!(frame.u16_be(2), None);
    }

    #[test]
    fn test_decode_reply() {
        let frame = Frame::new(0x0A, vec![0x0A, 0xAD, 0x32]);
        let mut link = Scripted::new(&frame.to_bytes());
        assert_eq!(decode(&mut link, ReadTimeouts::default()).unwrap(), frame);
    }

    #[test]
    fn test_decode_skips_noise() {
        let frame = Frame::new(0x01, vec![0x07]);
        let mut bytes = vec![0x00, 0x13, 0xFB, 0xFF, 0x42, 0x07];
        bytes.extend(frame.to_bytes());
        let mut link = Scripted::new(&bytes);
        assert_eq!(decode(&mut link, ReadTimeouts::default()).unwrap(), frame);
    }

    #[test]
    fn test_decode_resyncs_after_bad_checksum() {
        let good = Frame::new(0x33, vec![0x01]);
        let mut bad = Frame::new(0x0A, vec![0x07, 0xD0, 0x31]).to_bytes();
        let last = bad.len() - 1;
        bad[last] ^= 0xFF;

        let mut bytes = bad;
        bytes.extend(good.to_bytes());
        let mut link = Scripted::new(&bytes);
        assert_eq!(decode(&mut link, ReadTimeouts::default()).unwrap(), good);
    }

    #[test]
    fn test_decode_rejects_lone_bad_frame() {
        let mut bytes = Frame::new(0x0A, vec![0x07, 0xD0, 0x31]).to_bytes();
        bytes[5] = 0x00;
        let mut link = Scripted::new(&bytes);
        assert!(matches!(
            decode(&mut link, ReadTimeouts::default()),
            Err(ArmError::Timeout)
        ));
    }

    #[test]
    fn test_decode_invalid_length() {
        let mut link = Scripted::new(&[0xFF, 0xFB, 0x02, 0x0A, 0x0C]);
        assert!(matches!(
            decode(&mut link, ReadTimeouts::default()),
            Err(ArmError::InvalidLength(2))
        ));
    }

    #[test]
    fn test_decode_id_byte_not_rescanned() {
        // 0xFF in the id position is consumed, so the real frame after it
        // still starts cleanly at its own header
        let frame = Frame::new(0x22, vec![0x04]);
        let mut bytes = vec![0xFF, 0xFF];
        bytes.extend(frame.to_bytes());
        let mut link = Scripted::new(&bytes);
        assert_eq!(decode(&mut link, ReadTimeouts::default()).unwrap(), frame);
    }

    #[test]
    fn test_decode_times_out_on_silence() {
        let mut link = Scripted::new(&[]);
        assert!(matches!(
            decode(&mut link, ReadTimeouts::default()),
            Err(ArmError::Timeout)
        ));
    }

    #[test]
    fn test_decode_overall_deadline() {
        let timeouts = ReadTimeouts {
            byte: Duration::from_millis(10),
            overall: Some(Duration::from_millis(20)),
        };
        assert!(matches!(decode(&mut Noise, timeouts), Err(ArmError::Timeout)));
    }
}
