//! Wire format encoding and decoding.
//!
//! Request packet (host to device), always 7 bytes:
//! ```text
//! ┌──────┬──────┬──────────────────┬─────────┐
//! │ DLE  │ STX  │ Length           │ Command │
//! │ 0x10 │ 0x02 │ 00 00 00 01      │ 1 byte  │
//! └──────┴──────┴──────────────────┴─────────┘
//! ```
//!
//! Response header (device to host), followed by `length` payload bytes:
//! ```text
//! ┌──────┬──────┬──────────────────┐
//! │ DLE  │ STX  │ Length           │
//! │ 0x10 │ 0x02 │ uint32 BE        │
//! └──────┴──────┴──────────────────┘
//! ```
//!
//! All multi-byte integers are Big Endian.

use crate::error::{LinkError, Result};

/// First frame marker byte.
pub const DLE: u8 = 0x10;

/// Second frame marker byte.
pub const STX: u8 = 0x02;

/// Request packet size in bytes (fixed, exactly 7).
pub const REQUEST_SIZE: usize = 7;

/// Size of the length field in both directions.
pub const LENGTH_SIZE: usize = 4;

/// Response header size in bytes (markers + length).
pub const RESPONSE_HEADER_SIZE: usize = 2 + LENGTH_SIZE;

/// Length announced by every request: the command byte itself.
pub const REQUEST_PAYLOAD_LENGTH: u32 = 1;

/// Maximum size of the cartridge header reply.
pub const HEADER_PAYLOAD_CAPACITY: usize = 32;

/// Size of the get-ram-size reply.
pub const RAM_SIZE_PAYLOAD: u32 = 4;

/// Operation requested from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Cartridge header block (small, buffered).
    ReadHeader = 0x01,
    /// Full ROM image (streamed).
    ReadRom = 0x02,
    /// Full RAM image.
    ReadRam = 0x03,
    /// Host streams a RAM image to the device; no reply frame.
    WriteRam = 0x04,
    /// 4-byte RAM size.
    GetRamSize = 0xF0,
}

impl Command {
    /// The opcode sent on the wire.
    #[inline]
    pub fn opcode(self) -> u8 {
        self as u8
    }

    /// Check if the device answers this command with a response frame.
    #[inline]
    pub fn has_response(self) -> bool {
        !matches!(self, Command::WriteRam)
    }
}

impl TryFrom<u8> for Command {
    type Error = LinkError;

    fn try_from(opcode: u8) -> Result<Self> {
        match opcode {
            0x01 => Ok(Command::ReadHeader),
            0x02 => Ok(Command::ReadRom),
            0x03 => Ok(Command::ReadRam),
            0x04 => Ok(Command::WriteRam),
            0xF0 => Ok(Command::GetRamSize),
            other => Err(LinkError::UnknownCommand(other)),
        }
    }
}

/// A fully built request packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestPacket {
    /// Requested operation.
    pub command: Command,
}

impl RequestPacket {
    /// Create a request for the given command.
    pub fn new(command: Command) -> Self {
        Self { command }
    }

    /// Encode the packet to its 7 wire bytes.
    ///
    /// # Example
    ///
    /// ```
    /// use gbx_link::protocol::{Command, RequestPacket};
    ///
    /// let bytes = RequestPacket::new(Command::ReadRom).encode();
    /// assert_eq!(bytes, [0x10, 0x02, 0x00, 0x00, 0x00, 0x01, 0x02]);
    /// ```
    pub fn encode(&self) -> [u8; REQUEST_SIZE] {
        let mut buf = [0u8; REQUEST_SIZE];
        buf[0] = DLE;
        buf[1] = STX;
        buf[2..6].copy_from_slice(&REQUEST_PAYLOAD_LENGTH.to_be_bytes());
        buf[6] = self.command.opcode();
        buf
    }

    /// Decode a request packet.
    ///
    /// Returns `None` if the buffer is not exactly a well formed request
    /// for a known command.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() != REQUEST_SIZE || buf[0] != DLE || buf[1] != STX {
            return None;
        }
        let length = u32::from_be_bytes([buf[2], buf[3], buf[4], buf[5]]);
        if length != REQUEST_PAYLOAD_LENGTH {
            return None;
        }
        Command::try_from(buf[6]).ok().map(Self::new)
    }
}

/// Build the request packet for a command (standalone function).
#[inline]
pub fn build_request(command: Command) -> RequestPacket {
    RequestPacket::new(command)
}

/// Decoded response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    /// Exact number of payload bytes that follow.
    pub length: u32,
}

impl ResponseHeader {
    /// Create a header announcing `length` payload bytes.
    pub fn new(length: u32) -> Self {
        Self { length }
    }

    /// Decode the length field from its 4 big-endian bytes.
    #[inline]
    pub fn from_length_bytes(bytes: [u8; LENGTH_SIZE]) -> Self {
        Self {
            length: u32::from_be_bytes(bytes),
        }
    }

    /// Encode the full header (markers + length).
    pub fn encode(&self) -> [u8; RESPONSE_HEADER_SIZE] {
        let mut buf = [0u8; RESPONSE_HEADER_SIZE];
        buf[0] = DLE;
        buf[1] = STX;
        buf[2..].copy_from_slice(&self.length.to_be_bytes());
        buf
    }

    /// Check the announced length against what a command expects.
    pub fn expect_length(&self, command: Command, expected: u32) -> Result<()> {
        if self.length != expected {
            return Err(LinkError::UnexpectedLength {
                command,
                expected,
                actual: self.length,
            });
        }
        Ok(())
    }
}

/// Build a complete response frame: header followed by payload.
///
/// Used by the scripted device and tests.
pub fn build_response(payload: &[u8]) -> Vec<u8> {
    let header = ResponseHeader::new(payload.len() as u32);
    let mut frame = Vec::with_capacity(RESPONSE_HEADER_SIZE + payload.len());
    frame.extend_from_slice(&header.encode());
    frame.extend_from_slice(payload);
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_packet_layout() {
        let bytes = build_request(Command::ReadHeader).encode();
        assert_eq!(bytes, [0x10, 0x02, 0x00, 0x00, 0x00, 0x01, 0x01]);

        let bytes = build_request(Command::GetRamSize).encode();
        assert_eq!(bytes[6], 0xF0);
    }

    #[test]
    fn test_request_size_is_exactly_7() {
        assert_eq!(REQUEST_SIZE, 7);
        for command in [
            Command::ReadHeader,
            Command::ReadRom,
            Command::ReadRam,
            Command::WriteRam,
            Command::GetRamSize,
        ] {
            assert_eq!(build_request(command).encode().len(), 7);
        }
    }

    #[test]
    fn test_read_rom_request_decodes_back() {
        let encoded = build_request(Command::ReadRom).encode();
        let decoded = RequestPacket::decode(&encoded).unwrap();
        assert_eq!(decoded.command.opcode(), 0x02);
        assert_eq!(encoded.len(), REQUEST_SIZE);
    }

    #[test]
    fn test_decode_rejects_malformed_requests() {
        assert!(RequestPacket::decode(&[0x10, 0x02, 0, 0, 0, 1]).is_none());
        assert!(RequestPacket::decode(&[0x10, 0x03, 0, 0, 0, 1, 0x01]).is_none());
        assert!(RequestPacket::decode(&[0x10, 0x02, 0, 0, 0, 2, 0x01]).is_none());
        assert!(RequestPacket::decode(&[0x10, 0x02, 0, 0, 0, 1, 0x7F]).is_none());
    }

    #[test]
    fn test_command_opcodes() {
        assert_eq!(Command::try_from(0x01).unwrap(), Command::ReadHeader);
        assert_eq!(Command::try_from(0x04).unwrap(), Command::WriteRam);
        assert_eq!(Command::try_from(0xF0).unwrap(), Command::GetRamSize);
        assert!(matches!(
            Command::try_from(0x05),
            Err(LinkError::UnknownCommand(0x05))
        ));
        assert!(!Command::WriteRam.has_response());
        assert!(Command::ReadRam.has_response());
    }

    #[test]
    fn test_response_header_big_endian() {
        let header = ResponseHeader::new(0x0102_0304);
        let bytes = header.encode();
        assert_eq!(bytes, [0x10, 0x02, 0x01, 0x02, 0x03, 0x04]);
        assert_eq!(
            ResponseHeader::from_length_bytes([0x01, 0x02, 0x03, 0x04]),
            header
        );
    }

    #[test]
    fn test_expect_length() {
        let header = ResponseHeader::new(4);
        assert!(header.expect_length(Command::GetRamSize, 4).is_ok());
        let err = header.expect_length(Command::ReadRam, 8192).unwrap_err();
        assert!(matches!(
            err,
            LinkError::UnexpectedLength {
                expected: 8192,
                actual: 4,
                ..
            }
        ));
    }

    #[test]
    fn test_build_response() {
        let frame = build_response(b"abc");
        assert_eq!(frame, vec![0x10, 0x02, 0, 0, 0, 3, b'a', b'b', b'c']);
    }
}
