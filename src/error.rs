//! Error types for gbx-link.

use thiserror::Error;

use crate::protocol::Command;

/// Main error type for all link operations.
#[derive(Debug, Error)]
pub enum LinkError {
    /// I/O error on the transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port could not be opened or configured.
    #[error("Serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// JSON error (config file, report output).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The transport accepted only part of a request packet.
    #[error("Request write incomplete: {written} of {expected} bytes")]
    TransportWrite { written: usize, expected: usize },

    /// No DLE/STX marker sequence before the deadline expired.
    #[error("Timeout: DLE and/or STX not received")]
    NoFrameMarker,

    /// Deadline expired while reading the 4-byte length field.
    #[error("Timeout: length field incomplete ({received} of 4 bytes)")]
    IncompleteLength { received: usize },

    /// Deadline expired before the whole payload arrived.
    #[error("Timeout: missing data ({received} of {expected} bytes received)")]
    ShortRead { received: u64, expected: u64 },

    /// Fewer bytes were sent to the device than the transfer declared.
    #[error("Missing data: {sent} of {expected} bytes sent")]
    ShortWrite { sent: u64, expected: u64 },

    /// The source ended before a full chunk could be read.
    #[error("Source ended early: {read} of {expected} bytes read")]
    ShortSource { read: u64, expected: u64 },

    /// Declared payload does not fit the destination buffer.
    #[error("Not enough space in buffer: {declared} bytes declared, capacity {capacity}")]
    BufferOverflow { declared: u64, capacity: usize },

    /// Writing a received chunk to the sink failed.
    #[error("Error writing to sink: {0}")]
    SinkWrite(#[source] std::io::Error),

    /// Operation aborted through the cancel token.
    #[error("Operation cancelled")]
    Cancelled,

    /// A reply carried a length the command does not allow.
    #[error("Unexpected {actual}-byte reply to {command:?} (expected {expected})")]
    UnexpectedLength {
        command: Command,
        expected: u32,
        actual: u32,
    },

    /// A dump reply announced no data at all.
    #[error("Empty reply to {command:?}: got no packet size")]
    EmptyReply { command: Command },

    /// A request expecting a reply was made for a command that has none.
    #[error("{0:?} has no response frame")]
    NoResponse(Command),

    /// Header payload too short for its declared title.
    #[error("Malformed cartridge header: title length {title_len} in {payload_len}-byte payload")]
    MalformedMetadata { title_len: usize, payload_len: usize },

    /// Opcode outside the command set.
    #[error("Unknown command opcode: {0:#04x}")]
    UnknownCommand(u8),

    /// No valid cartridge header has been read.
    #[error("No cartridge info (no cartridge inserted or header read failed)")]
    NoCartridge,

    /// The cartridge reports no RAM.
    #[error("Cartridge has no RAM")]
    NoCartridgeRam,

    /// The RAM image does not match the cartridge RAM size.
    #[error("RAM file cannot be used: device RAM is {device} bytes, file is {file} bytes")]
    RamSizeMismatch { device: u64, file: u64 },
}

impl LinkError {
    /// True for errors caused by the sliding deadline expiring.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            LinkError::NoFrameMarker
                | LinkError::IncompleteLength { .. }
                | LinkError::ShortRead { .. }
        )
    }

    /// True if the user aborted the operation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LinkError::Cancelled)
    }
}

/// Result type alias using LinkError.
pub type Result<T> = std::result::Result<T, LinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_classification() {
        assert!(LinkError::NoFrameMarker.is_timeout());
        assert!(LinkError::IncompleteLength { received: 2 }.is_timeout());
        assert!(LinkError::ShortRead {
            received: 1,
            expected: 2
        }
        .is_timeout());
        assert!(!LinkError::Cancelled.is_timeout());
        assert!(!LinkError::BufferOverflow {
            declared: 40,
            capacity: 32
        }
        .is_timeout());
    }

    #[test]
    fn test_cancelled_is_distinct() {
        assert!(LinkError::Cancelled.is_cancelled());
        assert!(!LinkError::NoFrameMarker.is_cancelled());
    }

    #[test]
    fn test_messages() {
        let err = LinkError::UnexpectedLength {
            command: Command::GetRamSize,
            expected: 4,
            actual: 0,
        };
        assert!(err.to_string().contains("GetRamSize"));
        assert_eq!(
            LinkError::UnknownCommand(0x7F).to_string(),
            "Unknown command opcode: 0x7f"
        );
    }
}
