//! Protocol module - wire format and packet types.
//!
//! The reader speaks a tiny framed protocol over the serial line:
//! - 7-byte request packets carrying a single command byte
//! - response frames: DLE, STX, a big-endian u32 length, then the payload
//!
//! Requests and response headers are encoded here; the receive side of
//! the framing lives in [`crate::link`].

mod wire_format;

pub use wire_format::{
    build_request, build_response, Command, RequestPacket, ResponseHeader, DLE,
    HEADER_PAYLOAD_CAPACITY, LENGTH_SIZE, RAM_SIZE_PAYLOAD, REQUEST_PAYLOAD_LENGTH, REQUEST_SIZE,
    RESPONSE_HEADER_SIZE, STX,
};
