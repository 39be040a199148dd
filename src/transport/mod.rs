//! Transport module - byte channels to the device.
//!
//! Provides:
//! - [`Transport`]: the capability the link needs from a channel
//! - [`SerialTransport`]: a real serial port (`tokio-serial`)
//! - [`ScriptedTransport`]: an in-memory simulated device

mod scripted;
mod serial;

pub use scripted::{ScriptedTransport, Step};
pub use serial::SerialTransport;

use tokio::io::{AsyncRead, AsyncWrite};

/// A byte channel to the device.
///
/// Reads may complete with zero bytes, meaning "no data yet", not end
/// of stream. Before every request the link calls
/// [`discard_buffered`](Transport::discard_buffered) so stale bytes from
/// an aborted exchange cannot corrupt the next frame search.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {
    /// Drop any received-but-unread and queued-but-unsent bytes.
    fn discard_buffered(&mut self) -> std::io::Result<()>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn discard_buffered(&mut self) -> std::io::Result<()> {
        (**self).discard_buffered()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn discard_buffered(&mut self) -> std::io::Result<()> {
        (**self).discard_buffered()
    }
}
