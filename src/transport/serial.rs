//! Serial port transport.
//!
//! Opens the port 8N1 without flow control, the framing the reader
//! firmware expects. Works on Unix (tty devices) and Windows (COM ports).
//!
//! # Example
//!
//! ```ignore
//! use gbx_link::transport::SerialTransport;
//!
//! let port = SerialTransport::open("/dev/ttyACM0", 500_000)?;
//! ```

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_serial::{
    ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortBuilderExt, SerialStream,
    StopBits,
};

use super::Transport;
use crate::error::Result;

/// An open serial port.
pub struct SerialTransport {
    port: SerialStream,
    path: String,
}

impl SerialTransport {
    /// Open and configure a serial port.
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .open_native_async()?;

        tracing::debug!("{} opened at {} baud", path, baud_rate);

        Ok(Self {
            port,
            path: path.to_string(),
        })
    }

    /// Get the port path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Get a reference to the underlying port.
    pub fn inner(&self) -> &SerialStream {
        &self.port
    }
}

impl Transport for SerialTransport {
    fn discard_buffered(&mut self) -> std::io::Result<()> {
        self.port.clear(ClearBuffer::All)?;
        Ok(())
    }
}

impl AsyncRead for SerialTransport {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.port).poll_read(cx, buf)
    }
}

impl AsyncWrite for SerialTransport {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.port).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.port).poll_flush(cx)
    }

    fn poll_shutdown(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.port).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_missing_port_fails() {
        let result = SerialTransport::open("/dev/gbx-link-no-such-port", 500_000);
        assert!(result.is_err());
    }
}
