//! The link: one transport, one request/response cycle at a time.
//!
//! A [`Link`] owns the transport, the configuration and the cancel token
//! and implements the three protocol layers on top of them:
//!
//! - request framing ([`Link::send_request`])
//! - the receive state machine ([`Link::receive_header`])
//! - the bulk transfer engine ([`Link::receive_into_buffer`],
//!   [`Link::receive_into_sink`], [`Link::send_from_source`])
//!
//! # Example
//!
//! ```ignore
//! use gbx_link::link::Link;
//! use gbx_link::protocol::Command;
//! use gbx_link::{CancelToken, LinkConfig};
//!
//! let mut link = Link::new(port, LinkConfig::default(), CancelToken::new());
//! let header = link.request(Command::GetRamSize).await?;
//! let mut buf = [0u8; 4];
//! link.receive_into_buffer(header.length, &mut buf, &mut NoProgress).await?;
//! ```

mod deadline;
mod receiver;
mod transfer;

pub use deadline::{read_some, SlidingDeadline};

use tokio::io::AsyncWriteExt;

use crate::cancel::CancelToken;
use crate::config::LinkConfig;
use crate::error::{LinkError, Result};
use crate::protocol::{build_request, Command, ResponseHeader, REQUEST_SIZE};
use crate::transport::Transport;

/// Protocol endpoint over an exclusively owned transport.
pub struct Link<T> {
    transport: T,
    config: LinkConfig,
    cancel: CancelToken,
}

impl<T: Transport> Link<T> {
    /// Create a link over `transport`.
    pub fn new(transport: T, config: LinkConfig, cancel: CancelToken) -> Self {
        Self {
            transport,
            config,
            cancel,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Get the cancel token.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Get a reference to the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Get a mutable reference to the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consume the link and return the transport.
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Drop stale input left over from an earlier exchange.
    pub fn discard_buffered(&mut self) -> Result<()> {
        self.transport.discard_buffered()?;
        Ok(())
    }

    /// Discard stale input, then write the 7-byte request for `command`.
    ///
    /// # Errors
    ///
    /// Returns `TransportWrite` if the transport accepts fewer than 7 bytes.
    /// Partial writes are not retried.
    pub async fn send_request(&mut self, command: Command) -> Result<()> {
        self.discard_buffered()?;

        let packet = build_request(command).encode();
        tracing::debug!("Sending {:?}", command);
        tracing::trace!("TX {}", hex(&packet));

        let written = self.transport.write(&packet).await?;
        if written != REQUEST_SIZE {
            return Err(LinkError::TransportWrite {
                written,
                expected: REQUEST_SIZE,
            });
        }
        self.transport.flush().await?;
        Ok(())
    }

    /// Send a request, give the device its settle time, and receive the
    /// reply header.
    ///
    /// Commands the device never answers (write-ram) are refused before
    /// anything is sent; use [`send_request`](Self::send_request) for those.
    pub async fn request(&mut self, command: Command) -> Result<ResponseHeader> {
        if !command.has_response() {
            return Err(LinkError::NoResponse(command));
        }
        self.send_request(command).await?;
        tokio::time::sleep(self.config.request_settle).await;
        self.receive_header().await
    }

    /// Fail fast if cancellation was requested.
    #[inline]
    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(LinkError::Cancelled);
        }
        Ok(())
    }
}

/// Space-separated hex dump for trace logs.
pub(crate) fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ScriptedTransport, Step};

    fn link(device: ScriptedTransport) -> Link<ScriptedTransport> {
        Link::new(device, LinkConfig::default(), CancelToken::new())
    }

    #[tokio::test]
    async fn test_send_request_writes_packet() {
        let mut link = link(ScriptedTransport::new());

        link.send_request(Command::ReadRom).await.unwrap();

        assert_eq!(link.transport().requests(), &[Command::ReadRom]);
        assert_eq!(link.transport().discards(), 1);
    }

    #[tokio::test]
    async fn test_send_request_discards_stale_input() {
        let device = ScriptedTransport::new()
            .preload(Step::bytes([0x10u8, 0x02, 0, 0, 0, 9]))
            .reply_frame(Command::GetRamSize, &[0, 0, 0x20, 0]);
        let mut link = link(device);

        let header = link.request(Command::GetRamSize).await.unwrap();

        assert_eq!(header.length, 4);
    }

    #[tokio::test]
    async fn test_short_request_write_fails() {
        let mut link = link(ScriptedTransport::new().write_limit(5));

        let err = link.send_request(Command::ReadHeader).await.unwrap_err();

        assert!(matches!(
            err,
            LinkError::TransportWrite {
                written: 5,
                expected: 7
            }
        ));
    }

    #[tokio::test]
    async fn test_request_refuses_command_without_reply() {
        let mut link = link(ScriptedTransport::new());

        let err = link.request(Command::WriteRam).await.unwrap_err();

        assert!(matches!(err, LinkError::NoResponse(Command::WriteRam)));
        assert!(link.transport().requests().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_link_refuses_work() {
        let link = link(ScriptedTransport::new());
        link.cancel_token().cancel();
        assert!(link.check_cancelled().unwrap_err().is_cancelled());
    }

    #[test]
    fn test_hex_dump() {
        assert_eq!(hex(&[0x10, 0x02, 0xF0]), "10 02 F0");
        assert_eq!(hex(&[]), "");
    }
}
