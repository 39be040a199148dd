//! In-memory simulated device.
//!
//! [`ScriptedTransport`] stands in for the serial port in tests and dry
//! runs. Replies are queued per command and released only when the
//! matching request packet is written, so the link's discard-before-request
//! step behaves as it does on real hardware. Reply scripts can split data
//! into small reads, insert pauses and carry line noise.
//!
//! # Example
//!
//! ```
//! use gbx_link::protocol::Command;
//! use gbx_link::transport::{ScriptedTransport, Step};
//! use std::time::Duration;
//!
//! let device = ScriptedTransport::new()
//!     .max_read(3)
//!     .reply(Command::GetRamSize, [
//!         Step::bytes([0xFFu8, 0x00]),           // noise
//!         Step::pause(Duration::from_millis(50)),
//!         Step::frame(&8192u32.to_be_bytes()),
//!     ]);
//! ```

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::Sleep;

use super::Transport;
use crate::protocol::{build_response, Command, RequestPacket};

/// One element of a reply script.
#[derive(Debug, Clone)]
pub enum Step {
    /// Bytes made available to the host.
    Bytes(Bytes),
    /// Nothing arrives for this long.
    Pause(Duration),
}

impl Step {
    /// Raw bytes (noise, partial frames, payload).
    pub fn bytes(data: impl AsRef<[u8]>) -> Self {
        Step::Bytes(Bytes::copy_from_slice(data.as_ref()))
    }

    /// A complete response frame carrying `payload`.
    pub fn frame(payload: &[u8]) -> Self {
        Step::Bytes(Bytes::from(build_response(payload)))
    }

    /// A gap in the byte stream.
    pub fn pause(duration: Duration) -> Self {
        Step::Pause(duration)
    }
}

/// Simulated device behind an in-memory byte channel.
#[derive(Default)]
pub struct ScriptedTransport {
    /// Bytes and pauses waiting to be read by the host.
    inbound: VecDeque<Step>,
    /// Scripted replies, released one per matching request.
    replies: HashMap<Command, VecDeque<Vec<Step>>>,
    /// Maximum bytes handed out per read call.
    max_read: Option<usize>,
    /// Maximum bytes accepted per write call.
    write_limit: Option<usize>,
    /// Commands received, in order.
    requests: Vec<Command>,
    /// Bytes written that were not request packets.
    uploaded: BytesMut,
    /// Number of discard calls.
    discards: usize,
    /// Pause currently in progress.
    pause: Option<Pin<Box<Sleep>>>,
}

impl ScriptedTransport {
    /// Create a device with no scripted replies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver at most `n` bytes per read.
    pub fn max_read(mut self, n: usize) -> Self {
        self.max_read = Some(n.max(1));
        self
    }

    /// Accept at most `n` bytes per write.
    pub fn write_limit(mut self, n: usize) -> Self {
        self.write_limit = Some(n);
        self
    }

    /// Queue a reply script for the next `command` request.
    pub fn reply(mut self, command: Command, steps: impl IntoIterator<Item = Step>) -> Self {
        self.push_reply(command, steps);
        self
    }

    /// Queue a reply that is a single well formed frame.
    pub fn reply_frame(self, command: Command, payload: &[u8]) -> Self {
        self.reply(command, [Step::frame(payload)])
    }

    /// Queue a reply script for the next `command` request.
    pub fn push_reply(&mut self, command: Command, steps: impl IntoIterator<Item = Step>) {
        self.replies
            .entry(command)
            .or_default()
            .push_back(steps.into_iter().collect());
    }

    /// Make bytes available before any request (stale line data).
    pub fn preload(mut self, step: Step) -> Self {
        self.inbound.push_back(step);
        self
    }

    /// Commands received so far.
    pub fn requests(&self) -> &[Command] {
        &self.requests
    }

    /// Bytes uploaded by the host outside of request packets.
    pub fn uploaded(&self) -> &[u8] {
        &self.uploaded
    }

    /// Number of times buffered input was discarded.
    pub fn discards(&self) -> usize {
        self.discards
    }

    /// Check if every scripted byte has been consumed.
    pub fn is_drained(&self) -> bool {
        self.inbound.is_empty()
    }

    fn on_write(&mut self, data: &[u8]) {
        match RequestPacket::decode(data) {
            Some(request) => {
                tracing::trace!("device received {:?}", request.command);
                self.requests.push(request.command);
                if let Some(reply) = self
                    .replies
                    .get_mut(&request.command)
                    .and_then(VecDeque::pop_front)
                {
                    self.inbound.extend(reply);
                }
            }
            None => self.uploaded.extend_from_slice(data),
        }
    }
}

impl Transport for ScriptedTransport {
    fn discard_buffered(&mut self) -> std::io::Result<()> {
        self.inbound.clear();
        self.pause = None;
        self.discards += 1;
        Ok(())
    }
}

impl AsyncRead for ScriptedTransport {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();

        loop {
            // Nothing scripted: a read that yields no data yet.
            let Some(step) = this.inbound.front_mut() else {
                return Poll::Ready(Ok(()));
            };

            match step {
                Step::Pause(duration) => {
                    let duration = *duration;
                    let sleep = this
                        .pause
                        .get_or_insert_with(|| Box::pin(tokio::time::sleep(duration)));
                    ready!(sleep.as_mut().poll(cx));
                    this.pause = None;
                    this.inbound.pop_front();
                }
                Step::Bytes(bytes) => {
                    let n = bytes
                        .len()
                        .min(buf.remaining())
                        .min(this.max_read.unwrap_or(usize::MAX));
                    buf.put_slice(&bytes.split_to(n));
                    if bytes.is_empty() {
                        this.inbound.pop_front();
                    }
                    if n > 0 || buf.remaining() == 0 {
                        return Poll::Ready(Ok(()));
                    }
                }
            }
        }
    }
}

impl AsyncWrite for ScriptedTransport {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        let this = self.get_mut();
        let n = this.write_limit.map_or(buf.len(), |limit| limit.min(buf.len()));
        this.on_write(&buf[..n]);
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
