//! Bulk transfer engine.
//!
//! Moves exactly the declared number of bytes between the transport and
//! a destination:
//! - [`Link::receive_into_buffer`]: bounded in-memory buffer
//! - [`Link::receive_into_sink`]: unbounded sink, through a scratch chunk
//! - [`Link::send_from_source`]: fixed chunks out to the device, throttled
//!
//! Device latency is tolerated as long as some bytes arrive within each
//! timeout window; only a fully stalled window ends a receive.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::deadline::{read_some, SlidingDeadline};
use super::Link;
use crate::error::{LinkError, Result};
use crate::progress::Progress;
use crate::transport::Transport;

impl<T: Transport> Link<T> {
    /// Receive a `length`-byte payload into `buffer`.
    ///
    /// On success `buffer[..length]` holds the payload. The buffer's
    /// length is its capacity; nothing past it is ever written.
    ///
    /// # Errors
    ///
    /// - `BufferOverflow` if `length` exceeds the buffer, before any read
    /// - `ShortRead` if the transport stalls for a whole timeout window
    /// - `Cancelled` if the cancel token is set
    pub async fn receive_into_buffer(
        &mut self,
        length: u32,
        buffer: &mut [u8],
        progress: &mut dyn Progress,
    ) -> Result<()> {
        let total = length as u64;
        if length as usize > buffer.len() {
            return Err(LinkError::BufferOverflow {
                declared: total,
                capacity: buffer.len(),
            });
        }

        let poll_interval = self.config.poll_interval;
        let mut deadline = SlidingDeadline::new(self.config.timeout);
        let end = length as usize;
        let mut offset = 0usize;

        let result = loop {
            if offset == end {
                break Ok(());
            }
            if let Err(e) = self.check_cancelled() {
                break Err(e);
            }

            let n = match read_some(
                &mut self.transport,
                &mut buffer[offset..end],
                &deadline,
                poll_interval,
            )
            .await
            {
                Ok(n) => n,
                Err(e) => break Err(e),
            };

            if n > 0 {
                offset += n;
                deadline.reset();
                progress.update(total, (end - offset) as u64);
            } else if deadline.expired() {
                break Err(LinkError::ShortRead {
                    received: offset as u64,
                    expected: total,
                });
            }
        };

        progress.finish();
        if result.is_ok() {
            tracing::debug!("Received {} bytes into buffer", total);
        }
        result
    }

    /// Stream a `length`-byte payload into `sink`.
    ///
    /// Each chunk is written to the sink before the next read. Returns the
    /// number of bytes written (always `length` on success).
    ///
    /// # Errors
    ///
    /// - `SinkWrite` if the sink rejects a chunk
    /// - `ShortRead` if the transport stalls for a whole timeout window
    /// - `Cancelled` if the cancel token is set
    pub async fn receive_into_sink<W>(
        &mut self,
        length: u32,
        sink: &mut W,
        progress: &mut dyn Progress,
    ) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let total = length as u64;
        let poll_interval = self.config.poll_interval;
        let mut deadline = SlidingDeadline::new(self.config.timeout);
        let mut chunk = vec![0u8; self.config.recv_chunk_size];
        let mut remaining = total;

        let result = loop {
            if remaining == 0 {
                break sink.flush().await.map_err(LinkError::SinkWrite);
            }
            if let Err(e) = self.check_cancelled() {
                break Err(e);
            }

            let want = remaining.min(chunk.len() as u64) as usize;
            let n = match read_some(
                &mut self.transport,
                &mut chunk[..want],
                &deadline,
                poll_interval,
            )
            .await
            {
                Ok(n) => n,
                Err(e) => break Err(e),
            };

            if n > 0 {
                if let Err(e) = sink.write_all(&chunk[..n]).await {
                    break Err(LinkError::SinkWrite(e));
                }
                remaining -= n as u64;
                deadline.reset();
                progress.update(total, remaining);
            } else if deadline.expired() {
                break Err(LinkError::ShortRead {
                    received: total - remaining,
                    expected: total,
                });
            }
        };

        progress.finish();
        result.map(|()| {
            tracing::debug!("Streamed {} bytes to sink", total);
            total
        })
    }

    /// Upload `total_length` bytes from `source` in fixed chunks.
    ///
    /// Waits `send_chunk_delay` after every chunk: the device is slower than
    /// the host and cannot signal back. The source must hold a whole number
    /// of chunks. Returns the number of bytes sent.
    ///
    /// # Errors
    ///
    /// - `ShortSource` if the source ends inside a chunk
    /// - `ShortWrite` if the transport accepts only part of a chunk
    /// - `Cancelled` if the cancel token is set
    pub async fn send_from_source<R>(
        &mut self,
        source: &mut R,
        total_length: u64,
        progress: &mut dyn Progress,
    ) -> Result<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let delay = self.config.send_chunk_delay;
        let mut chunk = vec![0u8; self.config.send_chunk_size];
        let mut sent = 0u64;

        let result = loop {
            if sent >= total_length {
                break self.transport.flush().await.map_err(LinkError::from);
            }
            if let Err(e) = self.check_cancelled() {
                break Err(e);
            }

            let read = match read_full(source, &mut chunk).await {
                Ok(read) => read,
                Err(e) => break Err(LinkError::Io(e)),
            };
            if read < chunk.len() {
                break Err(LinkError::ShortSource {
                    read: sent + read as u64,
                    expected: total_length,
                });
            }

            let written = match self.transport.write(&chunk).await {
                Ok(written) => written,
                Err(e) => break Err(LinkError::Io(e)),
            };
            sent += written as u64;
            if written < chunk.len() {
                break Err(LinkError::ShortWrite {
                    sent,
                    expected: total_length,
                });
            }

            tokio::time::sleep(delay).await;
            progress.update(total_length, total_length.saturating_sub(sent));
        };

        progress.finish();
        result.map(|()| {
            tracing::debug!("Sent {} bytes", sent);
            sent
        })
    }
}

/// Fill `buf` from `source`, stopping early only at end of input.
async fn read_full<R>(source: &mut R, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]).await? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}
