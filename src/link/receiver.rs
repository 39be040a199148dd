//! Receive state machine for response headers.
//!
//! Recovers the frame boundary from a byte stream that may carry noise,
//! partial frames or arbitrary delays:
//! - `SeekDle`: discard bytes until the DLE marker
//! - `SeekStx`: the very next byte must be STX
//! - `ReadLength`: accumulate the 4-byte big-endian payload length
//!
//! The deadline slides: it restarts whenever at least one byte arrives
//! and is only checked after reads that returned nothing.

use super::deadline::{read_some, SlidingDeadline};
use super::{hex, Link};
use crate::error::{LinkError, Result};
use crate::protocol::{ResponseHeader, DLE, LENGTH_SIZE, STX};
use crate::transport::Transport;

/// State machine for header parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Discarding bytes until DLE.
    SeekDle,
    /// DLE seen, next byte must be STX.
    SeekStx,
    /// Markers seen, `filled` of 4 length bytes collected.
    ReadLength { filled: usize },
}

impl State {
    /// Error reported when the deadline expires in this state.
    fn timeout_error(self) -> LinkError {
        match self {
            State::SeekDle | State::SeekStx => LinkError::NoFrameMarker,
            State::ReadLength { filled } => LinkError::IncompleteLength { received: filled },
        }
    }
}

impl<T: Transport> Link<T> {
    /// Synchronize to the next response frame and return its header.
    ///
    /// # Errors
    ///
    /// - `NoFrameMarker` if no DLE/STX pair arrives before the deadline, or
    ///   DLE is followed by another byte and resync is disabled
    /// - `IncompleteLength` if the length field stalls
    /// - `Cancelled` if the cancel token is set
    pub async fn receive_header(&mut self) -> Result<ResponseHeader> {
        let poll_interval = self.config.poll_interval;
        let resync = self.config.resync_after_bad_stx;
        let mut deadline = SlidingDeadline::new(self.config.timeout);
        let mut state = State::SeekDle;
        let mut length = [0u8; LENGTH_SIZE];
        let mut discarded = 0usize;

        loop {
            self.check_cancelled()?;

            let n = match state {
                State::SeekDle | State::SeekStx => {
                    let mut byte = [0u8; 1];
                    let n =
                        read_some(&mut self.transport, &mut byte, &deadline, poll_interval).await?;
                    if n == 1 {
                        state = self.on_marker_byte(state, byte[0], resync, &mut discarded)?;
                    }
                    n
                }
                State::ReadLength { filled } => {
                    let n = read_some(
                        &mut self.transport,
                        &mut length[filled..],
                        &deadline,
                        poll_interval,
                    )
                    .await?;
                    let filled = filled + n;
                    if filled == LENGTH_SIZE {
                        let header = ResponseHeader::from_length_bytes(length);
                        tracing::trace!("RX length {} => {}", hex(&length), header.length);
                        if discarded > 0 {
                            tracing::warn!("Discarded {} bytes before frame marker", discarded);
                        }
                        return Ok(header);
                    }
                    state = State::ReadLength { filled };
                    n
                }
            };

            if n > 0 {
                deadline.reset();
            } else if deadline.expired() {
                tracing::debug!("Header receive timed out in {:?}", state);
                return Err(state.timeout_error());
            }
        }
    }

    /// Advance the marker search by one received byte.
    fn on_marker_byte(
        &self,
        state: State,
        byte: u8,
        resync: bool,
        discarded: &mut usize,
    ) -> Result<State> {
        tracing::trace!("RX {:02X} in {:?}", byte, state);

        match (state, byte) {
            (State::SeekDle, DLE) => Ok(State::SeekStx),
            (State::SeekDle, _) => {
                *discarded += 1;
                Ok(State::SeekDle)
            }
            (State::SeekStx, STX) => Ok(State::ReadLength { filled: 0 }),
            (State::SeekStx, other) if resync => {
                tracing::warn!("Expected STX after DLE, got {:02X}; resynchronizing", other);
                *discarded += 1;
                if other == DLE {
                    Ok(State::SeekStx)
                } else {
                    Ok(State::SeekDle)
                }
            }
            (State::SeekStx, other) => {
                tracing::warn!("Expected STX after DLE, got {:02X}", other);
                Err(LinkError::NoFrameMarker)
            }
            (State::ReadLength { .. }, _) => Ok(state),
        }
    }
}
