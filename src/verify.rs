//! Read-back verification of a RAM write.
//!
//! A write goes through `RequestedWrite -> Sent -> Verifying` and ends in
//! a [`VerifyOutcome`]. The device never acknowledges a write, so the only
//! check is to read the RAM back and compare it with the source.

use std::fmt;
use std::io::SeekFrom;

use bytes::BytesMut;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

use crate::error::Result;
use crate::link::Link;
use crate::progress::Progress;
use crate::protocol::Command;
use crate::transport::Transport;

/// Progress of a RAM write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Write request issued, upload not started.
    RequestedWrite,
    /// Whole image uploaded.
    Sent,
    /// Reading the RAM back.
    Verifying,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::RequestedWrite => "write requested",
            Stage::Sent => "image sent",
            Stage::Verifying => "verifying",
        };
        f.write_str(name)
    }
}

/// Result of comparing the RAM read back with the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VerifyOutcome {
    /// Read-back is byte-identical to the source.
    Match,
    /// Read-back differs, starting at this offset.
    Mismatch { first_difference: usize },
    /// Read-back failed or had the wrong size; the write may still be good.
    Inconclusive { reason: String },
}

impl VerifyOutcome {
    /// Check if the data was confirmed.
    pub fn is_match(&self) -> bool {
        matches!(self, VerifyOutcome::Match)
    }
}

impl fmt::Display for VerifyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyOutcome::Match => f.write_str("Verify OK"),
            VerifyOutcome::Mismatch { first_difference } => {
                write!(f, "Verify failed: first difference at {:#06x}", first_difference)
            }
            VerifyOutcome::Inconclusive { reason } => {
                write!(f, "Verify inconclusive ({}), try again", reason)
            }
        }
    }
}

/// Compare two images byte for byte.
///
/// Images of different lengths differ at the end of the shorter one.
pub fn compare(expected: &[u8], actual: &[u8]) -> VerifyOutcome {
    let first_difference = expected
        .iter()
        .zip(actual)
        .position(|(a, b)| a != b)
        .or_else(|| (expected.len() != actual.len()).then(|| expected.len().min(actual.len())));

    match first_difference {
        Some(first_difference) => VerifyOutcome::Mismatch { first_difference },
        None => VerifyOutcome::Match,
    }
}

/// Read the RAM back and compare it with `source` from its start.
///
/// Receive failures and length mismatches are reported as
/// [`VerifyOutcome::Inconclusive`]; only cancellation and errors on the
/// source are returned as `Err`.
pub async fn verify_write<T, R>(
    link: &mut Link<T>,
    source: &mut R,
    expected_len: u64,
    progress: &mut dyn Progress,
) -> Result<VerifyOutcome>
where
    T: Transport,
    R: AsyncRead + AsyncSeek + Unpin + ?Sized,
{
    tracing::debug!("RAM write: {}", Stage::Verifying);
    progress.start("Verifying");

    let header = match link.request(Command::ReadRam).await {
        Ok(header) => header,
        Err(e) if e.is_cancelled() => return Err(e),
        Err(e) => return Ok(inconclusive(e.to_string())),
    };
    if header.length as u64 != expected_len {
        return Ok(inconclusive(format!(
            "device returned {} bytes, expected {}",
            header.length, expected_len
        )));
    }

    let mut readback = BytesMut::zeroed(header.length as usize);
    match link
        .receive_into_buffer(header.length, &mut readback, progress)
        .await
    {
        Ok(()) => {}
        Err(e) if e.is_cancelled() => return Err(e),
        Err(e) => return Ok(inconclusive(e.to_string())),
    }

    source.seek(SeekFrom::Start(0)).await?;
    let mut original = Vec::with_capacity(readback.len());
    (&mut *source)
        .take(expected_len)
        .read_to_end(&mut original)
        .await?;

    let outcome = compare(&original, &readback);
    match &outcome {
        VerifyOutcome::Match => tracing::info!("Verified {} bytes", expected_len),
        other => tracing::warn!("{}", other),
    }
    Ok(outcome)
}

fn inconclusive(reason: String) -> VerifyOutcome {
    tracing::warn!("Verification inconclusive: {}", reason);
    VerifyOutcome::Inconclusive { reason }
}
