//! Sliding deadline and bounded reads.
//!
//! A [`SlidingDeadline`] expires `timeout` after the last forward
//! progress. [`read_some`] waits for data no longer than one poll
//! interval (or the time left, whichever is shorter), so callers get
//! back control often enough to check cancellation and expiry.

use std::io::ErrorKind;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::Instant;

use crate::error::Result;

/// Deadline reset on every successful read.
#[derive(Debug, Clone, Copy)]
pub struct SlidingDeadline {
    timeout: Duration,
    expires_at: Instant,
}

impl SlidingDeadline {
    /// Start a deadline `timeout` from now.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            expires_at: Instant::now() + timeout,
        }
    }

    /// Record forward progress.
    #[inline]
    pub fn reset(&mut self) {
        self.expires_at = Instant::now() + self.timeout;
    }

    /// Check if the deadline has passed.
    #[inline]
    pub fn expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Time left before expiry (zero once expired).
    #[inline]
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}

/// Read whatever is available into `buf`, waiting at most one poll
/// interval.
///
/// Returns `Ok(0)` when nothing arrived in that window. A transport that
/// reports zero bytes immediately is treated as "no data yet" and the
/// window is slept out before returning.
pub async fn read_some<R>(
    reader: &mut R,
    buf: &mut [u8],
    deadline: &SlidingDeadline,
    poll_interval: Duration,
) -> Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let window = deadline.remaining().min(poll_interval);

    match tokio::time::timeout(window, reader.read(buf)).await {
        Err(_elapsed) => Ok(0),
        Ok(Ok(0)) => {
            tokio::time::sleep(window).await;
            Ok(0)
        }
        Ok(Ok(n)) => Ok(n),
        Ok(Err(e))
            if matches!(
                e.kind(),
                ErrorKind::WouldBlock | ErrorKind::Interrupted | ErrorKind::TimedOut
            ) =>
        {
            tokio::time::sleep(window).await;
            Ok(0)
        }
        Ok(Err(e)) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ScriptedTransport, Step};

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expires_after_timeout() {
        let deadline = SlidingDeadline::new(Duration::from_secs(3));
        assert!(!deadline.expired());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!deadline.expired());
        assert!(deadline.remaining() <= Duration::from_secs(1));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(deadline.expired());
        assert_eq!(deadline.remaining(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_slides_the_deadline() {
        let mut deadline = SlidingDeadline::new(Duration::from_secs(3));

        tokio::time::advance(Duration::from_secs(2)).await;
        deadline.reset();
        tokio::time::advance(Duration::from_secs(2)).await;

        assert!(!deadline.expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_some_waits_one_window_when_idle() {
        let mut device = ScriptedTransport::new();
        let deadline = SlidingDeadline::new(Duration::from_secs(3));
        let mut buf = [0u8; 4];

        let start = Instant::now();
        let n = read_some(&mut device, &mut buf, &deadline, Duration::from_millis(10))
            .await
            .unwrap();

        assert_eq!(n, 0);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(10) && elapsed < Duration::from_millis(12));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_some_returns_available_bytes() {
        let mut device = ScriptedTransport::new().preload(Step::bytes([1u8, 2, 3]));
        let deadline = SlidingDeadline::new(Duration::from_secs(3));
        let mut buf = [0u8; 4];

        let n = read_some(&mut device, &mut buf, &deadline, Duration::from_millis(10))
            .await
            .unwrap();

        assert_eq!(&buf[..n], &[1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_some_never_waits_past_deadline() {
        let mut device = ScriptedTransport::new().preload(Step::pause(Duration::from_secs(60)));
        let deadline = SlidingDeadline::new(Duration::from_millis(4));
        let mut buf = [0u8; 4];

        let start = Instant::now();
        let n = read_some(&mut device, &mut buf, &deadline, Duration::from_millis(10))
            .await
            .unwrap();

        assert_eq!(n, 0);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(4) && elapsed < Duration::from_millis(6));
    }
}
