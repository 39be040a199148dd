//! Link configuration.
//!
//! Timeouts, chunk sizes and delays are tuning knobs tied to the serial
//! throughput and the firmware speed, not protocol invariants. They are
//! collected in [`LinkConfig`], which can be built in code with the
//! fluent setters or loaded from a JSON file:
//!
//! ```json
//! { "timeout": 5000, "recv_chunk_size": 512, "resync_after_bad_stx": true }
//! ```
//!
//! Durations are written in milliseconds; missing fields keep their
//! defaults.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LinkError, Result};
use crate::protocol::{HEADER_PAYLOAD_CAPACITY, REQUEST_SIZE};

/// Default serial speed of the reader firmware.
pub const DEFAULT_BAUD_RATE: u32 = 500_000;

/// Default sliding deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Default wait between reads that returned nothing.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Default scratch chunk for streamed receives.
pub const DEFAULT_RECV_CHUNK_SIZE: usize = 512;

/// Default chunk for uploads to the device.
pub const DEFAULT_SEND_CHUNK_SIZE: usize = 32;

/// Default pause after each uploaded chunk.
pub const DEFAULT_SEND_CHUNK_DELAY: Duration = Duration::from_millis(10);

/// Default pause between a request and its reply.
pub const DEFAULT_REQUEST_SETTLE: Duration = Duration::from_millis(10);

/// Default pause between the write-ram request and the upload.
pub const DEFAULT_WRITE_SETTLE: Duration = Duration::from_millis(50);

/// Default pause after opening the port (the board resets).
pub const DEFAULT_STARTUP_DELAY: Duration = Duration::from_millis(1200);

/// Configuration for a [`Link`](crate::link::Link).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Serial speed in baud.
    pub baud_rate: u32,
    /// Sliding deadline: maximum time without any byte received.
    #[serde(with = "duration_ms")]
    pub timeout: Duration,
    /// Wait between reads that returned no data.
    #[serde(with = "duration_ms")]
    pub poll_interval: Duration,
    /// Scratch chunk size for streamed receives.
    pub recv_chunk_size: usize,
    /// Chunk size for uploads.
    pub send_chunk_size: usize,
    /// Pause after each uploaded chunk; the device has no flow control.
    #[serde(with = "duration_ms")]
    pub send_chunk_delay: Duration,
    /// Pause between sending a request and reading its reply.
    #[serde(with = "duration_ms")]
    pub request_settle: Duration,
    /// Pause between the write-ram request and the upload.
    #[serde(with = "duration_ms")]
    pub write_settle: Duration,
    /// Pause after opening the port.
    #[serde(with = "duration_ms")]
    pub startup_delay: Duration,
    /// Buffer capacity for the cartridge header reply, at most the
    /// 32-byte header block.
    pub header_capacity: usize,
    /// Restart the marker search when DLE is not followed by STX.
    pub resync_after_bad_stx: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            recv_chunk_size: DEFAULT_RECV_CHUNK_SIZE,
            send_chunk_size: DEFAULT_SEND_CHUNK_SIZE,
            send_chunk_delay: DEFAULT_SEND_CHUNK_DELAY,
            request_settle: DEFAULT_REQUEST_SETTLE,
            write_settle: DEFAULT_WRITE_SETTLE,
            startup_delay: DEFAULT_STARTUP_DELAY,
            header_capacity: HEADER_PAYLOAD_CAPACITY,
            resync_after_bad_stx: false,
        }
    }
}

impl LinkConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file and validate it.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Parse a configuration from JSON text and validate it.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the link unusable.
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(LinkError::Config("timeout must be non-zero".to_string()));
        }
        if self.poll_interval.is_zero() {
            return Err(LinkError::Config(
                "poll_interval must be non-zero".to_string(),
            ));
        }
        if self.recv_chunk_size == 0 || self.send_chunk_size == 0 {
            return Err(LinkError::Config(
                "chunk sizes must be non-zero".to_string(),
            ));
        }
        if self.header_capacity < REQUEST_SIZE {
            return Err(LinkError::Config(format!(
                "header_capacity {} is below the minimum of {}",
                self.header_capacity, REQUEST_SIZE
            )));
        }
        if self.header_capacity > HEADER_PAYLOAD_CAPACITY {
            return Err(LinkError::Config(format!(
                "header_capacity {} exceeds the header block size of {}",
                self.header_capacity, HEADER_PAYLOAD_CAPACITY
            )));
        }
        Ok(())
    }

    /// Set the serial speed.
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the sliding deadline.
    ///
    /// Default: 3 seconds
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the wait between empty reads.
    ///
    /// Default: 10 ms
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the streamed receive chunk size.
    ///
    /// Default: 512
    pub fn recv_chunk_size(mut self, size: usize) -> Self {
        self.recv_chunk_size = size;
        self
    }

    /// Set the upload chunk size.
    ///
    /// Default: 32
    pub fn send_chunk_size(mut self, size: usize) -> Self {
        self.send_chunk_size = size;
        self
    }

    /// Set the pause after each uploaded chunk.
    pub fn send_chunk_delay(mut self, delay: Duration) -> Self {
        self.send_chunk_delay = delay;
        self
    }

    /// Set the pause between a request and its reply.
    pub fn request_settle(mut self, delay: Duration) -> Self {
        self.request_settle = delay;
        self
    }

    /// Set the pause before a RAM upload.
    pub fn write_settle(mut self, delay: Duration) -> Self {
        self.write_settle = delay;
        self
    }

    /// Set the pause after opening the port.
    pub fn startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }

    /// Restart the marker search on a bad STX instead of failing.
    pub fn resync_after_bad_stx(mut self, resync: bool) -> Self {
        self.resync_after_bad_stx = resync;
        self
    }
}

/// Serde adapter storing a `Duration` as whole milliseconds.
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
