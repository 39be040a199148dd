//! Transfer progress reporting.
//!
//! The bulk transfer loops call [`Progress::update`] after every
//! successful read or write with the declared total and the bytes still
//! remaining. Reporting never affects control flow.

/// Receiver of transfer progress.
pub trait Progress {
    /// Called before a transfer phase begins, with a short label.
    fn start(&mut self, _label: &'static str) {}

    /// Called after each chunk with `(total, remaining)` byte counts.
    fn update(&mut self, total: u64, remaining: u64);

    /// Called once when the transfer loop exits, successful or not.
    fn finish(&mut self) {}
}

/// Progress sink that ignores every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    #[inline]
    fn update(&mut self, _total: u64, _remaining: u64) {}
}

impl<F> Progress for F
where
    F: FnMut(u64, u64),
{
    fn update(&mut self, total: u64, remaining: u64) {
        self(total, remaining)
    }
}

/// Percentage done, for display.
pub fn percent(total: u64, remaining: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (total.saturating_sub(remaining) as f64 / total as f64) * 100.0
}
