//! Progress logging for long pipeline runs.
//!
//! A [`ProgressTracker`] counts delivered results and logs a line each time the count
//! crosses a multiple of its interval. It is safe to share between worker threads.

use log::info;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::logging::format_count;

/// Thread-safe interval logger.
///
/// # Example
/// ```
/// use seqpipe_lib::progress::ProgressTracker;
///
/// let tracker = ProgressTracker::new("Delivered results", 100);
/// for _ in 0..250 {
///     tracker.add(1); // logs at 100 and 200
/// }
/// tracker.finish(); // logs "Delivered results 250 (complete)"
/// assert_eq!(tracker.count(), 250);
/// ```
#[derive(Debug)]
pub struct ProgressTracker {
    message: String,
    interval: u64,
    count: AtomicU64,
}

impl ProgressTracker {
    /// Create a tracker logging every `interval` items.
    ///
    /// # Panics
    ///
    /// Panics if `interval` is zero.
    #[must_use]
    pub fn new(message: impl Into<String>, interval: u64) -> Self {
        assert!(interval > 0, "progress interval must be at least 1");
        Self { message: message.into(), interval, count: AtomicU64::new(0) }
    }

    /// Add to the count, logging once per interval boundary crossed.
    ///
    /// Returns `true` if the new count lies exactly on a boundary.
    pub fn add(&self, additional: u64) -> bool {
        let prev = self.count.fetch_add(additional, Ordering::Relaxed);
        let now = prev + additional;
        for milestone in (prev / self.interval + 1)..=(now / self.interval) {
            info!("{} {}", self.message, format_count(milestone * self.interval));
        }
        now.is_multiple_of(self.interval)
    }

    /// Log the final count unless the last `add` already logged it.
    pub fn finish(&self) {
        let count = self.count();
        if count > 0 && !count.is_multiple_of(self.interval) {
            info!("{} {} (complete)", self.message, format_count(count));
        }
    }

    /// Items counted so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}
