//! Formatting helpers for log output.
//!
//! Counts, durations, and rates are rendered the same way by progress lines, the
//! pipeline summary, and the CLI.

use std::time::{Duration, Instant};

use crate::pipeline::PipelineStats;

/// Format a count with thousands separators.
///
/// ```
/// use seqpipe_lib::logging::format_count;
///
/// assert_eq!(format_count(0), "0");
/// assert_eq!(format_count(1_234_567), "1,234,567");
/// ```
#[must_use]
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Format a duration as e.g. "45s", "2m 15s", "1h 30m", or "120ms" below a second.
///
/// ```
/// use seqpipe_lib::logging::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_secs(135)), "2m 15s");
/// assert_eq!(format_duration(Duration::from_millis(120)), "120ms");
/// ```
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs == 0 {
        return format!("{}ms", duration.as_millis());
    }
    if secs < 60 {
        return format!("{secs}s");
    }
    if secs < 3600 {
        let (mins, rem) = (secs / 60, secs % 60);
        return if rem == 0 { format!("{mins}m") } else { format!("{mins}m {rem}s") };
    }
    let (hours, mins) = (secs / 3600, (secs % 3600) / 60);
    if mins == 0 { format!("{hours}h") } else { format!("{hours}h {mins}m") }
}

/// Format a throughput as items per second (or per minute when slower than 1/s).
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_rate(count: u64, duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 0.001 {
        return format!("{} items/s", format_count(count));
    }
    let rate = count as f64 / secs;
    if rate >= 1.0 {
        format!("{} items/s", format_count(rate as u64))
    } else {
        format!("{:.1} items/min", rate * 60.0)
    }
}

/// Log a one-block summary of a finished pipeline run.
pub fn log_pipeline_summary(label: &str, stats: &PipelineStats) {
    log::info!("{label} summary:");
    log::info!("  Threads: {}", stats.threads);
    log::info!("  Items pulled: {}", format_count(stats.items_pulled));
    log::info!("  Items transformed: {}", format_count(stats.items_transformed));
    log::info!("  Results delivered: {}", format_count(stats.results_delivered));
    if stats.peak_reorder_len > 0 {
        log::info!("  Peak reorder buffer: {}", format_count(stats.peak_reorder_len as u64));
    }
    log::info!(
        "  Elapsed: {} ({})",
        format_duration(stats.elapsed),
        format_rate(stats.items_transformed, stats.elapsed)
    );
}

/// Times an operation and logs its start and completion.
///
/// ```no_run
/// use seqpipe_lib::logging::OperationTimer;
///
/// let timer = OperationTimer::new("Summing square roots");
/// // ... do work ...
/// timer.log_completion(100_000);
/// ```
pub struct OperationTimer {
    operation: String,
    start_time: Instant,
}

impl OperationTimer {
    /// Start timing and log the start.
    #[must_use]
    pub fn new(operation: &str) -> Self {
        log::info!("{operation} ...");
        Self { operation: operation.to_string(), start_time: Instant::now() }
    }

    /// Log completion with an item count and rate.
    pub fn log_completion(&self, count: u64) {
        let duration = self.start_time.elapsed();
        log::info!(
            "{} completed: {} in {} ({})",
            self.operation,
            format_count(count),
            format_duration(duration),
            format_rate(count, duration)
        );
    }
}
