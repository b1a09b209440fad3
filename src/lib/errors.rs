//! Error types for pipeline runs.
//!
//! Caller-supplied sources, transforms, and sinks may fail with any error type that
//! converts into a [`BoxError`]. The pipeline wraps the first such failure in a
//! [`PipelineError`] that records where it happened.

use thiserror::Error;

/// Boxed error type accepted from caller-supplied sources, transforms, and sinks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// The single terminal error of a pipeline run.
///
/// Exactly one of these is surfaced per run: whichever failure was detected first.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The input source failed to produce the next item.
    #[error("Input source failed at item {sequence}: {source}")]
    Source {
        /// Sequence number the failed item would have been assigned
        sequence: u64,
        /// The error reported by the source
        source: BoxError,
    },

    /// The transform failed on an item.
    #[error("Transform failed on item {sequence} (worker {worker}): {source}")]
    Transform {
        /// Sequence number of the failed item
        sequence: u64,
        /// Index of the worker that ran the transform
        worker: usize,
        /// The error returned by the transform
        source: BoxError,
    },

    /// The result sink rejected a result.
    #[error("Result sink failed on item {sequence}: {source}")]
    Sink {
        /// Sequence number of the input the rejected result came from
        sequence: u64,
        /// The error returned by the sink
        source: BoxError,
    },

    /// A worker thread panicked while transforming or delivering.
    #[error("Worker thread {worker} panicked: {message}")]
    WorkerPanicked {
        /// Index of the worker that panicked
        worker: usize,
        /// The panic payload, when it was a string
        message: String,
    },

    /// The run was stopped through its cancellation token before finishing.
    #[error("Pipeline cancelled after {delivered} results were delivered")]
    Cancelled {
        /// Results handed to the sink before the stop was observed
        delivered: u64,
    },
}

impl PipelineError {
    /// The sequence number of the item the error is attached to, if any.
    #[must_use]
    pub fn sequence(&self) -> Option<u64> {
        match self {
            Self::Source { sequence, .. }
            | Self::Transform { sequence, .. }
            | Self::Sink { sequence, .. } => Some(*sequence),
            Self::WorkerPanicked { .. } | Self::Cancelled { .. } => None,
        }
    }

    /// True when the run stopped because of a cancellation request rather than a failure.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Extract a human-readable message from a panic payload.
///
/// Handles the common `&str` and `String` payloads, with a fallback for other types.
#[must_use]
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
