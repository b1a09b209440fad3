//! Shared per-run state: stop flag, first error, and counters.

use log::debug;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::cancel::CancellationToken;
use crate::errors::{PipelineError, Result};
use crate::progress::ProgressTracker;

/// State shared by all workers of one pipeline call.
///
/// Created when the call begins and discarded when it returns.
pub(crate) struct PipelineState {
    /// Set once the run is draining, by error or by an observed cancellation.
    stopped: AtomicBool,
    /// The first recorded error. Later errors are dropped.
    error: Mutex<Option<PipelineError>>,
    /// Caller-held cancellation token, if any.
    external: Option<CancellationToken>,
    /// Set when a worker stopped because of `external`.
    cancel_observed: AtomicBool,
    items_transformed: AtomicU64,
    results_delivered: AtomicU64,
    progress: Option<ProgressTracker>,
}

impl PipelineState {
    pub(crate) fn new(external: Option<CancellationToken>, progress: Option<ProgressTracker>) -> Self {
        Self {
            stopped: AtomicBool::new(false),
            error: Mutex::new(None),
            external,
            cancel_observed: AtomicBool::new(false),
            items_transformed: AtomicU64::new(0),
            results_delivered: AtomicU64::new(0),
            progress,
        }
    }

    /// Record an error and stop the run. First writer wins.
    pub(crate) fn set_error(&self, error: PipelineError) {
        self.stopped.store(true, Ordering::SeqCst);
        let mut guard = self.error.lock();
        if guard.is_none() {
            debug!("Pipeline stopping: {error}");
            *guard = Some(error);
        } else {
            debug!("Dropping error detected after the first: {error}");
        }
    }

    /// Whether workers should stop taking new work.
    ///
    /// Observing the external token here latches the stop flag.
    pub(crate) fn should_stop(&self) -> bool {
        if self.stopped.load(Ordering::Acquire) {
            return true;
        }
        if self.external.as_ref().is_some_and(CancellationToken::is_cancelled) {
            if !self.cancel_observed.swap(true, Ordering::AcqRel) {
                debug!("Pipeline stopping: cancellation requested");
            }
            self.stopped.store(true, Ordering::Release);
            return true;
        }
        false
    }

    pub(crate) fn record_transformed(&self) {
        self.items_transformed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivered(&self) {
        self.results_delivered.fetch_add(1, Ordering::Relaxed);
        if let Some(progress) = &self.progress {
            progress.add(1);
        }
    }

    pub(crate) fn items_transformed(&self) -> u64 {
        self.items_transformed.load(Ordering::Relaxed)
    }

    pub(crate) fn results_delivered(&self) -> u64 {
        self.results_delivered.load(Ordering::Relaxed)
    }

    /// Resolve the single outcome of the run once every worker has exited.
    pub(crate) fn into_outcome(self) -> Result<()> {
        if let Some(progress) = &self.progress {
            progress.finish();
        }
        if let Some(error) = self.error.into_inner() {
            return Err(error);
        }
        if self.cancel_observed.into_inner() {
            return Err(PipelineError::Cancelled {
                delivered: self.results_delivered.into_inner(),
            });
        }
        Ok(())
    }
}
