//! Parallel transform pipeline with ordered or unordered delivery.
//!
//! A pipeline pulls items from a fallible source, applies a transform on a fixed pool
//! of worker threads, and hands the results to a sink.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────┐     ┌─────────────────────┐     ┌──────────────────┐     ┌──────┐
//! │ SequenceSource │────>│ Worker 0 .. N-1     │────>│ ReorderBuffer    │────>│ Sink │
//! │ (mutex pull,   │     │ (transform, runs    │     │ (ordered mode    │     │      │
//! │  seq numbers)  │     │  out of order)      │     │  only)           │     │      │
//! └────────────────┘     └─────────────────────┘     └──────────────────┘     └──────┘
//! ```
//!
//! - **Ordered** ([`run_ordered`]): each input yields exactly one result, and the sink
//!   sees results in input order.
//! - **Unordered** ([`run_unordered`]): each input may emit any number of results through
//!   an [`Emitter`]; the sink sees them in completion order.
//! - **Grouped** ([`run_grouped`]): consecutive inputs are first grouped by a
//!   [`Grouper`], then the groups run through the unordered pipeline.
//!
//! Backpressure is implicit: a worker cannot pull its next item until it has disposed of
//! the current one. With one thread everything runs on the calling thread.
//!
//! # Failure
//!
//! The first error (source, transform, sink, or a worker panic) stops the run; workers
//! finish the item they are on, pull nothing further, and the call returns that error.
//! Later errors are dropped. Results already handed to the sink stay delivered.
//!
//! # Example
//!
//! ```
//! use seqpipe_lib::pipeline::{PipelineConfig, run_ordered};
//! use seqpipe_lib::source::infallible;
//!
//! let mut out = Vec::new();
//! let config = PipelineConfig::new(4);
//! run_ordered(
//!     &config,
//!     infallible(1..=5_u64),
//!     |x, _seq, _worker| Ok::<_, std::io::Error>(x * x),
//!     |y| {
//!         out.push(y);
//!         Ok::<_, std::io::Error>(())
//!     },
//! )
//! .unwrap();
//! assert_eq!(out, vec![1, 4, 9, 16, 25]);
//! ```

mod delivery;
mod state;
mod worker;

use std::time::{Duration, Instant};

use log::debug;

use crate::cancel::CancellationToken;
use crate::errors::{self, BoxError, PipelineError};
use crate::grouper::{Grouped, Grouper};
use crate::progress::ProgressTracker;
use crate::sequenced::SequencedItem;
use crate::source::{Pull, SequenceSource};

use delivery::{Delivery, OrderedDelivery, UnorderedDelivery};
use state::PipelineState;

/// Push-source channel slots per worker thread.
pub const DEFAULT_QUEUE_FACTOR: usize = 4;

// ============================================================================
// Configuration and statistics
// ============================================================================

/// Configuration for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of worker threads.
    pub threads: usize,
    /// Token the caller can use to stop the run early.
    pub cancellation: Option<CancellationToken>,
    /// Progress logging as `(message, interval)`.
    pub progress: Option<(String, u64)>,
    /// Channel slots per thread for push-style sources.
    pub queue_factor: usize,
}

impl PipelineConfig {
    /// Create a configuration with `threads` workers.
    ///
    /// # Panics
    ///
    /// Panics if `threads` is zero; a pipeline needs at least one worker.
    #[must_use]
    pub fn new(threads: usize) -> Self {
        assert!(threads >= 1, "pipeline requires at least one worker thread, got {threads}");
        Self { threads, cancellation: None, progress: None, queue_factor: DEFAULT_QUEUE_FACTOR }
    }

    /// Stop the run when `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Log a progress line every `interval` delivered results.
    #[must_use]
    pub fn with_progress(mut self, message: impl Into<String>, interval: u64) -> Self {
        self.progress = Some((message.into(), interval));
        self
    }

    /// Set the push-source channel slots per thread.
    ///
    /// # Panics
    ///
    /// Panics if `factor` is zero.
    #[must_use]
    pub fn with_queue_factor(mut self, factor: usize) -> Self {
        assert!(factor >= 1, "queue factor must be at least 1");
        self.queue_factor = factor;
        self
    }

    /// Capacity to give a [`push_source`](crate::source::push_source) feeding this pipeline.
    #[must_use]
    pub fn push_capacity(&self) -> usize {
        self.threads.saturating_mul(self.queue_factor)
    }

    fn new_progress(&self) -> Option<ProgressTracker> {
        self.progress
            .as_ref()
            .map(|(message, interval)| ProgressTracker::new(message.clone(), *interval))
    }

    fn new_state(&self) -> PipelineState {
        PipelineState::new(self.cancellation.clone(), self.new_progress())
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}

/// Counters describing a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Worker threads used.
    pub threads: usize,
    /// Items taken from the source.
    pub items_pulled: u64,
    /// Items whose transform returned successfully.
    pub items_transformed: u64,
    /// Results accepted by the sink.
    pub results_delivered: u64,
    /// Most results held in the reorder buffer at once (ordered mode only).
    pub peak_reorder_len: usize,
    /// Wall time of the run.
    pub elapsed: Duration,
}

// ============================================================================
// Emitter
// ============================================================================

/// Hands results of one unordered transform call to the sink.
pub struct Emitter<'a, R> {
    deliver: &'a mut dyn FnMut(R) -> bool,
    open: bool,
}

impl<'a, R> Emitter<'a, R> {
    fn new(deliver: &'a mut dyn FnMut(R) -> bool) -> Self {
        Self { deliver, open: true }
    }

    /// Deliver a result.
    ///
    /// Returns `false` once the pipeline is stopping; the value is then dropped and the
    /// transform should return.
    pub fn emit(&mut self, value: R) -> bool {
        if !self.open {
            return false;
        }
        self.open = (self.deliver)(value);
        self.open
    }

    /// Whether further results will still be delivered.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open
    }
}

// ============================================================================
// Entry points
// ============================================================================

/// Transform every input with `threads` workers and deliver results in input order.
///
/// `transform` receives `(value, sequence, worker_index)`; `sink` is called once per input,
/// in input order, by one thread at a time.
///
/// # Errors
///
/// Returns the first source, transform, or sink error, a worker panic, or
/// [`PipelineError::Cancelled`] if the configured token stopped the run.
pub fn run_ordered<I, T, E1, F, R, E2, S, E3>(
    config: &PipelineConfig,
    inputs: I,
    transform: F,
    sink: S,
) -> errors::Result<PipelineStats>
where
    I: IntoIterator<Item = Result<T, E1>>,
    I::IntoIter: Send,
    E1: Into<BoxError>,
    F: Fn(T, u64, usize) -> Result<R, E2> + Sync,
    E2: Into<BoxError>,
    R: Send,
    S: FnMut(R) -> Result<(), E3> + Send,
    E3: Into<BoxError>,
{
    let start = Instant::now();
    let mut source = SequenceSource::new(inputs.into_iter());

    if config.threads == 1 {
        return run_ordered_inline(config, &mut source, transform, sink, start);
    }

    let state = config.new_state();
    let delivery = OrderedDelivery::new(sink);
    debug!("Starting ordered pipeline with {} threads", config.threads);

    worker::run_pool(config.threads, &source, &state, &|item: SequencedItem<T>, worker: usize| {
        let (sequence, value) = item.into_parts();
        match transform(value, sequence, worker) {
            Ok(result) => {
                state.record_transformed();
                delivery.deliver(sequence, worker, result, &state)
            }
            Err(e) => {
                state.set_error(PipelineError::Transform { sequence, worker, source: e.into() });
                false
            }
        }
    });

    let stats = PipelineStats {
        threads: config.threads,
        items_pulled: source.pulled(),
        items_transformed: state.items_transformed(),
        results_delivered: state.results_delivered(),
        peak_reorder_len: delivery.peak_buffered(),
        elapsed: start.elapsed(),
    };
    state.into_outcome().map(|()| stats)
}

/// Transform every input with `threads` workers, delivering results as they are produced.
///
/// `transform` receives `(value, sequence, worker_index, emitter)` and may emit zero or
/// more results. The sink is called by one thread at a time, in no particular order.
///
/// # Errors
///
/// As for [`run_ordered`].
pub fn run_unordered<I, T, E1, F, R, E2, S, E3>(
    config: &PipelineConfig,
    inputs: I,
    transform: F,
    sink: S,
) -> errors::Result<PipelineStats>
where
    I: IntoIterator<Item = Result<T, E1>>,
    I::IntoIter: Send,
    E1: Into<BoxError>,
    F: Fn(T, u64, usize, &mut Emitter<'_, R>) -> Result<(), E2> + Sync,
    E2: Into<BoxError>,
    S: FnMut(R) -> Result<(), E3> + Send,
    E3: Into<BoxError>,
{
    let start = Instant::now();
    let mut source = SequenceSource::new(inputs.into_iter());

    if config.threads == 1 {
        return run_unordered_inline(config, &mut source, transform, sink, start);
    }

    let state = config.new_state();
    let delivery = UnorderedDelivery::new(sink);
    debug!("Starting unordered pipeline with {} threads", config.threads);

    worker::run_pool(config.threads, &source, &state, &|item: SequencedItem<T>, worker: usize| {
        let (sequence, value) = item.into_parts();
        let mut deliver = |result: R| delivery.deliver(sequence, worker, result, &state);
        let mut emitter = Emitter::new(&mut deliver);
        match transform(value, sequence, worker, &mut emitter) {
            Ok(()) => {
                state.record_transformed();
                emitter.is_open()
            }
            Err(e) => {
                state.set_error(PipelineError::Transform { sequence, worker, source: e.into() });
                false
            }
        }
    });

    let stats = PipelineStats {
        threads: config.threads,
        items_pulled: source.pulled(),
        items_transformed: state.items_transformed(),
        results_delivered: state.results_delivered(),
        peak_reorder_len: 0,
        elapsed: start.elapsed(),
    };
    state.into_outcome().map(|()| stats)
}

/// Group consecutive inputs with `grouper`, then run the groups through [`run_unordered`].
///
/// Grouping happens under the source lock, so groups are formed in input order and each
/// group's sequence number is its position among the groups.
///
/// # Errors
///
/// As for [`run_ordered`]; a source error ends grouping and discards the partial group.
pub fn run_grouped<I, E1, G, F, R, E2, S, E3>(
    config: &PipelineConfig,
    inputs: I,
    grouper: G,
    transform: F,
    sink: S,
) -> errors::Result<PipelineStats>
where
    I: IntoIterator<Item = Result<G::Item, E1>>,
    I::IntoIter: Send,
    E1: Into<BoxError>,
    G: Grouper + Send,
    G::Group: Send,
    F: Fn(G::Group, u64, usize, &mut Emitter<'_, R>) -> Result<(), E2> + Sync,
    E2: Into<BoxError>,
    S: FnMut(R) -> Result<(), E3> + Send,
    E3: Into<BoxError>,
{
    run_unordered(config, Grouped::new(inputs.into_iter(), grouper), transform, sink)
}

// ============================================================================
// Single-thread path
// ============================================================================

/// Ordered run on the calling thread: pull, transform, deliver, repeat.
fn run_ordered_inline<I, T, E1, F, R, E2, S, E3>(
    config: &PipelineConfig,
    source: &mut SequenceSource<I>,
    transform: F,
    mut sink: S,
    start: Instant,
) -> errors::Result<PipelineStats>
where
    I: Iterator<Item = Result<T, E1>>,
    E1: Into<BoxError>,
    F: Fn(T, u64, usize) -> Result<R, E2>,
    E2: Into<BoxError>,
    S: FnMut(R) -> Result<(), E3>,
    E3: Into<BoxError>,
{
    let progress = config.new_progress();
    let mut stats = PipelineStats { threads: 1, ..PipelineStats::default() };

    loop {
        if config.is_cancelled() {
            return Err(PipelineError::Cancelled { delivered: stats.results_delivered });
        }
        let (sequence, value) = match source.pull_exclusive() {
            Pull::Item(item) => item.into_parts(),
            Pull::Exhausted | Pull::Failed(None) => break,
            Pull::Failed(Some(error)) => return Err(error),
        };
        stats.items_pulled += 1;

        let result = transform(value, sequence, 0).map_err(|e| PipelineError::Transform {
            sequence,
            worker: 0,
            source: e.into(),
        })?;
        stats.items_transformed += 1;

        sink(result).map_err(|e| PipelineError::Sink { sequence, source: e.into() })?;
        stats.results_delivered += 1;
        if let Some(progress) = &progress {
            progress.add(1);
        }
    }

    if let Some(progress) = &progress {
        progress.finish();
    }
    stats.elapsed = start.elapsed();
    Ok(stats)
}

/// Unordered run on the calling thread. Emitted results reach the sink immediately.
fn run_unordered_inline<I, T, E1, F, R, E2, S, E3>(
    config: &PipelineConfig,
    source: &mut SequenceSource<I>,
    transform: F,
    mut sink: S,
    start: Instant,
) -> errors::Result<PipelineStats>
where
    I: Iterator<Item = Result<T, E1>>,
    E1: Into<BoxError>,
    F: Fn(T, u64, usize, &mut Emitter<'_, R>) -> Result<(), E2>,
    E2: Into<BoxError>,
    S: FnMut(R) -> Result<(), E3>,
    E3: Into<BoxError>,
{
    let progress = config.new_progress();
    let mut stats = PipelineStats { threads: 1, ..PipelineStats::default() };

    loop {
        if config.is_cancelled() {
            return Err(PipelineError::Cancelled { delivered: stats.results_delivered });
        }
        let (sequence, value) = match source.pull_exclusive() {
            Pull::Item(item) => item.into_parts(),
            Pull::Exhausted | Pull::Failed(None) => break,
            Pull::Failed(Some(error)) => return Err(error),
        };
        stats.items_pulled += 1;

        let mut sink_error: Option<BoxError> = None;
        let mut delivered = 0_u64;
        let mut deliver = |result: R| match sink(result) {
            Ok(()) => {
                delivered += 1;
                if let Some(progress) = &progress {
                    progress.add(1);
                }
                true
            }
            Err(e) => {
                sink_error = Some(e.into());
                false
            }
        };
        let outcome = transform(value, sequence, 0, &mut Emitter::new(&mut deliver));
        stats.results_delivered += delivered;

        // A sink failure during emit was detected before the transform returned.
        if let Some(error) = sink_error {
            return Err(PipelineError::Sink { sequence, source: error });
        }
        outcome.map_err(|e| PipelineError::Transform { sequence, worker: 0, source: e.into() })?;
        stats.items_transformed += 1;
    }

    if let Some(progress) = &progress {
        progress.finish();
    }
    stats.elapsed = start.elapsed();
    Ok(stats)
}
