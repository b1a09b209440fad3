//! Result delivery strategies.
//!
//! Both strategies serialize sink calls behind a single delivery lock, so the sink never
//! needs to be thread-safe. The ordered strategy additionally routes results through a
//! [`ReorderBuffer`] and drains the contiguous ready run while holding that lock.
//!
//! A sink failure, including a panic, is recorded before the delivery lock is released,
//! so no other worker can deliver past the failed item.

use std::panic::{AssertUnwindSafe, catch_unwind};

use parking_lot::Mutex;

use crate::errors::{BoxError, PipelineError, panic_message};
use crate::reorder_buffer::ReorderBuffer;

use super::state::PipelineState;

/// Hands transformed results to the caller's sink.
pub(crate) trait Delivery<R>: Sync {
    /// Deliver the result of input `sequence`, produced by `worker`.
    ///
    /// Returns `false` once the run is stopping and the caller should stop producing.
    fn deliver(&self, sequence: u64, worker: usize, result: R, state: &PipelineState) -> bool;

    /// Largest number of results held back at once.
    fn peak_buffered(&self) -> usize {
        0
    }
}

/// Call the sink once, recording an error or panic in `state`.
fn call_sink<R, S, E>(
    sink: &mut S,
    result: R,
    sequence: u64,
    worker: usize,
    state: &PipelineState,
) -> bool
where
    S: FnMut(R) -> Result<(), E>,
    E: Into<BoxError>,
{
    match catch_unwind(AssertUnwindSafe(|| sink(result))) {
        Ok(Ok(())) => {
            state.record_delivered();
            true
        }
        Ok(Err(e)) => {
            state.set_error(PipelineError::Sink { sequence, source: e.into() });
            false
        }
        Err(payload) => {
            state.set_error(PipelineError::WorkerPanicked {
                worker,
                message: panic_message(payload.as_ref()),
            });
            false
        }
    }
}

// ============================================================================
// Order-preserving delivery
// ============================================================================

struct OrderedInner<R, S> {
    buffer: ReorderBuffer<R>,
    sink: S,
}

/// Delivers results to the sink in strictly increasing sequence order.
pub(crate) struct OrderedDelivery<R, S> {
    inner: Mutex<OrderedInner<R, S>>,
}

impl<R, S> OrderedDelivery<R, S> {
    pub(crate) fn new(sink: S) -> Self {
        Self { inner: Mutex::new(OrderedInner { buffer: ReorderBuffer::new(), sink }) }
    }
}

impl<R, S, E> Delivery<R> for OrderedDelivery<R, S>
where
    R: Send,
    S: FnMut(R) -> Result<(), E> + Send,
    E: Into<BoxError>,
{
    fn deliver(&self, sequence: u64, worker: usize, result: R, state: &PipelineState) -> bool {
        let mut guard = self.inner.lock();
        let OrderedInner { buffer, sink } = &mut *guard;
        buffer.insert(sequence, result);

        // Drain whatever contiguous run is now ready, whichever worker produced it.
        while !state.should_stop() {
            let next = buffer.next_seq();
            let Some(ready) = buffer.try_pop_next() else {
                break;
            };
            if !call_sink(sink, ready, next, worker, state) {
                return false;
            }
        }
        !state.should_stop()
    }

    fn peak_buffered(&self) -> usize {
        self.inner.lock().buffer.peak_len()
    }
}

// ============================================================================
// Unordered delivery
// ============================================================================

/// Delivers results to the sink as soon as they are produced.
pub(crate) struct UnorderedDelivery<S> {
    sink: Mutex<S>,
}

impl<S> UnorderedDelivery<S> {
    pub(crate) fn new(sink: S) -> Self {
        Self { sink: Mutex::new(sink) }
    }
}

impl<R, S, E> Delivery<R> for UnorderedDelivery<S>
where
    S: FnMut(R) -> Result<(), E> + Send,
    E: Into<BoxError>,
{
    fn deliver(&self, sequence: u64, worker: usize, result: R, state: &PipelineState) -> bool {
        let mut sink = self.sink.lock();
        if state.should_stop() {
            return false;
        }
        call_sink(&mut *sink, result, sequence, worker, state)
    }
}
