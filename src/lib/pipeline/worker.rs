//! Worker pool: N threads sharing one source.

use log::debug;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread;

use crate::errors::{BoxError, PipelineError, panic_message};
use crate::sequenced::SequencedItem;
use crate::source::{Pull, SequenceSource};

use super::state::PipelineState;

/// Run `threads` workers over `source` until it ends, an error is recorded, or the run
/// is cancelled. Returns once every worker has exited.
///
/// `work` processes one item on behalf of a worker and returns `false` when that worker
/// should stop. A panic inside `work` is recorded as [`PipelineError::WorkerPanicked`].
pub(crate) fn run_pool<I, T, E, W>(
    threads: usize,
    source: &SequenceSource<I>,
    state: &PipelineState,
    work: &W,
) where
    I: Iterator<Item = Result<T, E>> + Send,
    E: Into<BoxError>,
    W: Fn(SequencedItem<T>, usize) -> bool + Sync,
{
    thread::scope(|scope| {
        for worker in 0..threads {
            scope.spawn(move || {
                let outcome = catch_unwind(AssertUnwindSafe(|| worker_loop(worker, source, state, work)));
                if let Err(payload) = outcome {
                    state.set_error(PipelineError::WorkerPanicked {
                        worker,
                        message: panic_message(payload.as_ref()),
                    });
                }
            });
        }
    });
}

fn worker_loop<I, T, E, W>(worker: usize, source: &SequenceSource<I>, state: &PipelineState, work: &W)
where
    I: Iterator<Item = Result<T, E>>,
    E: Into<BoxError>,
    W: Fn(SequencedItem<T>, usize) -> bool,
{
    let mut processed = 0_u64;
    loop {
        if state.should_stop() {
            break;
        }
        match source.pull() {
            Pull::Item(item) => {
                processed += 1;
                if !work(item, worker) {
                    break;
                }
            }
            Pull::Exhausted | Pull::Failed(None) => break,
            Pull::Failed(Some(error)) => {
                state.set_error(error);
                break;
            }
        }
    }
    debug!("Worker {worker} exiting after {processed} items");
}
