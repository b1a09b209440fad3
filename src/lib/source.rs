//! Input sources for the pipeline.
//!
//! [`SequenceSource`] wraps a fallible iterator into a thread-safe "pull next"
//! operation that assigns gap-free sequence numbers. [`push_source`] adapts a
//! push-style generator into such an iterator by running it on a producer thread
//! behind a bounded channel.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐    ┌─────────────────┐    ┌─────────────────┐
//! │   Generator     │───>│ Bounded channel │───>│ SequenceSource  │───> workers
//! │ (push thread)   │    │ (backpressure)  │    │  (mutex pull)   │
//! └─────────────────┘    └─────────────────┘    └─────────────────┘
//! ```

use std::convert::Infallible;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, bounded};
use parking_lot::Mutex;

use crate::cancel::CancellationToken;
use crate::errors::{BoxError, PipelineError, panic_message};
use crate::sequenced::SequencedItem;

/// Outcome of a single pull from a [`SequenceSource`].
#[derive(Debug)]
pub enum Pull<T> {
    /// The next item, tagged with its sequence number.
    Item(SequencedItem<T>),
    /// The underlying iterator is exhausted.
    Exhausted,
    /// The underlying iterator failed.
    ///
    /// Only the first pull to observe the failure receives the error; later pulls get
    /// `Failed(None)` because it has already been reported.
    Failed(Option<PipelineError>),
}

enum SourceState<I> {
    Open(I),
    Exhausted,
    Failed,
}

struct SourceInner<I> {
    state: SourceState<I>,
    next_seq: u64,
}

/// Serialized, sequence-numbering access to a fallible iterator.
///
/// Each element of the underlying iterator is pulled exactly once. Once the iterator ends
/// or yields an error it is dropped and never polled again, and every later pull reports
/// the same outcome.
pub struct SequenceSource<I> {
    inner: Mutex<SourceInner<I>>,
}

impl<I, T, E> SequenceSource<I>
where
    I: Iterator<Item = Result<T, E>>,
    E: Into<BoxError>,
{
    /// Wrap an iterator. The first item pulled gets sequence 0.
    #[must_use]
    pub fn new(iter: I) -> Self {
        Self { inner: Mutex::new(SourceInner { state: SourceState::Open(iter), next_seq: 0 }) }
    }

    /// Pull the next item, serialized against concurrent callers.
    pub fn pull(&self) -> Pull<T> {
        self.inner.lock().pull()
    }

    /// Pull without locking, for callers that have exclusive access.
    pub fn pull_exclusive(&mut self) -> Pull<T> {
        self.inner.get_mut().pull()
    }
}

impl<I> SequenceSource<I> {
    /// Number of items handed out so far (also the next sequence number).
    #[must_use]
    pub fn pulled(&self) -> u64 {
        self.inner.lock().next_seq
    }
}

impl<I, T, E> SourceInner<I>
where
    I: Iterator<Item = Result<T, E>>,
    E: Into<BoxError>,
{
    fn pull(&mut self) -> Pull<T> {
        let next = match &mut self.state {
            SourceState::Open(iter) => catch_unwind(AssertUnwindSafe(|| iter.next())),
            SourceState::Exhausted => return Pull::Exhausted,
            SourceState::Failed => return Pull::Failed(None),
        };

        // A panicking iterator is treated like a failed one and never polled again.
        let next = match next {
            Ok(next) => next,
            Err(payload) => {
                self.state = SourceState::Failed;
                let message = format!("input source panicked: {}", panic_message(payload.as_ref()));
                return Pull::Failed(Some(PipelineError::Source {
                    sequence: self.next_seq,
                    source: message.into(),
                }));
            }
        };

        match next {
            Some(Ok(value)) => {
                let sequence = self.next_seq;
                self.next_seq += 1;
                Pull::Item(SequencedItem::new(sequence, value))
            }
            Some(Err(e)) => {
                self.state = SourceState::Failed;
                Pull::Failed(Some(PipelineError::Source { sequence: self.next_seq, source: e.into() }))
            }
            None => {
                self.state = SourceState::Exhausted;
                Pull::Exhausted
            }
        }
    }
}

/// Wrap an infallible iterator so it can be used as a pipeline input.
pub fn infallible<I: IntoIterator>(iter: I) -> impl Iterator<Item = Result<I::Item, Infallible>> {
    iter.into_iter().map(Ok)
}

// ============================================================================
// Push-style sources
// ============================================================================

/// Handle given to a push-style generator.
///
/// Offers the push function and the stop check of the generator contract.
pub struct Pusher<T> {
    tx: Sender<Result<T, BoxError>>,
    stop: CancellationToken,
}

impl<T> Pusher<T> {
    /// Send a value downstream, blocking while the channel is full.
    ///
    /// Returns `false` once the consumer has stopped; the generator should return then.
    pub fn push(&self, value: T) -> bool {
        if self.stop.is_cancelled() {
            return false;
        }
        self.tx.send(Ok(value)).is_ok()
    }

    /// Whether the consumer has stopped listening.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }
}

/// Iterator over values produced by a push-style generator on a background thread.
///
/// Dropping it raises the stop flag, closes the channel to unblock a pending push, and
/// joins the producer thread.
pub struct PushSource<T> {
    receiver: Option<Receiver<Result<T, BoxError>>>,
    handle: Option<JoinHandle<()>>,
    stop: CancellationToken,
}

/// Run `generator` on a producer thread and expose what it pushes as an iterator.
///
/// `capacity` bounds the number of values buffered ahead of the consumer; a full channel
/// blocks the generator. An error returned by the generator, or a panic inside it, is
/// yielded as the final item.
///
/// # Panics
///
/// Panics if `capacity` is zero.
///
/// # Example
/// ```
/// use seqpipe_lib::source::push_source;
///
/// let values: Vec<u32> = push_source(4, |pusher| {
///     for i in 0..10 {
///         if !pusher.push(i) {
///             break;
///         }
///     }
///     Ok::<(), std::io::Error>(())
/// })
/// .map(|r| r.unwrap())
/// .collect();
/// assert_eq!(values, (0..10).collect::<Vec<_>>());
/// ```
pub fn push_source<T, E, F>(capacity: usize, generator: F) -> PushSource<T>
where
    T: Send + 'static,
    E: Into<BoxError>,
    F: FnOnce(&Pusher<T>) -> Result<(), E> + Send + 'static,
{
    assert!(capacity > 0, "push source capacity must be at least 1");
    let (tx, rx) = bounded(capacity);
    let stop = CancellationToken::new();
    let pusher = Pusher { tx, stop: stop.clone() };

    let handle = thread::spawn(move || {
        let outcome = catch_unwind(AssertUnwindSafe(|| generator(&pusher)));
        let error: Option<BoxError> = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.into()),
            Err(payload) => {
                Some(format!("push source panicked: {}", panic_message(payload.as_ref())).into())
            }
        };
        if let Some(error) = error {
            log::debug!("Push source finished with error: {error}");
            // The consumer may already be gone; nothing else to report to.
            let _ = pusher.tx.send(Err(error));
        }
    });

    PushSource { receiver: Some(rx), handle: Some(handle), stop }
}

impl<T> Iterator for PushSource<T> {
    type Item = Result<T, BoxError>;

    fn next(&mut self) -> Option<Self::Item> {
        let receiver = self.receiver.as_ref()?;
        match receiver.recv() {
            Ok(item) => Some(item),
            Err(_) => {
                // Producer finished and dropped its sender.
                self.receiver = None;
                None
            }
        }
    }
}

impl<T> Drop for PushSource<T> {
    fn drop(&mut self) {
        self.stop.cancel();
        // Close the receiver first so a producer blocked on a full channel wakes up.
        drop(self.receiver.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("Push source producer thread panicked during shutdown");
            }
        }
    }
}
