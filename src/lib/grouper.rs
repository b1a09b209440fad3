//! Groupers that turn a stream of items into a stream of groups.
//!
//! A [`Grouper`] is fed items one at a time and emits complete groups as soon as it
//! can tell they are complete. [`Grouped`] drives a grouper over a fallible iterator so
//! the groups can be fed into a pipeline as ordinary input items.

use std::iter::FusedIterator;

/// Incrementally groups items.
pub trait Grouper {
    /// The input item type.
    type Item;
    /// The group type emitted.
    type Group;

    /// Add an item, returning any groups that are now complete.
    fn add(&mut self, item: Self::Item) -> Vec<Self::Group>;

    /// Flush whatever is buffered once input has ended.
    fn finish(&mut self) -> Option<Self::Group>;

    /// Whether items are buffered that have not yet been emitted.
    fn has_pending(&self) -> bool;
}

// ============================================================================
// RunGrouper
// ============================================================================

/// Groups runs of consecutive items that share a key.
///
/// ```
/// use seqpipe_lib::grouper::{Grouper, RunGrouper};
///
/// let mut grouper = RunGrouper::new(|x: &i32| x % 2);
/// let mut groups = Vec::new();
/// for x in [1, 4, 2, 6, 9] {
///     groups.extend(grouper.add(x));
/// }
/// groups.extend(grouper.finish());
/// assert_eq!(groups, vec![vec![1], vec![4, 2, 6], vec![9]]);
/// ```
pub struct RunGrouper<T, K, F> {
    key_fn: F,
    current_key: Option<K>,
    current: Vec<T>,
}

impl<T, K, F> RunGrouper<T, K, F>
where
    K: PartialEq,
    F: FnMut(&T) -> K,
{
    /// Create a grouper keyed by `key_fn`.
    #[must_use]
    pub fn new(key_fn: F) -> Self {
        Self { key_fn, current_key: None, current: Vec::new() }
    }
}

impl<T, K, F> Grouper for RunGrouper<T, K, F>
where
    K: PartialEq,
    F: FnMut(&T) -> K,
{
    type Item = T;
    type Group = Vec<T>;

    fn add(&mut self, item: T) -> Vec<Vec<T>> {
        let key = (self.key_fn)(&item);
        let mut complete = Vec::new();
        if self.current_key.as_ref().is_some_and(|current| *current != key) {
            complete.push(std::mem::take(&mut self.current));
        }
        self.current_key = Some(key);
        self.current.push(item);
        complete
    }

    fn finish(&mut self) -> Option<Vec<T>> {
        self.current_key = None;
        if self.current.is_empty() { None } else { Some(std::mem::take(&mut self.current)) }
    }

    fn has_pending(&self) -> bool {
        !self.current.is_empty()
    }
}

// ============================================================================
// Grouped iterator adapter
// ============================================================================

/// Iterator adapter yielding the groups a [`Grouper`] forms over a fallible iterator.
///
/// Errors from the inner iterator are passed through and end the iteration: the partial
/// group buffered at that point is discarded, and the inner iterator is not polled again.
pub struct Grouped<I, G: Grouper> {
    inner: Option<I>,
    grouper: G,
    ready: std::collections::VecDeque<G::Group>,
}

impl<I, G, E> Grouped<I, G>
where
    I: Iterator<Item = Result<G::Item, E>>,
    G: Grouper,
{
    /// Group the items of `inner` with `grouper`.
    pub fn new(inner: I, grouper: G) -> Self {
        Self { inner: Some(inner), grouper, ready: std::collections::VecDeque::new() }
    }
}

impl<I, G, E> Iterator for Grouped<I, G>
where
    I: Iterator<Item = Result<G::Item, E>>,
    G: Grouper,
{
    type Item = Result<G::Group, E>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(group) = self.ready.pop_front() {
                return Some(Ok(group));
            }
            let inner = self.inner.as_mut()?;
            match inner.next() {
                Some(Ok(item)) => self.ready.extend(self.grouper.add(item)),
                Some(Err(e)) => {
                    self.inner = None;
                    return Some(Err(e));
                }
                None => {
                    self.inner = None;
                    return self.grouper.finish().map(Ok);
                }
            }
        }
    }
}

impl<I, G, E> FusedIterator for Grouped<I, G>
where
    I: Iterator<Item = Result<G::Item, E>>,
    G: Grouper,
{
}
