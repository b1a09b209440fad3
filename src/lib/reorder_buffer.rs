//! Reordering buffer for out-of-order completion.
//!
//! This module provides a buffer that accepts items tagged with sequence numbers
//! and releases them in sequential order. The ordered pipeline uses it to restore
//! input order when workers finish items out of order.
//!
//! # Example
//!
//! ```
//! use seqpipe_lib::reorder_buffer::ReorderBuffer;
//!
//! let mut buffer: ReorderBuffer<String> = ReorderBuffer::new();
//!
//! // Insert items out of order
//! buffer.insert(2, "third".to_string());
//! buffer.insert(0, "first".to_string());
//! buffer.insert(1, "second".to_string());
//!
//! // Pop in sequence order
//! assert_eq!(buffer.try_pop_next(), Some("first".to_string()));
//! assert_eq!(buffer.try_pop_next(), Some("second".to_string()));
//! assert_eq!(buffer.try_pop_next(), Some("third".to_string()));
//! assert_eq!(buffer.try_pop_next(), None);
//! ```

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::sequenced::SequencedItem;

/// A buffer that releases items in sequential order.
///
/// Items can be inserted with any sequence number at or after the next expected one,
/// but they are only released once every prior sequence number has been released.
///
/// Backed by a min-heap keyed by sequence number: insert and pop are O(log n) and the
/// smallest buffered sequence is visible in O(1). The buffer is unbounded; if one
/// sequence number is slow to arrive, every later completion accumulates here.
#[derive(Debug)]
pub struct ReorderBuffer<T> {
    heap: BinaryHeap<Reverse<SequencedItem<T>>>,
    /// Next sequence number to release.
    next_seq: u64,
    /// Largest number of items held at once.
    peak_len: usize,
}

impl<T> ReorderBuffer<T> {
    /// Create a new reorder buffer expecting sequence 0 first.
    #[must_use]
    pub fn new() -> Self {
        Self { heap: BinaryHeap::new(), next_seq: 0, peak_len: 0 }
    }

    /// Insert an item with a sequence number.
    ///
    /// Items can be inserted in any order. They will be released
    /// in sequence order via `try_pop_next()` or `drain_ready()`.
    ///
    /// # Panics
    ///
    /// Panics in debug mode if the sequence number was already released.
    pub fn insert(&mut self, seq: u64, item: T) {
        debug_assert!(
            seq >= self.next_seq,
            "Sequence number {seq} was already released (next is {})",
            self.next_seq
        );
        self.heap.push(Reverse(SequencedItem::new(seq, item)));
        self.peak_len = self.peak_len.max(self.heap.len());
    }

    /// Pop the next sequential item if available.
    ///
    /// Returns `Some(item)` if the item with `next_seq` is buffered,
    /// otherwise returns `None`. Advances the expected sequence on success.
    #[must_use]
    pub fn try_pop_next(&mut self) -> Option<T> {
        if !self.can_pop() {
            return None;
        }
        let Reverse(item) = self.heap.pop()?;
        debug_assert!(
            self.heap.peek().is_none_or(|Reverse(next)| next.sequence != item.sequence),
            "Duplicate sequence number: {}",
            item.sequence
        );
        self.next_seq += 1;
        Some(item.value)
    }

    /// Drain all consecutive ready items starting from the current sequence.
    ///
    /// Returns an iterator that yields items in sequence order, stopping
    /// when it reaches a gap in the sequence.
    ///
    /// ```
    /// use seqpipe_lib::reorder_buffer::ReorderBuffer;
    ///
    /// let mut buffer: ReorderBuffer<i32> = ReorderBuffer::new();
    /// buffer.insert(0, 10);
    /// buffer.insert(1, 20);
    /// buffer.insert(3, 40);  // Gap at 2
    ///
    /// let ready: Vec<_> = buffer.drain_ready().collect();
    /// assert_eq!(ready, vec![10, 20]);  // Stops at gap
    /// ```
    pub fn drain_ready(&mut self) -> DrainReady<'_, T> {
        DrainReady { buffer: self }
    }

    /// Check whether the item with the next expected sequence number is buffered.
    #[must_use]
    pub fn can_pop(&self) -> bool {
        self.heap.peek().is_some_and(|Reverse(item)| item.sequence == self.next_seq)
    }

    /// Get the next expected sequence number.
    #[must_use]
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Check if the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Get the number of items currently stored in the buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Largest number of items the buffer has held at once.
    #[must_use]
    pub fn peak_len(&self) -> usize {
        self.peak_len
    }
}

impl<T> Default for ReorderBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator that drains consecutive ready items from a `ReorderBuffer`.
pub struct DrainReady<'a, T> {
    buffer: &'a mut ReorderBuffer<T>,
}

impl<T> Iterator for DrainReady<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.buffer.try_pop_next()
    }
}
