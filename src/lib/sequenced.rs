//! Items tagged with the sequence number they were pulled at.

use std::cmp::Ordering;

/// A value tagged with its input sequence number.
///
/// Sequence numbers are assigned by the source in strictly increasing order starting at 0,
/// with no gaps. Equality and ordering consider the sequence number only, so values need
/// not be comparable themselves.
#[derive(Debug, Clone, Copy)]
pub struct SequencedItem<T> {
    /// Position of the item in the input stream.
    pub sequence: u64,
    /// The item itself.
    pub value: T,
}

impl<T> SequencedItem<T> {
    /// Tag `value` with `sequence`.
    #[must_use]
    pub fn new(sequence: u64, value: T) -> Self {
        Self { sequence, value }
    }

    /// Split into `(sequence, value)`.
    #[must_use]
    pub fn into_parts(self) -> (u64, T) {
        (self.sequence, self.value)
    }
}

impl<T> PartialEq for SequencedItem<T> {
    fn eq(&self, other: &Self) -> bool {
        self.sequence == other.sequence
    }
}

impl<T> Eq for SequencedItem<T> {}

impl<T> PartialOrd for SequencedItem<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for SequencedItem<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sequence.cmp(&other.sequence)
    }
}
