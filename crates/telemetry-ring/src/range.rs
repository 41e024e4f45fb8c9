use crate::Slot;

/// Snapshot of the occupied region, returned by
/// [`BoundedRingBuffer::peek`](crate::BoundedRingBuffer::peek).
///
/// `start` is the sequence number of the oldest queued item; the occupied
/// sequence numbers are `start..start + len`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PeekRange {
    pub start: u64,
    pub len: usize,
}

impl PeekRange {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sequence number one past the newest queued item.
    #[inline]
    pub fn end(&self) -> u64 {
        self.start.wrapping_add(self.len as u64)
    }
}

/// The slots reserved by one [`consume`](crate::BoundedRingBuffer::consume)
/// call, oldest first.
///
/// A reservation that wraps the end of the backing array is exposed as two
/// contiguous pieces; iteration walks `first` then `second`.
pub struct ConsumeRange<'a, T> {
    first: &'a [Slot<T>],
    second: &'a [Slot<T>],
}

impl<T> Clone for ConsumeRange<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ConsumeRange<'_, T> {}

impl<'a, T> ConsumeRange<'a, T> {
    pub(crate) fn new(first: &'a [Slot<T>], second: &'a [Slot<T>]) -> Self {
        Self { first, second }
    }

    pub(crate) fn empty() -> Self {
        Self {
            first: &[],
            second: &[],
        }
    }

    /// Number of reserved slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.first.len() + self.second.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates the reserved slots, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &'a Slot<T>> + 'a {
        let (first, second): (&'a [Slot<T>], &'a [Slot<T>]) = (self.first, self.second);
        first.iter().chain(second)
    }

    /// Visits each slot in order until `f` returns `false`.
    ///
    /// Returns `false` if the walk was cut short.
    pub fn for_each<F>(&self, f: F) -> bool
    where
        F: FnMut(&'a Slot<T>) -> bool,
    {
        self.iter().all(f)
    }

    /// Releases every slot in order, yielding the owned items.
    ///
    /// Slots that were already released are skipped.
    pub fn drain(self) -> impl Iterator<Item = Box<T>> + 'a {
        self.iter().filter_map(Slot::take)
    }
}

impl<T> std::fmt::Debug for ConsumeRange<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumeRange")
            .field("first", &self.first.len())
            .field("second", &self.second.len())
            .finish()
    }
}
