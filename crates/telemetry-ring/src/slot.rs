use crossbeam_utils::atomic::AtomicCell;

/// One cell of the ring buffer: either empty or owning a boxed item.
///
/// The contents change hands with a single atomic exchange. `Option<Box<T>>`
/// is pointer-sized, so the `AtomicCell` is lock-free for every sized `T`.
pub struct Slot<T> {
    cell: AtomicCell<Option<Box<T>>>,
}

impl<T> Slot<T> {
    pub(crate) fn new() -> Self {
        Self {
            cell: AtomicCell::new(None),
        }
    }

    /// Stores `item` and returns whatever the slot held before.
    #[inline]
    pub(crate) fn put(&self, item: Box<T>) -> Option<Box<T>> {
        self.cell.swap(Some(item))
    }

    /// Releases the slot, handing its item (if any) to the caller.
    ///
    /// Consume callbacks call this once per visited slot; the slot is empty
    /// afterwards.
    #[inline]
    pub fn take(&self) -> Option<Box<T>> {
        self.cell.take()
    }
}

impl<T> std::fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Slot")
    }
}
