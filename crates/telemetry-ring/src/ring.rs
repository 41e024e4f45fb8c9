#[cfg(debug_assertions)]
use crate::invariants::debug_assert_single_consumer;
use crate::invariants::{
    debug_assert_bounded_count, debug_assert_head_not_past_tail, debug_assert_vacant_slot,
};
use crate::spin::SpinLock;
use crate::{ConsumeRange, PeekRange, Slot};
use crossbeam_utils::CachePadded;
#[cfg(debug_assertions)]
use std::sync::atomic::AtomicBool;
use std::sync::atomic::{AtomicU64, Ordering};

// =============================================================================
// SYNCHRONIZATION STRATEGY
// =============================================================================
//
// ## Sequence Numbers
//
// `head` and `tail` are unbounded u64 sequence numbers; the slot for sequence
// `s` is `slots[s % capacity]`. Occupancy is `tail - head`. At 10 billion
// items/second, u64 wrap takes ~58 years.
//
// ## Cursor Critical Section
//
// Every *write* to `head` or `tail` happens with the cursor spin lock held:
// - Producer: check `tail - head < capacity`, exchange the item into the slot
//   at `tail`, bump `tail`. All three under the lock, so a slot is never
//   published before it is filled and two producers never claim one slot.
// - Consumer: snapshot `[head, head + n)` under the lock, release the lock,
//   run the callback, then bump `head` under the lock again.
//
// The lock's Acquire/Release pairs give the happens-before edges between a
// consumer releasing a slot and the producer that later refills it.
//
// ## Slot Ownership
//
// - Slots in `[head, tail)` are occupied and belong to the consumer side.
// - Every other slot is empty and may be claimed by the next producer.
// - While a consume callback runs, `head` has not moved yet, so the reserved
//   slots still count as occupied and producers cannot reach them.
//
// The cursors are also stored with Release so that `len()` can give a cheap,
// possibly stale, lock-free estimate.
//
// =============================================================================

/// Fixed-capacity concurrent FIFO of owned items.
///
/// Any number of threads may hand items in with [`add`](Self::add) or
/// [`try_push`](Self::try_push); exactly one thread at a time drains the
/// oldest items with [`consume`](Self::consume). When the buffer is full the
/// incoming item is rejected and handed back; queued items are never
/// overwritten and the buffer never grows.
pub struct BoundedRingBuffer<T> {
    /// Sequence number of the oldest queued item (written by the consumer)
    head: CachePadded<AtomicU64>,
    /// Sequence number of the next free slot (written by producers)
    tail: CachePadded<AtomicU64>,
    /// Guards every update of `head`/`tail`
    cursors: CachePadded<SpinLock>,
    /// Set while a consume is in progress (debug only)
    #[cfg(debug_assertions)]
    consuming: AtomicBool,
    /// Backing storage, fixed at construction
    slots: Box<[Slot<T>]>,
}

impl<T: Send> BoundedRingBuffer<T> {
    /// Creates an empty buffer able to hold `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be non-zero");

        let slots: Box<[Slot<T>]> = (0..capacity).map(|_| Slot::new()).collect();

        Self {
            head: CachePadded::new(AtomicU64::new(0)),
            tail: CachePadded::new(AtomicU64::new(0)),
            cursors: CachePadded::new(SpinLock::new()),
            #[cfg(debug_assertions)]
            consuming: AtomicBool::new(false),
            slots,
        }
    }

    // ---------------------------------------------------------------------
    // STATUS
    // ---------------------------------------------------------------------

    /// Maximum number of queued items.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Current occupancy, read without taking the cursor lock.
    ///
    /// The value may be stale by the time the caller looks at it; use
    /// [`peek`](Self::peek) for a consistent snapshot.
    #[inline]
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        // head read first: a concurrent consume can only make this an
        // over-estimate, which the clamp bounds.
        (tail.saturating_sub(head) as usize).min(self.capacity())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity()
    }

    /// Consistent snapshot of the occupied region.
    pub fn peek(&self) -> PeekRange {
        let _guard = self.cursors.lock();
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        PeekRange {
            start: head,
            len: tail.wrapping_sub(head) as usize,
        }
    }

    // ---------------------------------------------------------------------
    // PRODUCER API
    // ---------------------------------------------------------------------

    /// Hands the item in `item` over to the buffer.
    ///
    /// On success the item is moved out (`*item` becomes `None`) and `true`
    /// is returned. If the buffer is full, `*item` is left untouched and
    /// `false` is returned. An empty handle is never queued.
    pub fn add(&self, item: &mut Option<Box<T>>) -> bool {
        let Some(boxed) = item.take() else {
            return false;
        };
        match self.try_push(boxed) {
            Ok(_) => true,
            Err(rejected) => {
                *item = Some(rejected);
                false
            }
        }
    }

    /// By-value form of [`add`](Self::add).
    ///
    /// Returns the occupancy right after the insertion, or hands the item
    /// back if the buffer is full.
    pub fn try_push(&self, item: Box<T>) -> Result<usize, Box<T>> {
        let _guard = self.cursors.lock();

        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        let count = tail.wrapping_sub(head) as usize;
        if count >= self.capacity() {
            return Err(item);
        }

        let previous = self.slot(tail).put(item);
        debug_assert_vacant_slot!(previous.is_none(), tail);

        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        debug_assert_bounded_count!(count + 1, self.capacity());

        Ok(count + 1)
    }

    // ---------------------------------------------------------------------
    // CONSUMER API
    // ---------------------------------------------------------------------

    /// Reserves the oldest `min(n, len)` items and passes them to `callback`.
    ///
    /// The callback is invoked exactly once, with an empty range if nothing
    /// is queued. It should release every slot it visits with
    /// [`Slot::take`]; until `consume` returns the reserved slots count as
    /// occupied, so producers cannot reuse them. Slots the callback leaves
    /// occupied are released here and their items dropped.
    ///
    /// Only one thread may consume at a time.
    pub fn consume<F>(&self, n: usize, callback: F)
    where
        F: FnOnce(ConsumeRange<'_, T>),
    {
        #[cfg(debug_assertions)]
        let _token = ConsumerToken::enter(&self.consuming);

        let (head, count) = {
            let _guard = self.cursors.lock();
            let head = self.head.load(Ordering::Relaxed);
            let tail = self.tail.load(Ordering::Relaxed);
            (head, (tail.wrapping_sub(head) as usize).min(n))
        };

        if count == 0 {
            callback(ConsumeRange::empty());
            return;
        }

        let range = self.range(head, count);
        callback(range);

        for slot in range.iter() {
            drop(slot.take());
        }

        let _guard = self.cursors.lock();
        let new_head = head.wrapping_add(count as u64);
        debug_assert_head_not_past_tail!(new_head, self.tail.load(Ordering::Relaxed));
        self.head.store(new_head, Ordering::Release);
    }

    /// Drops every queued item, leaving the buffer empty. Returns how many
    /// items were dropped.
    ///
    /// This is a consumer-side operation: the items are discarded, not
    /// handed to anyone.
    pub fn clear(&self) -> usize {
        let mut dropped = 0;
        self.consume(usize::MAX, |range| dropped = range.drain().count());
        dropped
    }

    // ---------------------------------------------------------------------
    // INTERNALS
    // ---------------------------------------------------------------------

    #[inline]
    fn index(&self, seq: u64) -> usize {
        (seq % self.capacity() as u64) as usize
    }

    #[inline]
    fn slot(&self, seq: u64) -> &Slot<T> {
        &self.slots[self.index(seq)]
    }

    /// The `count` slots starting at sequence `head`, split at the wrap point.
    fn range(&self, head: u64, count: usize) -> ConsumeRange<'_, T> {
        let start = self.index(head);
        let end = start + count;
        if end <= self.capacity() {
            ConsumeRange::new(&self.slots[start..end], &[])
        } else {
            ConsumeRange::new(&self.slots[start..], &self.slots[..end - self.capacity()])
        }
    }
}

impl<T> Drop for BoundedRingBuffer<T> {
    fn drop(&mut self) {
        for slot in self.slots.iter() {
            drop(slot.take());
        }
    }
}

impl<T> std::fmt::Debug for BoundedRingBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedRingBuffer")
            .field("capacity", &self.slots.len())
            .field("head", &self.head.load(Ordering::Relaxed))
            .field("tail", &self.tail.load(Ordering::Relaxed))
            .finish()
    }
}

/// Marks a consume in progress; catches overlapping consumers in debug builds.
#[cfg(debug_assertions)]
struct ConsumerToken<'a> {
    flag: &'a AtomicBool,
}

#[cfg(debug_assertions)]
impl<'a> ConsumerToken<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        let was_consuming = flag.swap(true, Ordering::Acquire);
        debug_assert_single_consumer!(was_consuming);
        Self { flag }
    }
}

#[cfg(debug_assertions)]
impl Drop for ConsumerToken<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
