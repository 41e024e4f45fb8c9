//! Debug assertion macros for ring buffer invariants.
//!
//! Only active in debug builds (`debug_assert!`), so there is zero overhead
//! in release builds.

// =============================================================================
// Bounded occupancy
// =============================================================================

/// Assert that occupancy does not exceed capacity.
///
/// **Invariant**: `0 ≤ (tail - head) ≤ capacity`
///
/// Used in: `try_push()` after bumping tail
macro_rules! debug_assert_bounded_count {
    ($count:expr, $capacity:expr) => {
        debug_assert!(
            $count <= $capacity,
            "bounded occupancy violated: count {} exceeds capacity {}",
            $count,
            $capacity
        )
    };
}

/// Assert that head does not advance past tail.
///
/// **Invariant**: `head ≤ tail` (after a consume)
///
/// Used in: `consume()` before publishing the new head
macro_rules! debug_assert_head_not_past_tail {
    ($new_head:expr, $tail:expr) => {
        debug_assert!(
            $new_head <= $tail,
            "bounded occupancy violated: advancing head {} beyond tail {}",
            $new_head,
            $tail
        )
    };
}

// =============================================================================
// Slot ownership
// =============================================================================

/// Assert that a producer only ever writes into an empty slot.
///
/// **Invariant**: every slot outside `[head, tail)` is empty, so the slot at
/// `tail` never holds an item when a producer claims it.
///
/// Used in: `try_push()` after the slot exchange
macro_rules! debug_assert_vacant_slot {
    ($was_vacant:expr, $seq:expr) => {
        debug_assert!(
            $was_vacant,
            "slot ownership violated: producer overwrote an occupied slot at seq {}",
            $seq
        )
    };
}

// =============================================================================
// Single consumer
// =============================================================================

/// Assert that no other consume is in progress.
///
/// **Invariant**: at most one thread is inside `consume()` at any time.
///
/// Used in: `ConsumerToken::enter()`
macro_rules! debug_assert_single_consumer {
    ($was_consuming:expr) => {
        debug_assert!(
            !$was_consuming,
            "single consumer violated: consume() entered concurrently"
        )
    };
}

// =============================================================================
// Re-exports for crate-internal use
// =============================================================================

pub(crate) use debug_assert_bounded_count;
pub(crate) use debug_assert_head_not_past_tail;
pub(crate) use debug_assert_single_consumer;
pub(crate) use debug_assert_vacant_slot;
