//! Debug assertion macros for processor invariants.
//!
//! Only active in debug builds (`debug_assert!`), so there is zero overhead
//! in release builds.

// =============================================================================
// Lifecycle
// =============================================================================

/// Assert that a lifecycle transition only moves forward.
///
/// **Invariant**: `Active → ShuttingDown → Shutdown`, each edge taken once
///
/// Used in: `BatchProcessor::shutdown()` when publishing `Shutdown`
macro_rules! debug_assert_forward_transition {
    ($from:expr, $to:expr) => {
        debug_assert!(
            ($from as u8) < ($to as u8),
            "lifecycle violated: transition {:?} -> {:?} is not forward",
            $from,
            $to
        )
    };
}

// =============================================================================
// Batching
// =============================================================================

/// Assert that one export call never carries more than the batch cap.
///
/// **Invariant**: `batch.len() ≤ max_export_batch_size`
///
/// Used in: the worker's export cycle, before calling the exporter
macro_rules! debug_assert_batch_bounded {
    ($len:expr, $max:expr) => {
        debug_assert!(
            $len <= $max,
            "batch cap violated: {} records exceeds max_export_batch_size {}",
            $len,
            $max
        )
    };
}

/// Assert that flush tickets complete in order and never run ahead of the
/// requests.
///
/// **Invariant**: `flush_completed ≤ flush_requested`
///
/// Used in: the worker after finishing a flush
macro_rules! debug_assert_flush_ticket {
    ($completed:expr, $requested:expr) => {
        debug_assert!(
            $completed <= $requested,
            "flush ticket violated: completed {} ahead of requested {}",
            $completed,
            $requested
        )
    };
}

pub(crate) use debug_assert_batch_bounded;
pub(crate) use debug_assert_flush_ticket;
pub(crate) use debug_assert_forward_transition;
