use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by producer threads and the worker.
///
/// All methods use `Ordering::Relaxed`: these are statistics, nothing is
/// published through them and no control flow depends on their freshness.
#[derive(Debug, Default)]
pub struct ProcessorMetrics {
    records_queued: AtomicU64,
    dropped_queue_full: AtomicU64,
    dropped_after_shutdown: AtomicU64,
    records_exported: AtomicU64,
    batches_exported: AtomicU64,
    export_failures: AtomicU64,
    records_failed: AtomicU64,
    export_timeouts: AtomicU64,
    discarded_on_abandon: AtomicU64,
}

/// Point-in-time copy of [`ProcessorMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Records accepted into the ring buffer
    pub records_queued: u64,
    /// Records rejected because the buffer was full
    pub dropped_queue_full: u64,
    /// Records handed to `on_end` after shutdown began
    pub dropped_after_shutdown: u64,
    /// Records in batches the exporter accepted
    pub records_exported: u64,
    /// Export calls that returned success
    pub batches_exported: u64,
    /// Export calls that returned a failure code or panicked
    pub export_failures: u64,
    /// Records in failed batches
    pub records_failed: u64,
    /// Export calls that ran past the export timeout
    pub export_timeouts: u64,
    /// Records still queued when a timed-out shutdown gave up on them
    pub discarded_on_abandon: u64,
}

impl MetricsSnapshot {
    /// Every record that left the pipeline without a successful export.
    pub fn total_dropped(&self) -> u64 {
        self.dropped_queue_full
            + self.dropped_after_shutdown
            + self.records_failed
            + self.discarded_on_abandon
    }
}

impl ProcessorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn record_queued(&self) {
        self.records_queued.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_queue_full(&self) {
        self.dropped_queue_full.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_after_shutdown(&self) {
        self.dropped_after_shutdown.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_export_success(&self, records: usize) {
        self.records_exported
            .fetch_add(records as u64, Ordering::Relaxed);
        self.batches_exported.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_export_failure(&self, records: usize) {
        self.export_failures.fetch_add(1, Ordering::Relaxed);
        self.records_failed
            .fetch_add(records as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_export_timeout(&self) {
        self.export_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_discarded(&self, records: usize) {
        self.discarded_on_abandon
            .fetch_add(records as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_queued: self.records_queued.load(Ordering::Relaxed),
            dropped_queue_full: self.dropped_queue_full.load(Ordering::Relaxed),
            dropped_after_shutdown: self.dropped_after_shutdown.load(Ordering::Relaxed),
            records_exported: self.records_exported.load(Ordering::Relaxed),
            batches_exported: self.batches_exported.load(Ordering::Relaxed),
            export_failures: self.export_failures.load(Ordering::Relaxed),
            records_failed: self.records_failed.load(Ordering::Relaxed),
            export_timeouts: self.export_timeouts.load(Ordering::Relaxed),
            discarded_on_abandon: self.discarded_on_abandon.load(Ordering::Relaxed),
        }
    }
}
