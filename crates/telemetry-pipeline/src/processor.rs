use crate::recordable::{Recordable, SpanContext};
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;
use tracing::warn;

/// Receives finished records from the instrumentation layer and decides
/// when they reach an exporter.
///
/// The trait is object safe so processors can be composed behind
/// `Box<dyn Processor<R>>`.
pub trait Processor<R: Recordable>: Send + Sync {
    /// Creates an empty record for a span that is about to start.
    fn make_recordable(&self) -> R;

    /// Called when a span starts.
    fn on_start(&self, record: &mut R, parent: &SpanContext);

    /// Called when a span ends. Ownership of the record moves to the
    /// processor; this never blocks on export and never fails.
    fn on_end(&self, record: R);

    /// Exports everything queued so far. Returns `false` if that did not
    /// finish within `timeout`.
    fn force_flush(&self, timeout: Duration) -> bool;

    /// Exports everything queued, then shuts the exporter down. Returns
    /// `false` on timeout or if already shut down.
    fn shutdown(&self, timeout: Duration) -> bool;
}

/// Deadline `timeout` from now, or `None` when it cannot be represented.
pub(crate) fn deadline_after(timeout: Duration) -> Option<std::time::Instant> {
    std::time::Instant::now().checked_add(timeout)
}

/// Time left until `deadline`; `Duration::MAX` for no deadline.
pub(crate) fn remaining(deadline: Option<std::time::Instant>) -> Duration {
    match deadline {
        Some(deadline) => deadline.saturating_duration_since(std::time::Instant::now()),
        None => Duration::MAX,
    }
}

/// Runs one exporter call, turning a panic into `fallback`.
pub(crate) fn call_exporter<T>(
    exporter: &str,
    operation: &'static str,
    fallback: T,
    call: impl FnOnce() -> T,
) -> T {
    panic::catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|_| {
        warn!(exporter, operation, "exporter panicked");
        fallback
    })
}
