use crate::recordable::Recordable;
use crate::span::SpanData;
use parking_lot::Mutex;
use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Outcome of one [`Exporter::export`] call. There is no per-record result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportResult {
    /// The batch was accepted by the backend
    Success,
    /// The batch was lost
    Failure,
    /// The exporter had no room for the batch
    FailureFull,
    /// The batch was rejected as malformed
    FailureInvalidArgument,
}

impl ExportResult {
    #[inline]
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl fmt::Display for ExportResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::FailureFull => "failure (exporter full)",
            Self::FailureInvalidArgument => "failure (invalid argument)",
        };
        f.write_str(text)
    }
}

/// Sends batches of finished records to a backend.
///
/// Processors in this crate call `export`, `force_flush` and `shutdown` from
/// a single thread, so an exporter never sees two of them at once.
/// `make_recordable` may be called from any thread at any time.
pub trait Exporter: Send + Sync + 'static {
    /// The record type this exporter consumes.
    type Record: Recordable;

    /// Creates an empty record for the instrumentation layer to fill in.
    fn make_recordable(&self) -> Self::Record;

    /// Exports one batch. May block on I/O.
    fn export(&self, batch: Vec<Self::Record>) -> ExportResult;

    /// Flushes anything the exporter itself has buffered.
    fn force_flush(&self, _timeout: Duration) -> bool {
        true
    }

    /// Releases backend resources. Called at most once.
    fn shutdown(&self, timeout: Duration) -> bool;

    /// Returns the exporter name for logs and thread names.
    fn name(&self) -> &str;
}

// =============================================================================
// In-memory exporter
// =============================================================================

#[derive(Debug)]
struct InMemoryState {
    batches: Mutex<Vec<Vec<SpanData>>>,
    result: Mutex<ExportResult>,
    delay: Mutex<Duration>,
    export_calls: AtomicUsize,
    flush_calls: AtomicUsize,
    shutdown_calls: AtomicUsize,
}

/// Keeps every exported batch in memory.
///
/// Cloning yields another handle to the same storage, so a test can keep one
/// handle while the processor owns the other.
#[derive(Debug, Clone)]
pub struct InMemoryExporter {
    state: Arc<InMemoryState>,
}

impl Default for InMemoryExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryExporter {
    pub fn new() -> Self {
        Self {
            state: Arc::new(InMemoryState {
                batches: Mutex::new(Vec::new()),
                result: Mutex::new(ExportResult::Success),
                delay: Mutex::new(Duration::ZERO),
                export_calls: AtomicUsize::new(0),
                flush_calls: AtomicUsize::new(0),
                shutdown_calls: AtomicUsize::new(0),
            }),
        }
    }

    /// Result returned by subsequent exports. Batches are stored either way.
    pub fn with_result(self, result: ExportResult) -> Self {
        self.set_result(result);
        self
    }

    /// Sleeps this long inside every export call.
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.state.delay.lock() = delay;
        self
    }

    pub fn set_result(&self, result: ExportResult) {
        *self.state.result.lock() = result;
    }

    /// Every batch received, in export order.
    pub fn batches(&self) -> Vec<Vec<SpanData>> {
        self.state.batches.lock().clone()
    }

    /// Every record received, flattened in export order.
    pub fn exported(&self) -> Vec<SpanData> {
        self.state.batches.lock().iter().flatten().cloned().collect()
    }

    pub fn exported_count(&self) -> usize {
        self.state.batches.lock().iter().map(Vec::len).sum()
    }

    pub fn export_calls(&self) -> usize {
        self.state.export_calls.load(Ordering::SeqCst)
    }

    pub fn flush_calls(&self) -> usize {
        self.state.flush_calls.load(Ordering::SeqCst)
    }

    pub fn shutdown_calls(&self) -> usize {
        self.state.shutdown_calls.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.state.batches.lock().clear();
    }
}

impl Exporter for InMemoryExporter {
    type Record = SpanData;

    fn make_recordable(&self) -> SpanData {
        SpanData::new()
    }

    fn export(&self, batch: Vec<SpanData>) -> ExportResult {
        self.state.export_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.state.delay.lock();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        self.state.batches.lock().push(batch);
        *self.state.result.lock()
    }

    fn force_flush(&self, _timeout: Duration) -> bool {
        self.state.flush_calls.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn shutdown(&self, _timeout: Duration) -> bool {
        self.state.shutdown_calls.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn name(&self) -> &str {
        "in_memory"
    }
}

// =============================================================================
// Stdout exporter
// =============================================================================

/// Writes each record as one JSON line.
pub struct StdoutExporter {
    out: Mutex<Box<dyn Write + Send>>,
    shut_down: AtomicBool,
}

impl Default for StdoutExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl StdoutExporter {
    pub fn new() -> Self {
        Self::with_writer(Box::new(std::io::stdout()))
    }

    /// Writes to `out` instead of stdout.
    pub fn with_writer(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
            shut_down: AtomicBool::new(false),
        }
    }
}

impl Exporter for StdoutExporter {
    type Record = SpanData;

    fn make_recordable(&self) -> SpanData {
        SpanData::new()
    }

    fn export(&self, batch: Vec<SpanData>) -> ExportResult {
        if self.shut_down.load(Ordering::Acquire) {
            return ExportResult::Failure;
        }

        let mut out = self.out.lock();
        for span in &batch {
            let line = match serde_json::to_string(span) {
                Ok(line) => line,
                Err(error) => {
                    warn!(%error, span_id = span.span_id, "failed to serialize span");
                    return ExportResult::FailureInvalidArgument;
                }
            };
            if let Err(error) = writeln!(out, "{line}") {
                warn!(%error, "failed to write span");
                return ExportResult::Failure;
            }
        }
        match out.flush() {
            Ok(()) => ExportResult::Success,
            Err(_) => ExportResult::Failure,
        }
    }

    fn force_flush(&self, _timeout: Duration) -> bool {
        self.out.lock().flush().is_ok()
    }

    fn shutdown(&self, _timeout: Duration) -> bool {
        self.shut_down.store(true, Ordering::Release);
        self.out.lock().flush().is_ok()
    }

    fn name(&self) -> &str {
        "stdout"
    }
}

impl fmt::Debug for StdoutExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdoutExporter")
            .field("shut_down", &self.shut_down.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Null exporter
// =============================================================================

/// Null exporter that discards all spans (for benchmarking)
#[derive(Debug, Default)]
pub struct NullExporter;

impl NullExporter {
    pub fn new() -> Self {
        Self
    }
}

impl Exporter for NullExporter {
    type Record = SpanData;

    fn make_recordable(&self) -> SpanData {
        SpanData::new()
    }

    fn export(&self, _batch: Vec<SpanData>) -> ExportResult {
        ExportResult::Success
    }

    fn shutdown(&self, _timeout: Duration) -> bool {
        true
    }

    fn name(&self) -> &str {
        "null"
    }
}
