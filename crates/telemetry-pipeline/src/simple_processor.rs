use crate::error::PipelineError;
use crate::exporter::{ExportResult, Exporter};
use crate::metrics::{MetricsSnapshot, ProcessorMetrics};
use crate::processor::{call_exporter, Processor};
use crate::recordable::SpanContext;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::warn;

/// Exports every record synchronously from `on_end`, one at a time.
///
/// Useful for debugging and tests where export latency on the calling
/// thread is acceptable. Calls into the exporter are serialized by a mutex.
pub struct SimpleProcessor<E: Exporter> {
    exporter: E,
    /// Serializes export, flush and shutdown calls
    export_lock: Mutex<()>,
    is_shutdown: AtomicBool,
    metrics: ProcessorMetrics,
}

impl<E: Exporter> SimpleProcessor<E> {
    pub fn new(exporter: E) -> Self {
        Self {
            exporter,
            export_lock: Mutex::new(()),
            is_shutdown: AtomicBool::new(false),
            metrics: ProcessorMetrics::new(),
        }
    }

    pub fn exporter(&self) -> &E {
        &self.exporter
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

impl<E: Exporter> Processor<E::Record> for SimpleProcessor<E> {
    fn make_recordable(&self) -> E::Record {
        self.exporter.make_recordable()
    }

    fn on_start(&self, _record: &mut E::Record, _parent: &SpanContext) {}

    fn on_end(&self, record: E::Record) {
        if self.is_shutdown.load(Ordering::Acquire) {
            self.metrics.record_after_shutdown();
            return;
        }

        let result = {
            let _guard = self.export_lock.lock();
            call_exporter(self.exporter.name(), "export", ExportResult::Failure, || {
                self.exporter.export(vec![record])
            })
        };

        if result.is_success() {
            self.metrics.record_export_success(1);
        } else {
            self.metrics.record_export_failure(1);
            let error = PipelineError::ExportFailure { result, records: 1 };
            warn!(%error, exporter = self.exporter.name(), "export failed");
        }
    }

    fn force_flush(&self, timeout: Duration) -> bool {
        if self.is_shutdown.load(Ordering::Acquire) {
            return false;
        }
        let _guard = self.export_lock.lock();
        call_exporter(self.exporter.name(), "force_flush", false, || {
            self.exporter.force_flush(timeout)
        })
    }

    fn shutdown(&self, timeout: Duration) -> bool {
        if self.is_shutdown.swap(true, Ordering::AcqRel) {
            let error = PipelineError::AlreadyShutdown;
            warn!(%error, exporter = self.exporter.name(), "shutdown called more than once");
            return false;
        }
        let _guard = self.export_lock.lock();
        call_exporter(self.exporter.name(), "shutdown", false, || {
            self.exporter.shutdown(timeout)
        })
    }
}

impl<E: Exporter> Drop for SimpleProcessor<E> {
    fn drop(&mut self) {
        if !self.is_shutdown.load(Ordering::Acquire) {
            self.shutdown(Duration::from_secs(5));
        }
    }
}

impl<E: Exporter> fmt::Debug for SimpleProcessor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleProcessor")
            .field("exporter", &self.exporter.name())
            .field("is_shutdown", &self.is_shutdown.load(Ordering::Relaxed))
            .finish()
    }
}
