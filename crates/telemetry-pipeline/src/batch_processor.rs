//! Batch Processor - Ring Buffer + Dedicated Export Worker
//!
//! Application threads hand finished records to [`BatchProcessor::on_end`],
//! which moves them into a fixed-capacity [`BoundedRingBuffer`] without ever
//! waiting on the exporter. One worker thread per processor drains the buffer
//! in batches and is the only caller of the exporter.
//!
//! # Worker Wake-ups
//!
//! The worker sleeps on a condition variable until the first of:
//!
//! | Trigger | Source | Cycle |
//! |---------|--------|-------|
//! | Timer | `scheduled_delay` elapsed | one batch |
//! | Size | occupancy reached `max_export_batch_size` | one batch |
//! | Flush | [`force_flush`](Processor::force_flush) ticket | everything queued at pickup, then `exporter.force_flush` |
//! | Shutdown | [`shutdown`](Processor::shutdown) | drain everything, then `exporter.shutdown`, exit |
//!
//! A cycle that finds the buffer empty makes no export call.
//!
//! # Overflow
//!
//! When the buffer is full the incoming record is dropped and counted. The
//! worker logs one summary line per cycle with the number of records dropped
//! since the previous cycle.
//!
//! # Shutdown
//!
//! `shutdown(timeout)` waits up to `timeout` for the final drain. If the
//! budget runs out the worker is told to abandon: it discards whatever is
//! still queued instead of exporting it and `shutdown` returns `false`.

use crate::config::BatchConfig;
use crate::error::{BuildError, PipelineError};
use crate::exporter::{ExportResult, Exporter};
use crate::invariants::{
    debug_assert_batch_bounded, debug_assert_flush_ticket, debug_assert_forward_transition,
};
use crate::metrics::{MetricsSnapshot, ProcessorMetrics};
use crate::processor::{call_exporter, deadline_after, remaining, Processor};
use crate::recordable::SpanContext;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use telemetry_ring::BoundedRingBuffer;
use tracing::{debug, trace, warn};

/// Processor lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Lifecycle {
    Active = 0,
    ShuttingDown = 1,
    Shutdown = 2,
}

impl Lifecycle {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Active,
            1 => Self::ShuttingDown,
            _ => Self::Shutdown,
        }
    }
}

/// State shared between callers and the worker, guarded by `Shared::signal`.
#[derive(Debug, Default)]
struct Signal {
    /// Last flush ticket handed out
    flush_requested: u64,
    /// Last flush ticket the worker finished
    flush_completed: u64,
    /// Outcome of the most recently completed flush
    flush_ok: bool,
    /// Deadline of the newest flush request
    flush_deadline: Option<Instant>,
    /// A producer saw occupancy reach the batch size
    size_triggered: bool,
    shutdown: bool,
    shutdown_deadline: Option<Instant>,
    /// Outcome of the final drain and `exporter.shutdown`
    shutdown_ok: bool,
    worker_done: bool,
}

/// Why the worker woke up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wakeup {
    Timer,
    Size,
    Flush {
        ticket: u64,
        deadline: Option<Instant>,
    },
    Shutdown,
}

struct Shared<E: Exporter> {
    buffer: BoundedRingBuffer<E::Record>,
    exporter: E,
    config: BatchConfig,
    lifecycle: AtomicU8,
    metrics: ProcessorMetrics,
    signal: Mutex<Signal>,
    /// Wakes the worker
    wake: Condvar,
    /// Wakes `force_flush` and `shutdown` callers
    done: Condvar,
    /// Set by the producer that sent the size wake-up for this cycle
    size_pending: AtomicBool,
    /// Producers between their lifecycle check and the end of their push
    in_flight: AtomicUsize,
    /// Set when a shutdown timed out; the worker discards instead of exporting
    abandoned: AtomicBool,
    dropped_since_report: AtomicU64,
}

/// Batches records in a ring buffer and exports them from a worker thread.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use telemetry_pipeline::{BatchConfig, BatchProcessor, InMemoryExporter, Processor, Recordable};
///
/// let exporter = InMemoryExporter::new();
/// let processor = BatchProcessor::new(exporter.clone(), BatchConfig::default()).unwrap();
///
/// let mut span = processor.make_recordable();
/// span.set_name("checkout");
/// processor.on_end(span);
///
/// assert!(processor.shutdown(Duration::from_secs(5)));
/// assert_eq!(exporter.exported_count(), 1);
/// ```
pub struct BatchProcessor<E: Exporter> {
    shared: Arc<Shared<E>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<E: Exporter> BatchProcessor<E> {
    /// Validates `config`, allocates the ring buffer and starts the worker.
    pub fn new(exporter: E, config: BatchConfig) -> Result<Self, BuildError> {
        let config = config.validate_and_clamp()?;

        let shared = Arc::new(Shared {
            buffer: BoundedRingBuffer::new(config.max_queue_size),
            exporter,
            config,
            lifecycle: AtomicU8::new(Lifecycle::Active as u8),
            metrics: ProcessorMetrics::new(),
            signal: Mutex::new(Signal::default()),
            wake: Condvar::new(),
            done: Condvar::new(),
            size_pending: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            abandoned: AtomicBool::new(false),
            dropped_since_report: AtomicU64::new(0),
        });

        let worker = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name(format!("telemetry-batch-{}", shared.exporter.name()))
                .spawn(move || shared.run())?
        };

        debug!(
            exporter = shared.exporter.name(),
            max_queue_size = shared.config.max_queue_size,
            max_export_batch_size = shared.config.max_export_batch_size,
            scheduled_delay = ?shared.config.scheduled_delay,
            "batch processor started"
        );

        Ok(Self {
            shared,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Starts a processor with [`BatchConfig::default`].
    pub fn with_defaults(exporter: E) -> Result<Self, BuildError> {
        Self::new(exporter, BatchConfig::default())
    }

    /// Starts a processor configured from the `OTEL_BSP_*` environment.
    pub fn from_env(exporter: E) -> Result<Self, BuildError> {
        Self::new(exporter, BatchConfig::from_env())
    }

    pub fn exporter(&self) -> &E {
        &self.shared.exporter
    }

    /// The effective configuration (after clamping).
    pub fn config(&self) -> &BatchConfig {
        &self.shared.config
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.shared.lifecycle()
    }

    /// Records currently waiting in the buffer.
    pub fn queued(&self) -> usize {
        self.shared.buffer.len()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    fn join_worker(&self) {
        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                warn!(exporter = self.shared.exporter.name(), "batch worker panicked");
            }
        }
    }
}

impl<E: Exporter> Processor<E::Record> for BatchProcessor<E> {
    fn make_recordable(&self) -> E::Record {
        self.shared.exporter.make_recordable()
    }

    fn on_start(&self, _record: &mut E::Record, _parent: &SpanContext) {}

    fn on_end(&self, record: E::Record) {
        let shared = &*self.shared;
        // Registered before the lifecycle check; the final drain waits for
        // this count to reach zero, so no push can land after it.
        let _producer = InFlight::enter(&shared.in_flight);
        if Lifecycle::from_u8(shared.lifecycle.load(Ordering::SeqCst)) != Lifecycle::Active {
            shared.metrics.record_after_shutdown();
            return;
        }

        match shared.buffer.try_push(Box::new(record)) {
            Ok(occupancy) => {
                shared.metrics.record_queued();
                let max = shared.config.max_export_batch_size;
                if occupancy >= max && !shared.size_pending.swap(true, Ordering::AcqRel) {
                    // Taking the lock orders this notify after the worker's
                    // predicate check, so the wake-up cannot be lost.
                    let mut signal = shared.signal.lock();
                    if shared.buffer.len() >= max {
                        signal.size_triggered = true;
                        shared.wake.notify_one();
                    } else {
                        // The worker already took this batch.
                        shared.size_pending.store(false, Ordering::Release);
                    }
                }
            }
            Err(_rejected) => {
                shared.metrics.record_queue_full();
                shared.dropped_since_report.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn force_flush(&self, timeout: Duration) -> bool {
        let shared = &*self.shared;
        if shared.lifecycle() != Lifecycle::Active {
            return false;
        }

        let deadline = deadline_after(timeout);
        let mut signal = shared.signal.lock();
        if signal.shutdown || signal.worker_done {
            return false;
        }
        signal.flush_requested += 1;
        let ticket = signal.flush_requested;
        signal.flush_deadline = deadline;
        shared.wake.notify_one();

        while signal.flush_completed < ticket && !signal.worker_done {
            match deadline {
                Some(deadline) => {
                    if shared.done.wait_until(&mut signal, deadline).timed_out() {
                        break;
                    }
                }
                None => shared.done.wait(&mut signal),
            }
        }

        if signal.flush_completed < ticket {
            warn!(
                exporter = shared.exporter.name(),
                ?timeout,
                "force_flush timed out"
            );
            return false;
        }
        signal.flush_ok
    }

    fn shutdown(&self, timeout: Duration) -> bool {
        let shared = &*self.shared;
        if shared
            .lifecycle
            .compare_exchange(
                Lifecycle::Active as u8,
                Lifecycle::ShuttingDown as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            let error = PipelineError::AlreadyShutdown;
            warn!(%error, exporter = shared.exporter.name(), "shutdown called more than once");
            return false;
        }

        let deadline = deadline_after(timeout);
        let outcome = {
            let mut signal = shared.signal.lock();
            signal.shutdown = true;
            signal.shutdown_deadline = deadline;
            shared.wake.notify_one();

            while !signal.worker_done {
                match deadline {
                    Some(deadline) => {
                        if shared.done.wait_until(&mut signal, deadline).timed_out() {
                            break;
                        }
                    }
                    None => shared.done.wait(&mut signal),
                }
            }
            signal.worker_done.then_some(signal.shutdown_ok)
        };

        let ok = match outcome {
            Some(ok) => {
                self.join_worker();
                ok
            }
            None => {
                shared.abandoned.store(true, Ordering::Release);
                let error = PipelineError::ShutdownTimeout { timeout };
                warn!(
                    %error,
                    exporter = shared.exporter.name(),
                    queued = shared.buffer.len(),
                    "abandoning records still queued"
                );
                // The worker finishes its current export on its own; detach it.
                drop(self.worker.lock().take());
                false
            }
        };

        let previous = Lifecycle::from_u8(
            shared
                .lifecycle
                .swap(Lifecycle::Shutdown as u8, Ordering::AcqRel),
        );
        debug_assert_forward_transition!(previous, Lifecycle::Shutdown);
        ok
    }
}

impl<E: Exporter> Drop for BatchProcessor<E> {
    fn drop(&mut self) {
        if self.shared.lifecycle() == Lifecycle::Active {
            let timeout = self.shared.config.shutdown_timeout;
            self.shutdown(timeout);
        }
    }
}

impl<E: Exporter> fmt::Debug for BatchProcessor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchProcessor")
            .field("exporter", &self.shared.exporter.name())
            .field("lifecycle", &self.shared.lifecycle())
            .field("queued", &self.shared.buffer.len())
            .field("config", &self.shared.config)
            .finish()
    }
}

/// Counts a producer inside `on_end` for as long as it is alive.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(count: &'a AtomicUsize) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self(count)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Release);
    }
}

// =============================================================================
// Worker
// =============================================================================

/// Marks the worker finished when dropped, including on unwind, so callers
/// blocked in `shutdown` or `force_flush` are always released.
struct WorkerDone<'a, E: Exporter>(&'a Shared<E>);

impl<E: Exporter> Drop for WorkerDone<'_, E> {
    fn drop(&mut self) {
        let mut signal = self.0.signal.lock();
        signal.worker_done = true;
        self.0.done.notify_all();
    }
}

impl<E: Exporter> Shared<E> {
    #[inline]
    fn lifecycle(&self) -> Lifecycle {
        Lifecycle::from_u8(self.lifecycle.load(Ordering::Acquire))
    }

    fn run(&self) {
        let _done = WorkerDone(self);
        let delay = self.config.scheduled_delay;
        let mut timer = deadline_after(delay);

        loop {
            let wakeup = self.wait_for_work(timer);
            trace!(exporter = self.exporter.name(), ?wakeup, "batch worker woke");
            self.report_dropped();

            match wakeup {
                Wakeup::Shutdown => {
                    self.drain_for_shutdown();
                    return;
                }
                Wakeup::Flush { ticket, deadline } => {
                    self.flush(ticket, deadline);
                    timer = deadline_after(delay);
                }
                Wakeup::Size | Wakeup::Timer => {
                    self.export_batch(self.config.max_export_batch_size);
                    timer = deadline_after(delay);
                }
            }
        }
    }

    fn wait_for_work(&self, timer: Option<Instant>) -> Wakeup {
        let mut signal = self.signal.lock();
        loop {
            if signal.shutdown {
                return Wakeup::Shutdown;
            }
            if signal.flush_requested > signal.flush_completed {
                return Wakeup::Flush {
                    ticket: signal.flush_requested,
                    deadline: signal.flush_deadline,
                };
            }
            // Occupancy only grows until this thread consumes, so a size
            // cycle always ships a full batch. A trigger whose batch an
            // earlier cycle already took is discarded.
            let full = self.buffer.len() >= self.config.max_export_batch_size;
            if signal.size_triggered || full {
                signal.size_triggered = false;
                self.size_pending.store(false, Ordering::Release);
                if full {
                    return Wakeup::Size;
                }
            }

            match timer {
                Some(timer) => {
                    if self.wake.wait_until(&mut signal, timer).timed_out() {
                        return Wakeup::Timer;
                    }
                }
                None => self.wake.wait(&mut signal),
            }
        }
    }

    /// Moves up to `limit` records out of the buffer and exports them.
    ///
    /// Returns the number of records taken; zero means nothing was queued
    /// and the exporter was not called.
    fn export_batch(&self, limit: usize) -> usize {
        let max = self.config.max_export_batch_size;
        let limit = limit.min(max);

        let mut batch = Vec::with_capacity(limit.min(self.buffer.len()));
        self.buffer
            .consume(limit, |range| batch.extend(range.drain().map(|record| *record)));
        if batch.is_empty() {
            return 0;
        }

        let records = batch.len();
        debug_assert_batch_bounded!(records, max);

        let started = Instant::now();
        let result = call_exporter(self.exporter.name(), "export", ExportResult::Failure, || {
            self.exporter.export(batch)
        });
        let elapsed = started.elapsed();

        if elapsed > self.config.export_timeout {
            self.metrics.record_export_timeout();
            let error = PipelineError::ExportTimeout {
                elapsed,
                limit: self.config.export_timeout,
            };
            warn!(%error, exporter = self.exporter.name(), records, "slow export");
        }

        if result.is_success() {
            self.metrics.record_export_success(records);
            debug!(exporter = self.exporter.name(), records, ?elapsed, "exported batch");
        } else {
            self.metrics.record_export_failure(records);
            let error = PipelineError::ExportFailure { result, records };
            warn!(%error, exporter = self.exporter.name(), "export failed, batch dropped");
        }

        records
    }

    /// Exports everything that was queued when the ticket was picked up.
    fn flush(&self, ticket: u64, deadline: Option<Instant>) {
        let mut outstanding = self.buffer.peek().len;
        while outstanding > 0 {
            let taken = self.export_batch(outstanding);
            if taken == 0 {
                break;
            }
            outstanding = outstanding.saturating_sub(taken);
        }

        let exporter_ok = call_exporter(self.exporter.name(), "force_flush", false, || {
            self.exporter.force_flush(remaining(deadline))
        });

        let mut signal = self.signal.lock();
        signal.flush_completed = signal.flush_completed.max(ticket);
        debug_assert_flush_ticket!(signal.flush_completed, signal.flush_requested);
        signal.flush_ok = exporter_ok;
        self.done.notify_all();
    }

    fn drain_for_shutdown(&self) {
        let deadline = self.signal.lock().shutdown_deadline;
        let max = self.config.max_export_batch_size;

        // The lifecycle left `Active` before this wake-up, so producers that
        // arrive now drop their record; wait out the ones already pushing.
        while self.in_flight.load(Ordering::SeqCst) > 0 {
            thread::yield_now();
        }

        let mut exported = 0;
        while !self.abandoned.load(Ordering::Acquire) {
            let taken = self.export_batch(max);
            if taken == 0 {
                break;
            }
            exported += taken;
        }

        let abandoned = self.abandoned.load(Ordering::Acquire);
        if abandoned {
            let discarded = self.buffer.clear();
            self.metrics.record_discarded(discarded);
            warn!(
                exporter = self.exporter.name(),
                discarded, "shutdown abandoned, records discarded"
            );
        }
        self.report_dropped();

        let exporter_ok = call_exporter(self.exporter.name(), "shutdown", false, || {
            self.exporter.shutdown(remaining(deadline))
        });
        debug!(
            exporter = self.exporter.name(),
            exported, exporter_ok, "batch worker finished"
        );

        let mut signal = self.signal.lock();
        signal.shutdown_ok = exporter_ok && !abandoned;
        // Everything queued before shutdown has been handled, which satisfies
        // any flush still waiting.
        signal.flush_completed = signal.flush_requested;
        signal.flush_ok = !abandoned;
    }

    fn report_dropped(&self) {
        let dropped = self.dropped_since_report.swap(0, Ordering::Relaxed);
        if dropped > 0 {
            let error = PipelineError::QueueFull {
                capacity: self.buffer.capacity(),
            };
            warn!(%error, dropped, exporter = self.exporter.name(), "records dropped since last export cycle");
        }
    }
}
