//! Telemetry Pipeline - Batching and Export of Finished Spans
//!
//! Decouples the many application threads that finish spans from the single
//! background worker that ships them to a backend. Producers hand records to
//! a processor without blocking; a fixed-capacity ring buffer bounds memory,
//! and shutdown completes within a caller-supplied budget.
//!
//! # Components
//!
//! | Type | Role |
//! |------|------|
//! | [`Recordable`] | Exporter-specific span representation, filled in through setters |
//! | [`Exporter`] | Sends batches to a backend; driven from one thread only |
//! | [`BatchProcessor`] | Ring buffer + worker thread that batches by size and time |
//! | [`SimpleProcessor`] | Exports each record synchronously from `on_end` |
//! | [`MultiProcessor`] | Broadcasts every span to several processors |
//!
//! # Delivery
//!
//! Best effort. A record is dropped, counted and never retried when the
//! buffer is full, when the exporter fails, or when shutdown runs out of
//! time. Ordering is FIFO within one processor.
//!
//! # Logging
//!
//! The crate emits [`tracing`] events and never installs a subscriber.

pub mod batch_processor;
pub mod config;
pub mod error;
pub mod exporter;
mod invariants;
pub mod metrics;
pub mod multi_processor;
pub mod processor;
pub mod recordable;
pub mod simple_processor;
pub mod span;

// Re-export main types
pub use batch_processor::{BatchProcessor, Lifecycle};
pub use config::BatchConfig;
pub use error::{BuildError, ConfigError, PipelineError};
pub use exporter::{ExportResult, Exporter, InMemoryExporter, NullExporter, StdoutExporter};
pub use metrics::{MetricsSnapshot, ProcessorMetrics};
pub use multi_processor::{MultiProcessor, MultiRecordable, ProcessorId};
pub use processor::Processor;
pub use recordable::{Recordable, SpanContext};
pub use simple_processor::SimpleProcessor;
pub use span::{AttributeValue, SpanData, SpanEvent, SpanKind, SpanStatus};
pub use telemetry_ring::BoundedRingBuffer;
