//! Error types for pipeline operations.
//!
//! None of these reach instrumented code: `on_end` never fails from the
//! caller's point of view. They are produced on the worker side and consumed
//! by logging and metrics.

use crate::exporter::ExportResult;
use std::time::Duration;
use thiserror::Error;

/// Conditions the processors detect while moving records to an exporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// The ring buffer was full and the incoming record was dropped.
    #[error("queue is full (capacity {capacity}), record dropped")]
    QueueFull { capacity: usize },

    /// The exporter returned a non-success result for a batch.
    #[error("export of {records} records failed: {result}")]
    ExportFailure { result: ExportResult, records: usize },

    /// One export call ran longer than the configured export timeout.
    #[error("export took {elapsed:?}, exceeding the {limit:?} export timeout")]
    ExportTimeout { elapsed: Duration, limit: Duration },

    /// The worker did not finish its final drain within the shutdown budget.
    #[error("shutdown did not complete within {timeout:?}")]
    ShutdownTimeout { timeout: Duration },

    /// The processor was already shut down.
    #[error("processor is already shut down")]
    AlreadyShutdown,
}

impl PipelineError {
    /// Returns `true` if the pipeline keeps working after this error.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::QueueFull { .. } | Self::ExportFailure { .. } | Self::ExportTimeout { .. }
        )
    }

    /// Returns `true` if this error means the processor accepts no more work.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ShutdownTimeout { .. } | Self::AlreadyShutdown)
    }
}

/// Invalid processor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("max_queue_size must be greater than zero")]
    ZeroQueueSize,

    #[error("max_export_batch_size must be greater than zero")]
    ZeroBatchSize,

    #[error("scheduled_delay must be greater than zero")]
    ZeroScheduledDelay,

    /// An environment value that could not be parsed.
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Failure to construct a processor.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The OS refused to start the worker thread.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}
