//! Configuration for the batch processor.

use crate::error::ConfigError;
use std::time::Duration;
use tracing::warn;

/// Environment variable overriding [`BatchConfig::max_queue_size`].
pub const ENV_MAX_QUEUE_SIZE: &str = "OTEL_BSP_MAX_QUEUE_SIZE";
/// Environment variable overriding [`BatchConfig::scheduled_delay`].
pub const ENV_SCHEDULE_DELAY: &str = "OTEL_BSP_SCHEDULE_DELAY";
/// Environment variable overriding [`BatchConfig::export_timeout`].
pub const ENV_EXPORT_TIMEOUT: &str = "OTEL_BSP_EXPORT_TIMEOUT";
/// Environment variable overriding [`BatchConfig::max_export_batch_size`].
pub const ENV_MAX_EXPORT_BATCH_SIZE: &str = "OTEL_BSP_MAX_EXPORT_BATCH_SIZE";

/// Tuning knobs for [`BatchProcessor`](crate::BatchProcessor).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    /// Ring buffer capacity. Records arriving while it is full are dropped.
    ///
    /// Default: 2048
    pub max_queue_size: usize,

    /// Maximum time between two export cycles.
    ///
    /// Default: 5000ms
    pub scheduled_delay: Duration,

    /// Occupancy that wakes the worker early, and the cap on records per
    /// export call.
    ///
    /// Default: 512
    pub max_export_batch_size: usize,

    /// Expected upper bound of one export call. Overruns are counted and
    /// logged; the call itself is not interrupted.
    ///
    /// Default: 3000ms
    pub export_timeout: Duration,

    /// Budget used when the processor is dropped without an explicit
    /// shutdown.
    ///
    /// Default: 30s
    pub shutdown_timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 2048,
            scheduled_delay: Duration::from_millis(5000),
            max_export_batch_size: 512,
            export_timeout: Duration::from_millis(3000),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl BatchConfig {
    /// Defaults overlaid with the `OTEL_BSP_*` environment variables.
    ///
    /// Unparseable or out-of-range values are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading variables through
    /// `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(size) = read_var(&lookup, ENV_MAX_QUEUE_SIZE, parse_size) {
            config.max_queue_size = size;
        }
        if let Some(delay) = read_var(&lookup, ENV_SCHEDULE_DELAY, parse_positive_duration) {
            config.scheduled_delay = delay;
        }
        if let Some(timeout) = read_var(&lookup, ENV_EXPORT_TIMEOUT, parse_duration) {
            config.export_timeout = timeout;
        }
        if let Some(size) = read_var(&lookup, ENV_MAX_EXPORT_BATCH_SIZE, parse_size) {
            config.max_export_batch_size = size;
        }

        config
    }

    pub fn with_max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = size;
        self
    }

    pub fn with_scheduled_delay(mut self, delay: Duration) -> Self {
        self.scheduled_delay = delay;
        self
    }

    pub fn with_max_export_batch_size(mut self, size: usize) -> Self {
        self.max_export_batch_size = size;
        self
    }

    pub fn with_export_timeout(mut self, timeout: Duration) -> Self {
        self.export_timeout = timeout;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Rejects settings the processor cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_queue_size == 0 {
            return Err(ConfigError::ZeroQueueSize);
        }
        if self.max_export_batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.scheduled_delay.is_zero() {
            return Err(ConfigError::ZeroScheduledDelay);
        }
        Ok(())
    }

    /// Validates, then lowers `max_export_batch_size` to `max_queue_size`
    /// if it is larger.
    pub fn validate_and_clamp(mut self) -> Result<Self, ConfigError> {
        self.validate()?;
        if self.max_export_batch_size > self.max_queue_size {
            warn!(
                max_export_batch_size = self.max_export_batch_size,
                max_queue_size = self.max_queue_size,
                "export batch size exceeds queue size, clamping"
            );
            self.max_export_batch_size = self.max_queue_size;
        }
        Ok(self)
    }
}

fn read_var<F, T>(lookup: &F, key: &str, parse: fn(&str) -> Result<T, String>) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match parse(raw.trim()) {
        Ok(value) => Some(value),
        Err(reason) => {
            let error = ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
                reason,
            };
            warn!(%error, "ignoring environment override");
            None
        }
    }
}

fn parse_size(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(0) => Err("must be greater than zero".to_string()),
        Ok(size) => Ok(size),
        Err(e) => Err(e.to_string()),
    }
}

fn parse_positive_duration(raw: &str) -> Result<Duration, String> {
    match parse_duration(raw)? {
        d if d.is_zero() => Err("must be greater than zero".to_string()),
        d => Ok(d),
    }
}

/// Parses an integer with an optional unit suffix: `ns`, `us`, `ms`, `s`,
/// `m` or `h`. A bare integer is milliseconds.
///
/// ```
/// use std::time::Duration;
/// use telemetry_pipeline::config::parse_duration;
///
/// assert_eq!(parse_duration("250"), Ok(Duration::from_millis(250)));
/// assert_eq!(parse_duration("2s"), Ok(Duration::from_secs(2)));
/// assert!(parse_duration("fast").is_err());
/// ```
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    if digits.is_empty() {
        return Err("expected an integer with an optional unit".to_string());
    }
    let amount: u64 = digits.parse().map_err(|e| format!("{e}"))?;

    let duration = match unit.trim() {
        "ns" => Some(Duration::from_nanos(amount)),
        "us" => Some(Duration::from_micros(amount)),
        "" | "ms" => Some(Duration::from_millis(amount)),
        "s" => Some(Duration::from_secs(amount)),
        "m" => amount.checked_mul(60).map(Duration::from_secs),
        "h" => amount.checked_mul(3600).map(Duration::from_secs),
        other => return Err(format!("unknown unit {other:?}")),
    };
    duration.ok_or_else(|| "duration overflows".to_string())
}
