use crate::recordable::{Recordable, SpanContext};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, SystemTime};

/// Concrete recordable used by the bundled exporters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpanData {
    /// Unique trace identifier (128-bit)
    pub trace_id: u128,
    /// Unique span identifier (64-bit)
    pub span_id: u64,
    /// Parent span identifier (0 if root span)
    pub parent_span_id: u64,
    /// Operation name
    pub name: String,
    pub kind: SpanKind,
    /// Span attributes (boxed to keep SpanData small while it sits in the queue)
    pub attributes: Box<HashMap<String, AttributeValue>>,
    pub events: Vec<SpanEvent>,
    pub status: SpanStatus,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub status_description: String,
    /// Span start time (Unix nanoseconds)
    pub start_time: u64,
    pub duration_nanos: u64,
}

/// A timestamped annotation on a span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEvent {
    pub name: String,
    /// Unix nanoseconds
    pub timestamp: u64,
}

/// Attribute value types for span metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Array(Vec<String>),
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Span execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SpanStatus {
    /// Span completed successfully
    Ok,
    /// Span completed with error
    Error,
    /// Span status unknown
    #[default]
    Unset,
}

/// Span kind according to OpenTelemetry specification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SpanKind {
    /// Internal operation span
    #[default]
    Internal,
    /// Server-side RPC span
    Server,
    /// Client-side RPC span
    Client,
    /// Producer span (messaging)
    Producer,
    /// Consumer span (messaging)
    Consumer,
}

fn unix_nanos(time: SystemTime) -> u64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos() as u64)
}

impl SpanData {
    pub fn new() -> Self {
        Self::default()
    }

    /// End time in Unix nanoseconds.
    pub fn end_time(&self) -> u64 {
        self.start_time.saturating_add(self.duration_nanos)
    }

    pub fn is_root(&self) -> bool {
        self.parent_span_id == 0
    }
}

impl Recordable for SpanData {
    fn set_identity(&mut self, context: &SpanContext, parent_span_id: u64) {
        self.trace_id = context.trace_id;
        self.span_id = context.span_id;
        self.parent_span_id = parent_span_id;
    }

    fn set_name(&mut self, name: &str) {
        name.clone_into(&mut self.name);
    }

    fn set_kind(&mut self, kind: SpanKind) {
        self.kind = kind;
    }

    fn set_attribute(&mut self, key: &str, value: AttributeValue) {
        self.attributes.insert(key.to_string(), value);
    }

    fn add_event(&mut self, name: &str, timestamp: SystemTime) {
        self.events.push(SpanEvent {
            name: name.to_string(),
            timestamp: unix_nanos(timestamp),
        });
    }

    fn set_status(&mut self, status: SpanStatus, description: &str) {
        self.status = status;
        // Descriptions only carry meaning for errors
        if status == SpanStatus::Error {
            description.clone_into(&mut self.status_description);
        } else {
            self.status_description.clear();
        }
    }

    fn set_start_time(&mut self, start: SystemTime) {
        self.start_time = unix_nanos(start);
    }

    fn set_duration(&mut self, duration: Duration) {
        self.duration_nanos = duration.as_nanos() as u64;
    }
}
