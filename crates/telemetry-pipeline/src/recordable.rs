//! The record type that flows through processors into exporters.

use crate::span::{AttributeValue, SpanKind, SpanStatus};
use std::time::{Duration, SystemTime};

/// Identity of a span within a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SpanContext {
    /// 128-bit trace identifier, zero when invalid
    pub trace_id: u128,
    /// 64-bit span identifier, zero when invalid
    pub span_id: u64,
    /// W3C trace flags (bit 0 = sampled)
    pub trace_flags: u8,
}

impl SpanContext {
    pub const SAMPLED: u8 = 0x01;

    pub fn new(trace_id: u128, span_id: u64) -> Self {
        Self {
            trace_id,
            span_id,
            trace_flags: Self::SAMPLED,
        }
    }

    /// A context with no identity, used as the parent of root spans.
    pub const fn invalid() -> Self {
        Self {
            trace_id: 0,
            span_id: 0,
            trace_flags: 0,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.trace_id != 0 && self.span_id != 0
    }

    #[inline]
    pub fn is_sampled(&self) -> bool {
        self.trace_flags & Self::SAMPLED != 0
    }
}

/// Exporter-specific representation of one finished span.
///
/// A recordable is created by [`Exporter::make_recordable`](crate::Exporter::make_recordable),
/// filled in by the instrumentation layer through these setters, then moved
/// through the processor into an export batch. It is owned by exactly one
/// stage at a time.
pub trait Recordable: Send + 'static {
    fn set_identity(&mut self, context: &SpanContext, parent_span_id: u64);

    fn set_name(&mut self, name: &str);

    fn set_kind(&mut self, kind: SpanKind);

    fn set_attribute(&mut self, key: &str, value: AttributeValue);

    fn add_event(&mut self, name: &str, timestamp: SystemTime);

    fn set_status(&mut self, status: SpanStatus, description: &str);

    fn set_start_time(&mut self, start: SystemTime);

    fn set_duration(&mut self, duration: Duration);
}
