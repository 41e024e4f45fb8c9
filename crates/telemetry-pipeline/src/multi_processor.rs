//! Fan-out of one span stream to several processors.
//!
//! Each child processor may sit in front of a different exporter, so a span
//! carries one child record per processor: [`MultiRecordable`] holds them and
//! broadcasts every setter, and `on_end` hands each child its own record.

use crate::processor::{deadline_after, remaining, Processor};
use crate::recordable::{Recordable, SpanContext};
use crate::span::{AttributeValue, SpanKind, SpanStatus};
use std::fmt;
use std::time::{Duration, SystemTime};

/// Position of a child within a [`MultiProcessor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessorId(pub usize);

/// One record per child processor, indexed by [`ProcessorId`].
#[derive(Debug)]
pub struct MultiRecordable<R> {
    records: Vec<Option<R>>,
}

impl<R: Recordable> MultiRecordable<R> {
    /// The record belonging to `id`, if it has not been released.
    pub fn get(&self, id: ProcessorId) -> Option<&R> {
        self.records.get(id.0).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: ProcessorId) -> Option<&mut R> {
        self.records.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Takes the record belonging to `id` out, leaving its slot empty.
    pub fn release(&mut self, id: ProcessorId) -> Option<R> {
        self.records.get_mut(id.0).and_then(Option::take)
    }

    /// Number of child records not yet released.
    pub fn len(&self) -> usize {
        self.records.iter().filter(|r| r.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn each(&mut self, mut f: impl FnMut(&mut R)) {
        for record in self.records.iter_mut().flatten() {
            f(record);
        }
    }
}

impl<R: Recordable> Recordable for MultiRecordable<R> {
    fn set_identity(&mut self, context: &SpanContext, parent_span_id: u64) {
        self.each(|r| r.set_identity(context, parent_span_id));
    }

    fn set_name(&mut self, name: &str) {
        self.each(|r| r.set_name(name));
    }

    fn set_kind(&mut self, kind: SpanKind) {
        self.each(|r| r.set_kind(kind));
    }

    fn set_attribute(&mut self, key: &str, value: AttributeValue) {
        self.each(|r| r.set_attribute(key, value.clone()));
    }

    fn add_event(&mut self, name: &str, timestamp: SystemTime) {
        self.each(|r| r.add_event(name, timestamp));
    }

    fn set_status(&mut self, status: SpanStatus, description: &str) {
        self.each(|r| r.set_status(status, description));
    }

    fn set_start_time(&mut self, start: SystemTime) {
        self.each(|r| r.set_start_time(start));
    }

    fn set_duration(&mut self, duration: Duration) {
        self.each(|r| r.set_duration(duration));
    }
}

/// Broadcasts every span to an ordered list of child processors.
pub struct MultiProcessor<R: Recordable> {
    processors: Vec<Box<dyn Processor<R>>>,
}

impl<R: Recordable> Default for MultiProcessor<R> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<R: Recordable> MultiProcessor<R> {
    pub fn new(processors: Vec<Box<dyn Processor<R>>>) -> Self {
        Self { processors }
    }

    /// Appends a child. Records made before this call carry no record for it.
    pub fn add_processor(&mut self, processor: Box<dyn Processor<R>>) -> ProcessorId {
        self.processors.push(processor);
        ProcessorId(self.processors.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Runs `op` on every child with the budget left until the shared
    /// deadline. Every child is called; the result is `true` only if all
    /// children returned `true`.
    fn for_all_within<F>(&self, timeout: Duration, mut op: F) -> bool
    where
        F: FnMut(&dyn Processor<R>, Duration) -> bool,
    {
        let deadline = deadline_after(timeout);
        self.processors.iter().fold(true, |all_ok, processor| {
            let budget = match deadline {
                Some(_) => remaining(deadline),
                None => timeout,
            };
            op(processor.as_ref(), budget) && all_ok
        })
    }
}

impl<R: Recordable> Processor<MultiRecordable<R>> for MultiProcessor<R> {
    fn make_recordable(&self) -> MultiRecordable<R> {
        MultiRecordable {
            records: self
                .processors
                .iter()
                .map(|p| Some(p.make_recordable()))
                .collect(),
        }
    }

    fn on_start(&self, record: &mut MultiRecordable<R>, parent: &SpanContext) {
        for (index, processor) in self.processors.iter().enumerate() {
            if let Some(child) = record.get_mut(ProcessorId(index)) {
                processor.on_start(child, parent);
            }
        }
    }

    fn on_end(&self, mut record: MultiRecordable<R>) {
        for (index, processor) in self.processors.iter().enumerate() {
            if let Some(child) = record.release(ProcessorId(index)) {
                processor.on_end(child);
            }
        }
    }

    fn force_flush(&self, timeout: Duration) -> bool {
        self.for_all_within(timeout, |p, budget| p.force_flush(budget))
    }

    fn shutdown(&self, timeout: Duration) -> bool {
        self.for_all_within(timeout, |p, budget| p.shutdown(budget))
    }
}

impl<R: Recordable> fmt::Debug for MultiProcessor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiProcessor")
            .field("processors", &self.processors.len())
            .finish()
    }
}
