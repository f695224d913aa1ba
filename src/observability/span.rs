//! Spans: timed units of work with attributes, events and a terminal status.
//!
//! # Lifecycle
//! ```text
//! SpanTracer::start_span ──▶ open ──(set_attribute / add_event / set_status)──▶ end() ──▶ SpanExporter
//!                                                                                 │
//!                                                             further end() calls are no-ops
//! ```
//!
//! A [`Span`] is a cheap, cloneable handle. The first call to [`Span::end`]
//! freezes the span into a [`SpanRecord`] and hands it to the exporter;
//! every later call returns without exporting anything.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::observability::clock::Clock;
use crate::observability::context::CorrelationId;
use crate::observability::tracer::SpanExporter;
use crate::observability::value::{set_field, FieldValue, Fields};

/// Identifier of a single span.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SpanId(String);

impl SpanId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SpanId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SpanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Terminal status of a span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", content = "description", rename_all = "snake_case")]
pub enum SpanStatus {
    Unset,
    Ok,
    Error(String),
}

impl SpanStatus {
    pub fn is_error(&self) -> bool {
        matches!(self, SpanStatus::Error(_))
    }
}

/// A timestamped event recorded on a span.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpanEvent {
    pub name: String,
    pub attributes: Fields,
    pub timestamp: DateTime<Utc>,
}

/// Immutable snapshot of a finished span, as handed to exporters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpanRecord {
    pub span_id: SpanId,
    pub parent_span_id: Option<SpanId>,
    pub correlation_id: CorrelationId,
    pub name: String,
    pub attributes: Fields,
    pub events: Vec<SpanEvent>,
    pub status: SpanStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(skip)]
    pub duration: Duration,
}

impl SpanRecord {
    /// Look up an attribute by key.
    pub fn attribute(&self, key: &str) -> Option<&FieldValue> {
        self.attributes.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Whether this span's interval lies within `parent`'s interval.
    pub fn within(&self, parent: &SpanRecord) -> bool {
        self.start_time >= parent.start_time && self.end_time <= parent.end_time
    }
}

struct SpanState {
    attributes: Fields,
    events: Vec<SpanEvent>,
    status: SpanStatus,
    ended: bool,
}

struct SpanInner {
    id: SpanId,
    parent: Option<SpanId>,
    correlation_id: CorrelationId,
    name: String,
    start_time: DateTime<Utc>,
    started: Instant,
    clock: Clock,
    exporter: Arc<dyn SpanExporter>,
    state: Mutex<SpanState>,
}

/// Handle to an open (or already finished) span.
#[derive(Clone)]
pub struct Span {
    inner: Arc<SpanInner>,
}

impl Span {
    pub(crate) fn start(
        name: &str,
        parent: Option<&Span>,
        correlation_id: CorrelationId,
        attributes: Fields,
        clock: Clock,
        exporter: Arc<dyn SpanExporter>,
    ) -> Self {
        let (start_time, started) = clock.now();
        Self {
            inner: Arc::new(SpanInner {
                id: SpanId::new(),
                parent: parent.map(|p| p.id().clone()),
                correlation_id,
                name: name.to_string(),
                start_time,
                started,
                clock,
                exporter,
                state: Mutex::new(SpanState {
                    attributes,
                    events: Vec::new(),
                    status: SpanStatus::Unset,
                    ended: false,
                }),
            }),
        }
    }

    pub fn id(&self) -> &SpanId {
        &self.inner.id
    }

    pub fn parent_id(&self) -> Option<&SpanId> {
        self.inner.parent.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.inner.correlation_id
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.inner.start_time
    }

    pub fn status(&self) -> SpanStatus {
        self.state().status.clone()
    }

    pub fn is_ended(&self) -> bool {
        self.state().ended
    }

    // Telemetry must never take a request down with it, so a poisoned lock
    // is recovered rather than propagated.
    fn state(&self) -> MutexGuard<'_, SpanState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_attribute(&self, key: impl Into<String>, value: impl Into<FieldValue>) {
        let mut state = self.state();
        if !state.ended {
            set_field(&mut state.attributes, key, value);
        }
    }

    pub fn set_attributes(&self, attributes: Fields) {
        let mut state = self.state();
        if state.ended {
            return;
        }
        for (k, v) in attributes {
            set_field(&mut state.attributes, k, v);
        }
    }

    pub fn add_event(&self, name: impl Into<String>, attributes: Fields) {
        let timestamp = self.inner.clock.now().0;
        let mut state = self.state();
        if !state.ended {
            state.events.push(SpanEvent {
                name: name.into(),
                attributes,
                timestamp,
            });
        }
    }

    /// Set the span status.
    ///
    /// `Ok` is final. `Unset` never overwrites a status that was already set.
    pub fn set_status(&self, status: SpanStatus) {
        let mut state = self.state();
        if state.ended || state.status == SpanStatus::Ok {
            return;
        }
        if status == SpanStatus::Unset {
            return;
        }
        state.status = status;
    }

    /// Record an error: appends an `exception` event and marks the span Error.
    pub fn record_error(&self, err: &dyn std::error::Error) {
        let message = err.to_string();
        self.add_event(
            "exception",
            vec![("exception.message".to_string(), FieldValue::Str(message.clone()))],
        );
        self.set_status(SpanStatus::Error(message));
    }

    /// End the span. Only the first call has any effect.
    pub fn end(&self) {
        let record = {
            let mut state = self.state();
            if state.ended {
                return;
            }
            state.ended = true;

            let ended = Instant::now();
            let duration = ended.saturating_duration_since(self.inner.started);
            SpanRecord {
                span_id: self.inner.id.clone(),
                parent_span_id: self.inner.parent.clone(),
                correlation_id: self.inner.correlation_id.clone(),
                name: self.inner.name.clone(),
                attributes: std::mem::take(&mut state.attributes),
                events: std::mem::take(&mut state.events),
                status: state.status.clone(),
                start_time: self.inner.start_time,
                end_time: self.inner.clock.wall_at(ended),
                duration,
            }
        };
        self.inner.exporter.export(record);
    }

    /// Returns a guard that ends this span when dropped.
    #[must_use = "the span ends as soon as the guard is dropped"]
    pub fn end_on_drop(&self) -> EndOnDrop {
        EndOnDrop { span: self.clone() }
    }
}

impl std::fmt::Debug for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Span")
            .field("id", &self.inner.id)
            .field("parent", &self.inner.parent)
            .field("name", &self.inner.name)
            .finish()
    }
}

/// Ends the wrapped span on drop, covering early returns and unwinding.
pub struct EndOnDrop {
    span: Span,
}

impl Drop for EndOnDrop {
    fn drop(&mut self) {
        self.span.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::tracer::InMemorySpanExporter;

    fn open(name: &str, exporter: &Arc<InMemorySpanExporter>) -> Span {
        Span::start(
            name,
            None,
            CorrelationId::new(),
            Fields::new(),
            Clock::new(),
            exporter.clone(),
        )
    }

    #[derive(Debug)]
    struct TooShort;

    impl std::fmt::Display for TooShort {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("NAME TOO SHORT")
        }
    }

    impl std::error::Error for TooShort {}

    #[test]
    fn test_end_is_idempotent() {
        let exporter = Arc::new(InMemorySpanExporter::new());
        let span = open("handler", &exporter);

        span.end();
        span.end();
        drop(span.end_on_drop());

        assert_eq!(exporter.finished().len(), 1);
        assert!(span.is_ended());
    }

    #[test]
    fn test_mutation_after_end_is_ignored() {
        let exporter = Arc::new(InMemorySpanExporter::new());
        let span = open("handler", &exporter);
        span.set_attribute("before", true);
        span.end();
        span.set_attribute("after", true);
        span.add_event("late", Fields::new());
        span.set_status(SpanStatus::Error("late".into()));

        let record = &exporter.finished()[0];
        assert!(record.attribute("before").is_some());
        assert!(record.attribute("after").is_none());
        assert!(record.events.is_empty());
        assert_eq!(record.status, SpanStatus::Unset);
    }

    #[test]
    fn test_record_error_marks_span() {
        let exporter = Arc::new(InMemorySpanExporter::new());
        let span = open("handler", &exporter);
        span.record_error(&TooShort);
        span.end();

        let record = &exporter.finished()[0];
        assert_eq!(record.status, SpanStatus::Error("NAME TOO SHORT".into()));
        assert_eq!(record.events[0].name, "exception");
        assert_eq!(
            record.events[0].attributes[0].1,
            FieldValue::Str("NAME TOO SHORT".into())
        );
    }

    #[test]
    fn test_ok_status_is_final() {
        let exporter = Arc::new(InMemorySpanExporter::new());
        let span = open("handler", &exporter);
        span.set_status(SpanStatus::Ok);
        span.set_status(SpanStatus::Error("nope".into()));
        assert_eq!(span.status(), SpanStatus::Ok);

        let other = open("other", &exporter);
        other.set_status(SpanStatus::Error("first".into()));
        other.set_status(SpanStatus::Unset);
        assert!(other.status().is_error());
    }

    #[test]
    fn test_guard_ends_on_early_return() {
        fn early(span: &Span, bail: bool) -> Option<()> {
            let _end = span.end_on_drop();
            if bail {
                return None;
            }
            Some(())
        }

        let exporter = Arc::new(InMemorySpanExporter::new());
        let span = open("child", &exporter);
        assert!(early(&span, true).is_none());
        assert!(span.is_ended());
        assert_eq!(exporter.finished().len(), 1);
    }

    #[test]
    fn test_end_time_not_before_start() {
        let exporter = Arc::new(InMemorySpanExporter::new());
        let span = open("handler", &exporter);
        span.end();
        let record = &exporter.finished()[0];
        assert!(record.end_time >= record.start_time);
    }
}
