//! Per-request correlation context.
//!
//! A [`CorrelationContext`] is created once per inbound request and passed
//! explicitly down the call chain. Deriving a child scope with
//! [`CorrelationContext::with_span`] swaps the active span and leaves the
//! correlation id and bound logger untouched, so every record and span
//! produced for the request carries the same id.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::{Duration, Instant};

use crate::observability::clock::Clock;
use crate::observability::logging::Logger;
use crate::observability::span::Span;

/// Log field under which the correlation id is bound.
pub const CORRELATION_ID_FIELD: &str = "correlation_id";

/// Opaque per-request identifier (random 128-bit UUID v4).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone)]
pub struct CorrelationContext {
    correlation_id: CorrelationId,
    created_at: DateTime<Utc>,
    started: Instant,
    active_span: Option<Span>,
    logger: Logger,
}

impl CorrelationContext {
    /// Allocate a fresh correlation id and bind it onto a logger derived from `base`.
    pub fn create(base: &Logger, clock: &Clock) -> Self {
        let correlation_id = CorrelationId::new();
        let logger = base.with([(CORRELATION_ID_FIELD, correlation_id.as_str())]);
        let (created_at, started) = clock.now();
        Self {
            correlation_id,
            created_at,
            started,
            active_span: None,
            logger,
        }
    }

    /// Derive a context whose active span is `span`.
    pub fn with_span(&self, span: Span) -> Self {
        Self {
            active_span: Some(span),
            ..self.clone()
        }
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time since the context was created.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn active_span(&self) -> Option<&Span> {
        self.active_span.as_ref()
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }
}

impl std::fmt::Debug for CorrelationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorrelationContext")
            .field("correlation_id", &self.correlation_id)
            .field("created_at", &self.created_at)
            .field("active_span", &self.active_span)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::logging::MemorySink;
    use crate::observability::tracer::{InMemorySpanExporter, SpanTracer};
    use crate::observability::value::FieldValue;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_created_ids_are_unique() {
        let logger = Logger::new(Vec::new());
        let clock = Clock::new();
        let ids: HashSet<String> = (0..1000)
            .map(|_| CorrelationContext::create(&logger, &clock).correlation_id().to_string())
            .collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_logger_is_bound_to_id() {
        let sink = Arc::new(MemorySink::new());
        let logger = Logger::new(vec![sink.clone()]);
        let ctx = CorrelationContext::create(&logger, &Clock::new());

        ctx.logger().info("hello");

        let records = sink.records();
        assert_eq!(
            records[0].field(CORRELATION_ID_FIELD),
            Some(&FieldValue::Str(ctx.correlation_id().to_string()))
        );
    }

    #[test]
    fn test_with_span_leaves_parent_usable() {
        let exporter = Arc::new(InMemorySpanExporter::new());
        let tracer = SpanTracer::new(exporter);
        let ctx = CorrelationContext::create(&Logger::new(Vec::new()), tracer.clock());
        assert!(ctx.active_span().is_none());

        let (child, span) = tracer.start_span(&ctx, "root", Vec::new());
        assert!(ctx.active_span().is_none());
        assert_eq!(child.active_span().map(|s| s.id()), Some(span.id()));
        assert_eq!(child.correlation_id(), ctx.correlation_id());
    }
}
