//! Span creation and export.
//!
//! # Responsibilities
//! - Open spans as children of the context's active span
//! - Stamp every span with the request's correlation id
//! - Hand finished spans to a [`SpanExporter`] in the order they close
//!
//! # Design Decisions
//! - Exporters are interchangeable collaborators chosen at construction
//! - Disabled tracing still builds spans, the exporter simply drops them
//! - All timestamps come from one [`Clock`] owned by the tracer

use std::sync::{Arc, Mutex};

use crate::observability::clock::Clock;
use crate::observability::context::CorrelationContext;
use crate::observability::span::{Span, SpanRecord};
use crate::observability::value::Fields;

/// Accepts finished spans.
pub trait SpanExporter: Send + Sync {
    fn export(&self, span: SpanRecord);

    /// Push out anything buffered. Called once at shutdown.
    fn flush(&self) {}
}

/// Writes each finished span as a diagnostics event.
#[derive(Debug, Default)]
pub struct LogSpanExporter {
    service_name: String,
}

impl LogSpanExporter {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }
}

impl SpanExporter for LogSpanExporter {
    fn export(&self, span: SpanRecord) {
        let attributes = serde_json::to_string(&span.attributes).unwrap_or_default();
        tracing::info!(
            target: "spans",
            service = %self.service_name,
            span_id = %span.span_id,
            parent_span_id = span.parent_span_id.as_ref().map(|p| p.as_str()).unwrap_or(""),
            correlation_id = %span.correlation_id,
            name = %span.name,
            status = ?span.status,
            events = span.events.len(),
            duration_us = span.duration.as_micros() as u64,
            attributes = %attributes,
            "span finished"
        );
    }
}

/// Drops every span.
#[derive(Debug, Default)]
pub struct NoopSpanExporter;

impl SpanExporter for NoopSpanExporter {
    fn export(&self, _span: SpanRecord) {}
}

/// Collects finished spans in memory.
#[derive(Debug, Default)]
pub struct InMemorySpanExporter {
    spans: Mutex<Vec<SpanRecord>>,
}

impl InMemorySpanExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the spans exported so far, in close order.
    pub fn finished(&self) -> Vec<SpanRecord> {
        self.spans.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn clear(&self) {
        self.spans.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl SpanExporter for InMemorySpanExporter {
    fn export(&self, span: SpanRecord) {
        self.spans.lock().unwrap_or_else(|e| e.into_inner()).push(span);
    }
}

/// Opens spans and routes them to an exporter once closed.
#[derive(Clone)]
pub struct SpanTracer {
    exporter: Arc<dyn SpanExporter>,
    clock: Clock,
}

impl SpanTracer {
    pub fn new(exporter: Arc<dyn SpanExporter>) -> Self {
        Self {
            exporter,
            clock: Clock::new(),
        }
    }

    /// A tracer whose spans are discarded.
    pub fn disabled() -> Self {
        Self::new(Arc::new(NoopSpanExporter))
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Flush the exporter. Blocking; call off the async workers.
    pub fn flush(&self) {
        self.exporter.flush();
    }

    /// Open `name` as a child of `ctx`'s active span (or as a root span).
    ///
    /// Returns the derived context with the new span active, plus the span itself.
    pub fn start_span(
        &self,
        ctx: &CorrelationContext,
        name: &str,
        attributes: Fields,
    ) -> (CorrelationContext, Span) {
        let span = Span::start(
            name,
            ctx.active_span(),
            ctx.correlation_id().clone(),
            attributes,
            self.clock,
            self.exporter.clone(),
        );
        (ctx.with_span(span.clone()), span)
    }
}

impl std::fmt::Debug for SpanTracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpanTracer").finish_non_exhaustive()
    }
}
