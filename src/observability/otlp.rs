//! OTLP span export.
//!
//! # Responsibilities
//! - Convert finished [`SpanRecord`]s into OpenTelemetry span data
//! - Ship them over OTLP/gRPC through a batch span processor
//!
//! # Design Decisions
//! - The trace id is the request's correlation id, so traces and request
//!   log records join on the same value
//! - The request path only enqueues; the batch processor owns network I/O
//! - Construction needs a running Tokio runtime (processor task, lazy channel)

use std::borrow::Cow;
use std::time::{Duration, SystemTime};

use opentelemetry::trace::{
    Event, SpanContext, SpanId as OtelSpanId, SpanKind, Status, TraceError, TraceFlags, TraceId,
    TraceState,
};
use opentelemetry::{InstrumentationLibrary, KeyValue, Value};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::export::trace::{SpanData, SpanExporter as _};
use opentelemetry_sdk::trace::{BatchSpanProcessor, SpanEvents, SpanLinks, SpanProcessor};
use opentelemetry_sdk::{runtime, Resource};

use crate::observability::span::{SpanId, SpanRecord, SpanStatus};
use crate::observability::tracer::SpanExporter;
use crate::observability::value::{FieldValue, Fields};

/// Collector address used when none is configured.
pub const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4317";

const EXPORT_TIMEOUT: Duration = Duration::from_secs(10);

/// Exports finished spans to an OTLP/gRPC collector.
#[derive(Debug)]
pub struct OtlpSpanExporter {
    endpoint: String,
    processor: BatchSpanProcessor<runtime::Tokio>,
}

impl OtlpSpanExporter {
    pub fn new(endpoint: &str, service_name: &str, environment: &str) -> Result<Self, TraceError> {
        let mut exporter = opentelemetry_otlp::new_exporter()
            .tonic()
            .with_endpoint(endpoint)
            .with_timeout(EXPORT_TIMEOUT)
            .build_span_exporter()?;
        exporter.set_resource(&Resource::new([
            KeyValue::new("service.name", service_name.to_string()),
            KeyValue::new("deployment.environment", environment.to_string()),
        ]));

        let processor = BatchSpanProcessor::builder(exporter, runtime::Tokio).build();
        tracing::info!(endpoint, "OTLP span exporter started");

        Ok(Self {
            endpoint: endpoint.to_string(),
            processor,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl SpanExporter for OtlpSpanExporter {
    fn export(&self, span: SpanRecord) {
        self.processor.on_end(to_span_data(&span));
    }

    fn flush(&self) {
        if let Err(e) = self.processor.force_flush() {
            tracing::warn!(endpoint = %self.endpoint, error = %e, "OTLP flush failed");
        }
    }
}

/// Trace id derived from the correlation id (a UUID, so exactly 16 bytes).
fn trace_id(record: &SpanRecord) -> TraceId {
    uuid::Uuid::parse_str(record.correlation_id.as_str())
        .map(|u| TraceId::from_bytes(*u.as_bytes()))
        .unwrap_or(TraceId::INVALID)
}

fn span_id(id: &SpanId) -> OtelSpanId {
    match uuid::Uuid::parse_str(id.as_str()) {
        Ok(u) => {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&u.as_bytes()[..8]);
            OtelSpanId::from_bytes(bytes)
        }
        Err(_) => OtelSpanId::INVALID,
    }
}

fn key_values(fields: &Fields) -> Vec<KeyValue> {
    fields
        .iter()
        .map(|(key, value)| {
            let value = match value {
                FieldValue::Str(s) => Value::from(s.clone()),
                FieldValue::Int(i) => Value::I64(*i),
                FieldValue::Float(f) => Value::F64(*f),
                FieldValue::Bool(b) => Value::Bool(*b),
            };
            KeyValue::new(key.clone(), value)
        })
        .collect()
}

/// Convert a finished span into the SDK's export representation.
pub fn to_span_data(record: &SpanRecord) -> SpanData {
    let span_context = SpanContext::new(
        trace_id(record),
        span_id(&record.span_id),
        TraceFlags::SAMPLED,
        false,
        TraceState::default(),
    );

    let mut events = SpanEvents::default();
    events.events = record
        .events
        .iter()
        .map(|e| {
            Event::new(
                e.name.clone(),
                SystemTime::from(e.timestamp),
                key_values(&e.attributes),
                0,
            )
        })
        .collect();

    let status = match &record.status {
        SpanStatus::Unset => Status::Unset,
        SpanStatus::Ok => Status::Ok,
        SpanStatus::Error(description) => Status::error(description.clone()),
    };

    SpanData {
        span_context,
        parent_span_id: record
            .parent_span_id
            .as_ref()
            .map(span_id)
            .unwrap_or(OtelSpanId::INVALID),
        span_kind: if record.parent_span_id.is_none() {
            SpanKind::Server
        } else {
            SpanKind::Internal
        },
        name: Cow::Owned(record.name.clone()),
        start_time: SystemTime::from(record.start_time),
        end_time: SystemTime::from(record.end_time),
        attributes: key_values(&record.attributes),
        dropped_attributes_count: 0,
        events,
        links: SpanLinks::default(),
        status,
        instrumentation_lib: InstrumentationLibrary::builder(env!("CARGO_PKG_NAME"))
            .with_version(env!("CARGO_PKG_VERSION"))
            .build(),
    }
}
