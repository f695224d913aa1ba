//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! RequestPipeline
//!     → context.rs (correlation id + bound logger + active span)
//!     → tracer.rs / span.rs (spans with parent linkage)  → SpanExporter
//!     → logging.rs (structured request records)          → LogSink(s)
//!     → metrics.rs (latency histogram, request counter)  → MetricsRecorder
//!
//! Consumers:
//!     → stdout + append-only log file (JSON lines)
//!     → /metrics (Prometheus scrape)
//!     → span exporter (OTLP collector, diagnostics stream, or in-memory for tests)
//! ```
//!
//! # Design Decisions
//! - No ambient state: the context is passed explicitly down the call chain
//! - Correlation id flows through every record and span of a request
//! - Metrics are cheap (atomic increments)
//! - Exporters, sinks and recorders are swappable trait objects

pub mod clock;
pub mod context;
pub mod logging;
pub mod metrics;
pub mod otlp;
pub mod span;
pub mod tracer;
pub mod value;

pub use clock::Clock;
pub use context::{CorrelationContext, CorrelationId, CORRELATION_ID_FIELD};
pub use logging::{ConsoleSink, FileSink, Level, LogRecord, LogSink, Logger, MemorySink};
pub use metrics::{LabelSet, MetricsAccumulator, MetricsRecorder};
pub use span::{Span, SpanRecord, SpanStatus};
pub use tracer::{InMemorySpanExporter, SpanExporter, SpanTracer};
pub use value::{FieldValue, Fields};
