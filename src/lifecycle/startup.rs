//! Startup orchestration.
//!
//! # Responsibilities
//! - Open the request log destinations (console, append-only file)
//! - Build the span exporter and metrics recorder selected by config
//! - Assemble the RequestPipeline from those collaborators
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal and no request is served
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)

use std::sync::Arc;
use thiserror::Error;

use crate::config::{MetricsBackend, ServiceConfig, SpanExporterKind};
use crate::observability::logging::{ConsoleSink, FileSink, FileSinkError, LogSink, Logger};
use crate::observability::metrics::{
    DisabledMetrics, MetricsAccumulator, MetricsRecorder, PrometheusRecorder,
};
use crate::observability::otlp::OtlpSpanExporter;
use crate::observability::tracer::{LogSpanExporter, NoopSpanExporter, SpanExporter, SpanTracer};
use crate::pipeline::{PipelineSettings, RequestPipeline};

/// Fatal startup errors.
#[derive(Debug, Error)]
pub enum StartupError {
    /// The log directory or file could not be prepared.
    #[error(transparent)]
    LogDestination(#[from] FileSinkError),

    /// The OTLP span exporter could not be built.
    #[error("unable to start OTLP span exporter: {0}")]
    SpanExporter(#[from] opentelemetry::trace::TraceError),

    /// The Prometheus recorder could not be installed.
    #[error("unable to install metrics recorder: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    /// The listener could not be bound.
    #[error("unable to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },
}

/// Open every configured request log sink.
pub fn build_logger(config: &ServiceConfig) -> Result<Logger, StartupError> {
    let mut sinks: Vec<Arc<dyn LogSink>> = Vec::new();
    if config.logging.console {
        sinks.push(Arc::new(ConsoleSink));
    }

    let file = FileSink::open(config.logging.file_path())?;
    tracing::info!(path = %file.path().display(), "Request log file opened");
    sinks.push(Arc::new(file));

    Ok(Logger::new(sinks))
}

/// Build the tracer for the configured exporter. OTLP needs a Tokio runtime.
pub fn build_tracer(config: &ServiceConfig) -> Result<SpanTracer, StartupError> {
    let settings = &config.tracing;
    let exporter: Arc<dyn SpanExporter> = match (settings.enabled, &settings.exporter) {
        (true, SpanExporterKind::Otlp { endpoint }) => Arc::new(OtlpSpanExporter::new(
            endpoint,
            &settings.service_name,
            &settings.environment,
        )?),
        (true, SpanExporterKind::Log) => {
            Arc::new(LogSpanExporter::new(settings.service_name.clone()))
        }
        _ => Arc::new(NoopSpanExporter),
    };
    Ok(SpanTracer::new(exporter))
}

pub fn build_metrics(config: &ServiceConfig) -> Result<Arc<dyn MetricsRecorder>, StartupError> {
    let recorder: Arc<dyn MetricsRecorder> = match config.metrics.backend {
        MetricsBackend::Prometheus => Arc::new(PrometheusRecorder::install()?),
        MetricsBackend::InMemory => Arc::new(MetricsAccumulator::new()),
        MetricsBackend::Disabled => Arc::new(DisabledMetrics),
    };
    Ok(recorder)
}

/// Build the request pipeline and all of its collaborators.
pub fn bootstrap(config: &ServiceConfig) -> Result<RequestPipeline, StartupError> {
    let logger = build_logger(config)?;
    let tracer = build_tracer(config)?;
    let metrics = build_metrics(config)?;

    tracing::info!(
        tracing_enabled = config.tracing.enabled,
        exporter = ?config.tracing.exporter,
        metrics_backend = ?config.metrics.backend,
        "Telemetry initialized"
    );

    Ok(RequestPipeline::new(
        tracer,
        logger,
        metrics,
        PipelineSettings::from(config),
    ))
}

/// Bind the TCP listener for `address`.
pub async fn bind(address: &str) -> Result<tokio::net::TcpListener, StartupError> {
    tokio::net::TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Endpoint, InboundRequest};

    fn config_in(dir: &std::path::Path) -> ServiceConfig {
        let mut config = ServiceConfig::default();
        config.logging.directory = dir.join("logs");
        config.logging.console = false;
        config.metrics.backend = MetricsBackend::InMemory;
        config.tracing.exporter = SpanExporterKind::None;
        config
    }

    #[test]
    fn test_bootstrap_writes_request_log() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let pipeline = bootstrap(&config).unwrap();
        let request = InboundRequest {
            method: "GET".into(),
            path: "/another".into(),
            uri: "/another?q=x".into(),
            host: "localhost".into(),
            input: "x".into(),
        };
        let resp = pipeline.handle(Endpoint::Another, &request);

        let log = std::fs::read_to_string(config.logging.file_path()).unwrap();
        assert_eq!(log.lines().count(), 2);
        assert!(log.contains(resp.correlation_id.as_str()));
    }

    #[test]
    fn test_unusable_log_directory_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();

        let mut config = config_in(dir.path());
        config.logging.directory = blocker;

        let err = bootstrap(&config).err().unwrap();
        assert!(matches!(err, StartupError::LogDestination(_)));
    }

    #[tokio::test]
    async fn test_otlp_exporter_selected_by_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.tracing.exporter = SpanExporterKind::Otlp {
            endpoint: "http://127.0.0.1:4317".into(),
        };

        let pipeline = bootstrap(&config).unwrap();
        let request = InboundRequest {
            method: "GET".into(),
            path: "/".into(),
            uri: "/?name=Al".into(),
            host: "localhost".into(),
            input: "Al".into(),
        };
        assert_eq!(pipeline.handle(Endpoint::Greeting, &request).status, 200);
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = taken.local_addr().unwrap().to_string();

        let err = bind(&address).await.unwrap_err();
        assert!(matches!(err, StartupError::Bind { .. }));
    }
}
