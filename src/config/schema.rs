//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address, request boundary).
    pub listener: ListenerConfig,

    /// Request log destinations.
    pub logging: LoggingConfig,

    /// Span export settings.
    pub tracing: TracingConfig,

    /// Metrics backend selection.
    pub metrics: MetricsConfig,

    /// Request pipeline behaviour.
    pub pipeline: PipelineConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout in seconds, enforced by the HTTP layer.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory holding the request log file. Created at startup.
    pub directory: PathBuf,

    /// Request log file name inside `directory`.
    pub file_name: String,

    /// Also write request records to stdout.
    pub console: bool,

    /// Filter directive for process diagnostics (overridden by RUST_LOG).
    pub diagnostics_level: String,
}

impl LoggingConfig {
    pub fn file_path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs"),
            file_name: "app.log".to_string(),
            console: true,
            diagnostics_level: "info".to_string(),
        }
    }
}

/// Span exporter selection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanExporterKind {
    /// Finished spans are batched and sent to an OTLP/gRPC collector.
    Otlp {
        #[serde(default = "default_otlp_endpoint")]
        endpoint: String,
    },
    /// Finished spans are written to the diagnostics stream.
    Log,
    /// Finished spans are dropped.
    None,
}

fn default_otlp_endpoint() -> String {
    crate::observability::otlp::DEFAULT_OTLP_ENDPOINT.to_string()
}

/// Tracing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TracingConfig {
    /// Enable span export.
    pub enabled: bool,

    /// Service name attached to every root span.
    pub service_name: String,

    /// Deployment environment attached to every root span.
    pub environment: String,

    /// Where finished spans go.
    pub exporter: SpanExporterKind,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            service_name: "logging-challenge".to_string(),
            environment: "staging".to_string(),
            exporter: SpanExporterKind::Log,
        }
    }
}

/// Metrics backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricsBackend {
    /// `metrics` facade with a Prometheus recorder (process-global).
    Prometheus,
    /// In-process atomic accumulator.
    InMemory,
    /// Samples are dropped.
    Disabled,
}

/// Metrics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub backend: MetricsBackend,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            backend: MetricsBackend::Prometheus,
        }
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Inputs shorter than this (in characters) fail validation.
    pub min_name_length: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { min_name_length: 2 }
    }
}
