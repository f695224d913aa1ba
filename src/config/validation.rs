//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, thresholds >= 1)
//! - Check the bind address and log destination are usable strings
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::{ServiceConfig, SpanExporterKind};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "listener.request_timeout_secs",
            "must be greater than zero",
        ));
    }

    if config.logging.directory.as_os_str().is_empty() {
        errors.push(ValidationError::new("logging.directory", "must not be empty"));
    }

    if config.logging.file_name.trim().is_empty() {
        errors.push(ValidationError::new("logging.file_name", "must not be empty"));
    }

    if config.tracing.enabled && config.tracing.service_name.trim().is_empty() {
        errors.push(ValidationError::new(
            "tracing.service_name",
            "must not be empty when tracing is enabled",
        ));
    }

    if let SpanExporterKind::Otlp { endpoint } = &config.tracing.exporter {
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            errors.push(ValidationError::new(
                "tracing.exporter.otlp.endpoint",
                format!("'{}' must be an http:// or https:// URL", endpoint),
            ));
        }
    }

    if config.pipeline.min_name_length == 0 {
        errors.push(ValidationError::new(
            "pipeline.min_name_length",
            "must be at least 1",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
