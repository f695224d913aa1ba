//! Configuration loading from disk.

use std::path::Path;
use std::fs;
use crate::config::schema::ServiceConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Validation(_) => None,
        }
    }
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ServiceConfig, ConfigError> {
    let config: ServiceConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&content)
}

/// Load from `path` if given, otherwise validate and return the defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
    load_with_overrides(path, None)
}

/// Load from `path` (or defaults), apply a bind address override, then validate.
pub fn load_with_overrides(
    path: Option<&Path>,
    bind_address: Option<&str>,
) -> Result<ServiceConfig, ConfigError> {
    let mut config: ServiceConfig = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
            toml::from_str(&content).map_err(ConfigError::Parse)?
        }
        None => ServiceConfig::default(),
    };
    if let Some(bind_address) = bind_address {
        config.listener.bind_address = bind_address.to_string();
    }
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{MetricsBackend, SpanExporterKind};

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = parse_config(
            r#"
            [listener]
            bind_address = "127.0.0.1:9000"

            [metrics]
            backend = "in_memory"
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
        assert_eq!(config.listener.request_timeout_secs, 30);
        assert_eq!(config.metrics.backend, MetricsBackend::InMemory);
        assert_eq!(config.tracing.exporter, SpanExporterKind::Log);
        assert_eq!(config.pipeline.min_name_length, 2);
    }

    #[test]
    fn test_otlp_exporter_defaults_endpoint() {
        let config = parse_config("[tracing]\nexporter = { otlp = {} }\n").unwrap();
        assert_eq!(
            config.tracing.exporter,
            SpanExporterKind::Otlp {
                endpoint: "http://localhost:4317".into()
            }
        );

        let config = parse_config(
            "[tracing.exporter.otlp]\nendpoint = \"http://collector:4317\"\n",
        )
        .unwrap();
        assert_eq!(
            config.tracing.exporter,
            SpanExporterKind::Otlp {
                endpoint: "http://collector:4317".into()
            }
        );
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service.toml");
        std::fs::write(&path, "[pipeline]\nmin_name_length = 3\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.pipeline.min_name_length, 3);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = parse_config("[listener]\nrequest_timeout_secs = 0\n").unwrap_err();
        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 1),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        let err = parse_config("[listener\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_bind_override_replaces_file_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service.toml");
        std::fs::write(&path, "[listener]\nbind_address = \"127.0.0.1:9000\"\n").unwrap();

        let config = load_with_overrides(Some(&path), Some("127.0.0.1:9100")).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:9100");
    }

    #[test]
    fn test_bad_bind_override_fails_validation() {
        let err = load_with_overrides(None, Some("not-an-address")).unwrap_err();
        match err {
            ConfigError::Validation(errors) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].field, "listener.bind_address");
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
