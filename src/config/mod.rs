//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → lifecycle::startup builds sinks, exporter and recorder from it
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; it is read-only for the request path
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, load_with_overrides, parse_config, ConfigError};
pub use schema::ServiceConfig;
pub use schema::{
    ListenerConfig, LoggingConfig, MetricsBackend, MetricsConfig, PipelineConfig,
    SpanExporterKind, TracingConfig,
};
