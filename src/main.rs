//! Correlated request telemetry service (v1)
//!
//! A small HTTP service built with Tokio and Axum in which every request is
//! traced, logged and measured under a single correlation id.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌───────────────────────────────────────────────────────┐
//!                        │                 TELEMETRY PIPELINE                    │
//!                        │                                                       │
//!     Client Request     │  ┌─────────┐    ┌──────────────────────────────────┐  │
//!     ───────────────────┼─▶│  http   │───▶│        RequestPipeline           │  │
//!                        │  │ server  │    │ Received → Validating → Executing│  │
//!                        │  └─────────┘    │ → Responding → Completed         │  │
//!     Client Response    │       ▲         └───────┬──────────┬──────────┬────┘  │
//!     ◀──────────────────┼───────┘                 │          │          │       │
//!                        │                         ▼          ▼          ▼       │
//!                        │                   ┌─────────┐ ┌────────┐ ┌─────────┐  │
//!                        │                   │ tracer  │ │ logger │ │ metrics │  │
//!                        │                   │  spans  │ │ records│ │ samples │  │
//!                        │                   └────┬────┘ └───┬────┘ └────┬────┘  │
//!                        │                        ▼          ▼           ▼       │
//!                        │                   exporter   stdout+file   /metrics   │
//!                        └───────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;

use telemetry_pipeline::config::load_with_overrides;
use telemetry_pipeline::lifecycle::{bootstrap, signals, startup, Shutdown};
use telemetry_pipeline::observability::logging::init_diagnostics;
use telemetry_pipeline::HttpServer;

#[derive(Parser)]
#[command(name = "telemetry-pipeline")]
#[command(about = "HTTP service with correlated traces, logs and metrics", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_with_overrides(cli.config.as_deref(), cli.bind.as_deref())?;

    init_diagnostics(&config.logging.diagnostics_level);
    tracing::info!("telemetry-pipeline v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.listener.request_timeout_secs,
        log_file = %config.logging.file_path().display(),
        "Configuration loaded"
    );

    let pipeline = match bootstrap(&config) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            std::process::exit(1);
        }
    };

    let listener = match startup::bind(&config.listener.bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            std::process::exit(1);
        }
    };

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    signals::spawn_signal_listener(shutdown);

    let tracer = pipeline.tracer().clone();
    let server = HttpServer::new(config, std::sync::Arc::new(pipeline));
    server.run(listener, server_shutdown).await?;

    // Drain batched spans before the runtime goes away.
    if let Err(e) = tokio::task::spawn_blocking(move || tracer.flush()).await {
        tracing::warn!(error = %e, "Span flush task failed");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
