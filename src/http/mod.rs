//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, routing, middleware)
//!     → request.rs (method, path, host, query parameter → InboundRequest)
//!     → pipeline::RequestPipeline (traces, logs, metrics, body)
//!     → response with x-correlation-id header
//!
//! /metrics      → MetricsRecorder::render
//! /favicon.ico  → 404, never enters the pipeline
//! ```

pub mod request;
pub mod server;

pub use request::X_CORRELATION_ID;
pub use server::HttpServer;
