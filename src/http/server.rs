//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (access tracing, request timeout)
//! - Hand pipeline endpoints to the RequestPipeline
//! - Expose accumulated metrics on /metrics
//! - Serve until the shutdown signal fires

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ServiceConfig;
use crate::http::request::{inbound_request, X_CORRELATION_ID};
use crate::pipeline::{Endpoint, RequestPipeline};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RequestPipeline>,
}

/// HTTP front end for the request pipeline.
pub struct HttpServer {
    router: Router,
    config: ServiceConfig,
}

impl HttpServer {
    /// Create a new HTTP server around an already-built pipeline.
    pub fn new(config: ServiceConfig, pipeline: Arc<RequestPipeline>) -> Self {
        let state = AppState { pipeline };
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ServiceConfig, state: AppState) -> Router {
        Router::new()
            .route("/", get(greeting_handler))
            .route("/another", get(another_handler))
            .route("/metrics", get(metrics_handler))
            .route("/favicon.ico", get(not_found))
            .fallback(not_found)
            .with_state(state)
            .layer(timeout_layer(config))
            .layer(TraceLayer::new_for_http())
    }

    /// The router, for driving the server without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires (or its sender is dropped).
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}

/// Outer request boundary; requests exceeding it are answered with 408.
fn timeout_layer(config: &ServiceConfig) -> TimeoutLayer {
    TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        Duration::from_secs(config.listener.request_timeout_secs),
    )
}

async fn greeting_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<Vec<(String, String)>>,
) -> Response {
    let request = inbound_request(Endpoint::Greeting, &method, &uri, &headers, &query);
    run_pipeline(&state, Endpoint::Greeting, request)
}

async fn another_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<Vec<(String, String)>>,
) -> Response {
    let request = inbound_request(Endpoint::Another, &method, &uri, &headers, &query);
    run_pipeline(&state, Endpoint::Another, request)
}

fn run_pipeline(
    state: &AppState,
    endpoint: Endpoint,
    request: crate::pipeline::InboundRequest,
) -> Response {
    let outcome = state.pipeline.handle(endpoint, &request);

    let status = StatusCode::from_u16(outcome.status).unwrap_or(StatusCode::OK);
    let mut response = (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        outcome.body,
    )
        .into_response();
    if let Ok(value) = HeaderValue::from_str(outcome.correlation_id.as_str()) {
        response.headers_mut().insert(X_CORRELATION_ID, value);
    }
    response
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.pipeline.metrics().render(),
    )
        .into_response()
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}
