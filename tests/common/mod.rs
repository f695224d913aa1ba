//! Shared utilities for integration and load testing.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use telemetry_pipeline::config::ServiceConfig;
use telemetry_pipeline::observability::{
    InMemorySpanExporter, Logger, MemorySink, MetricsAccumulator, SpanTracer,
};
use telemetry_pipeline::pipeline::PipelineSettings;
use telemetry_pipeline::{HttpServer, RequestPipeline, Shutdown};

/// A running service wired to in-memory collaborators.
pub struct TestService {
    pub addr: SocketAddr,
    pub logs: Arc<MemorySink>,
    pub spans: Arc<InMemorySpanExporter>,
    pub metrics: Arc<MetricsAccumulator>,
    shutdown: Shutdown,
}

impl TestService {
    pub fn url(&self, path_and_query: &str) -> String {
        format!("http://{}{}", self.addr, path_and_query)
    }
}

impl Drop for TestService {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start the real HTTP server on an ephemeral port.
pub async fn start_service() -> TestService {
    let logs = Arc::new(MemorySink::new());
    let spans = Arc::new(InMemorySpanExporter::new());
    let metrics = Arc::new(MetricsAccumulator::new());

    let config = ServiceConfig::default();
    let pipeline = RequestPipeline::new(
        SpanTracer::new(spans.clone()),
        Logger::new(vec![logs.clone()]),
        metrics.clone(),
        PipelineSettings::from(&config),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let server = HttpServer::new(config, Arc::new(pipeline));
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestService {
        addr,
        logs,
        spans,
        metrics,
        shutdown,
    }
}

/// A client that does not reuse connections between tests.
#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
