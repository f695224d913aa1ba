//! Request pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! InboundRequest
//!     → Received    CorrelationContext created, root span opened, "request received"
//!     → Validating  validation.rs predicate; failure = warn + span Error, not fatal
//!     → Executing   chain.rs nested child spans (primary endpoint only)
//!     → Responding  response.rs renders the body
//!     → Completed   elapsed time → metrics, "request processed", root span closed
//! ```
//!
//! # Design Decisions
//! - Collaborators (tracer, logger, metrics) are injected at construction
//! - The stage machine is strictly linear; there is no retry path
//! - Every request is answered with 200; validation problems only
//!   degrade the body and mark the trace

pub mod chain;
pub mod response;
pub mod validation;

use std::sync::Arc;

use crate::config::ServiceConfig;
use crate::observability::value::fields;
use crate::observability::{
    CorrelationContext, CorrelationId, FieldValue, Fields, LabelSet, Level, Logger,
    MetricsRecorder, SpanStatus, SpanTracer,
};
use self::validation::ValidationFailure;

/// Endpoints that run through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// `GET /`: greets the `name` query parameter.
    Greeting,
    /// `GET /another`: fixed acknowledgement.
    Another,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Greeting => "/",
            Endpoint::Another => "/another",
        }
    }

    /// Query parameter whose value is the request's input.
    pub fn query_param(&self) -> &'static str {
        match self {
            Endpoint::Greeting => "name",
            Endpoint::Another => "q",
        }
    }

    fn span_name(&self) -> &'static str {
        match self {
            Endpoint::Greeting => "handler function",
            Endpoint::Another => "another handler function",
        }
    }
}

/// The parts of an HTTP request the pipeline looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundRequest {
    pub method: String,
    pub path: String,
    /// Path and query, as requested.
    pub uri: String,
    pub host: String,
    /// Value of the endpoint's query parameter; empty when absent.
    pub input: String,
}

/// Per-request processing stages, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Received,
    Validating,
    Executing,
    Responding,
    Completed,
}

#[derive(Debug)]
struct StageTracker {
    visited: Vec<Stage>,
}

impl StageTracker {
    fn new() -> Self {
        Self {
            visited: vec![Stage::Received],
        }
    }

    fn advance(&mut self, next: Stage, correlation_id: &CorrelationId) {
        let current = self.visited.last().copied().unwrap_or(Stage::Received);
        debug_assert!(next > current, "stage went backwards: {:?} -> {:?}", current, next);
        tracing::trace!(%correlation_id, from = ?current, to = ?next, "pipeline stage");
        self.visited.push(next);
    }
}

/// Result of running one request through the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineResponse {
    pub status: u16,
    pub body: String,
    pub correlation_id: CorrelationId,
    pub elapsed_ms: f64,
    pub validation: Option<ValidationFailure>,
    pub stages: Vec<Stage>,
}

/// Static settings of a [`RequestPipeline`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub service_name: String,
    pub environment: String,
    pub min_name_length: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&ServiceConfig::default())
    }
}

impl From<&ServiceConfig> for PipelineSettings {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            service_name: config.tracing.service_name.clone(),
            environment: config.tracing.environment.clone(),
            min_name_length: config.pipeline.min_name_length,
        }
    }
}

/// Orchestrates tracing, logging and metrics for one request at a time.
///
/// Shared by every in-flight request; it holds no per-request state.
pub struct RequestPipeline {
    tracer: SpanTracer,
    logger: Logger,
    metrics: Arc<dyn MetricsRecorder>,
    settings: PipelineSettings,
}

impl RequestPipeline {
    pub fn new(
        tracer: SpanTracer,
        logger: Logger,
        metrics: Arc<dyn MetricsRecorder>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            tracer,
            logger,
            metrics,
            settings,
        }
    }

    pub fn metrics(&self) -> &Arc<dyn MetricsRecorder> {
        &self.metrics
    }

    pub fn tracer(&self) -> &SpanTracer {
        &self.tracer
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    fn root_attributes(&self, endpoint: Endpoint, request: &InboundRequest) -> Fields {
        fields([
            ("http.method", request.method.as_str()),
            ("http.path", request.path.as_str()),
            ("http.host", request.host.as_str()),
            (endpoint.query_param(), request.input.as_str()),
            ("service.name", self.settings.service_name.as_str()),
            ("deployment.environment", self.settings.environment.as_str()),
        ])
    }

    /// Run `request` through every stage and produce the response.
    pub fn handle(&self, endpoint: Endpoint, request: &InboundRequest) -> PipelineResponse {
        // Received
        let mut stages = StageTracker::new();
        let ctx = CorrelationContext::create(&self.logger, self.tracer.clock());
        let (ctx, root) =
            self.tracer
                .start_span(&ctx, endpoint.span_name(), self.root_attributes(endpoint, request));
        let log = ctx.logger();
        log.log(
            Level::Info,
            fields([
                ("method", request.method.as_str()),
                ("path", request.path.as_str()),
                ("host", request.host.as_str()),
                ("query", request.input.as_str()),
            ]),
            "request received",
        );

        stages.advance(Stage::Validating, ctx.correlation_id());
        let failure = match endpoint {
            Endpoint::Greeting => {
                validation::check_name(&request.input, self.settings.min_name_length).err()
            }
            Endpoint::Another => None,
        };
        if let Some(failure) = &failure {
            let ValidationFailure::TooShort { length, min } = failure;
            log.log(
                Level::Warn,
                fields([("name_length", *length), ("min_length", *min)]),
                "name is too short",
            );
            root.record_error(failure);
        }

        stages.advance(Stage::Executing, ctx.correlation_id());
        if endpoint == Endpoint::Greeting {
            chain::do_first(&self.tracer, &ctx);
        }
        root.add_event(
            "handler event",
            fields([
                ("logged", FieldValue::Bool(true)),
                ("host", FieldValue::from(&request.host)),
            ]),
        );

        stages.advance(Stage::Responding, ctx.correlation_id());
        let body = match endpoint {
            Endpoint::Greeting => response::greeting(&request.input, failure.is_some()),
            Endpoint::Another => response::ACKNOWLEDGEMENT.to_string(),
        };

        stages.advance(Stage::Completed, ctx.correlation_id());
        let elapsed_ms = ctx.elapsed().as_secs_f64() * 1000.0;
        self.metrics
            .observe_latency(elapsed_ms, &LabelSet::new().with("url", request.uri.as_str()));
        self.metrics.increment_count(
            &LabelSet::new()
                .with("method", request.method.as_str())
                .with("endpoint", endpoint.path()),
        );
        log.log(
            Level::Info,
            fields([("elapsed_ms", elapsed_ms)]),
            "request processed",
        );

        if !root.status().is_error() {
            root.set_status(SpanStatus::Ok);
        }
        root.end();

        PipelineResponse {
            status: 200,
            body,
            correlation_id: ctx.correlation_id().clone(),
            elapsed_ms,
            validation: failure,
            stages: stages.visited,
        }
    }
}
