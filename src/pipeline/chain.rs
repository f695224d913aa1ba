//! Simulated nested call chain run by the primary endpoint.
//!
//! ```text
//! root span
//!   └── "do first"   info, error (non-fatal)
//!         └── "do second"   info, warn
//! ```
//!
//! Each step ends its span through a drop guard, so the span is closed on
//! every exit path. The error record is for demonstration only: it changes
//! neither span status nor control flow.

use crate::observability::{CorrelationContext, Fields, SpanTracer};

pub fn do_first(tracer: &SpanTracer, ctx: &CorrelationContext) {
    let (ctx, span) = tracer.start_span(ctx, "do first", Fields::new());
    let _end = span.end_on_drop();

    ctx.logger().info("do first");
    ctx.logger().error("do second error");
    do_second(tracer, &ctx);
}

pub fn do_second(tracer: &SpanTracer, ctx: &CorrelationContext) {
    let (ctx, span) = tracer.start_span(ctx, "do second", Fields::new());
    let _end = span.end_on_drop();

    ctx.logger().info("do second");
    ctx.logger().warn("do second warn");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::{InMemorySpanExporter, Level, Logger, MemorySink, SpanStatus};
    use std::sync::Arc;

    #[test]
    fn test_chain_records_in_order() {
        let sink = Arc::new(MemorySink::new());
        let exporter = Arc::new(InMemorySpanExporter::new());
        let tracer = SpanTracer::new(exporter.clone());
        let ctx = CorrelationContext::create(&Logger::new(vec![sink.clone()]), tracer.clock());
        let (root_ctx, root) = tracer.start_span(&ctx, "root", Fields::new());

        do_first(&tracer, &root_ctx);

        let levels: Vec<(Level, String)> = sink
            .records()
            .into_iter()
            .map(|r| (r.level, r.message))
            .collect();
        assert_eq!(
            levels,
            vec![
                (Level::Info, "do first".to_string()),
                (Level::Error, "do second error".to_string()),
                (Level::Info, "do second".to_string()),
                (Level::Warn, "do second warn".to_string()),
            ]
        );

        let spans = exporter.finished();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].name, "do second");
        assert_eq!(spans[1].name, "do first");
        assert_eq!(spans[1].parent_span_id.as_ref(), Some(root.id()));
        assert!(spans.iter().all(|s| s.status == SpanStatus::Unset));
        assert!(!root.is_ended());
    }
}
