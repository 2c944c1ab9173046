use crate::error::EvalError;
use serde::Serialize;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use uuid::Uuid;

/// Correlation token shared by every span of one pipeline invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TraceContext {
    pub trace_id: Uuid,
}

/// A single completed span, ready for delivery to a sink
#[derive(Debug, Clone, Serialize)]
pub struct SpanRecord {
    pub trace_id: Uuid,
    pub span_id: Uuid,
    /// Operation name, e.g. "movie_rating_chain" or "model_invoke"
    pub name: String,
    /// Inputs attached on entry
    pub input: serde_json::Value,
    /// Outputs attached on success
    pub output: Option<serde_json::Value>,
    /// Error text attached on failure
    pub error: Option<String>,
    pub duration_ms: u128,
}

/// Destination for span records.
///
/// Recording is fire-and-forget: a sink must swallow its own delivery
/// failures rather than surface them to the instrumented call.
pub trait TraceSink: Send + Sync {
    fn record(&self, span: SpanRecord);
    /// Force delivery of any buffered records before process exit
    fn flush(&self);
}

/// Sink that emits spans through the `log` facade
#[derive(Debug, Default)]
pub struct LogSink {
    recorded: AtomicUsize,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TraceSink for LogSink {
    fn record(&self, span: SpanRecord) {
        self.recorded.fetch_add(1, Ordering::Relaxed);
        match serde_json::to_string(&span) {
            Ok(json) => log::info!(target: "trace", "{json}"),
            Err(err) => log::warn!(
                target: "trace",
                "Failed to serialize span '{}': {err}",
                span.name
            ),
        }
    }

    fn flush(&self) {
        log::info!(
            target: "trace",
            "Delivered {} span(s)",
            self.recorded.load(Ordering::Relaxed)
        );
    }
}

/// Sink that keeps records in memory, for tests and offline inspection
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<SpanRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far
    pub fn records(&self) -> Vec<SpanRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl TraceSink for MemorySink {
    fn record(&self, span: SpanRecord) {
        self.records.lock().unwrap().push(span);
    }

    fn flush(&self) {}
}

/// Hands out trace contexts and scoped spans backed by a shared sink
#[derive(Clone)]
pub struct Tracer {
    sink: Arc<dyn TraceSink>,
}

impl Tracer {
    pub fn new(sink: Arc<dyn TraceSink>) -> Self {
        Self { sink }
    }

    /// Begin a new trace for one pipeline invocation
    pub fn start_trace(&self) -> TraceContext {
        TraceContext {
            trace_id: Uuid::new_v4(),
        }
    }

    /// Open a span under the given trace context.
    ///
    /// The span must be closed explicitly with [`Span::finish`] or
    /// [`Span::fail`] on every exit path.
    pub fn span(&self, ctx: &TraceContext, name: &str, input: serde_json::Value) -> Span {
        Span {
            trace_id: ctx.trace_id,
            span_id: Uuid::new_v4(),
            name: name.to_string(),
            input,
            start: Instant::now(),
            sink: Arc::clone(&self.sink),
        }
    }

    pub fn flush(&self) {
        self.sink.flush();
    }
}

/// An open span; consumed when it is finished or failed
pub struct Span {
    trace_id: Uuid,
    span_id: Uuid,
    name: String,
    input: serde_json::Value,
    start: Instant,
    sink: Arc<dyn TraceSink>,
}

impl Span {
    /// Close the span successfully, attaching its output
    pub fn finish(self, output: serde_json::Value) {
        self.record(Some(output), None);
    }

    /// Close the span with the error that ended it
    pub fn fail(self, error: &EvalError) {
        self.record(None, Some(error.to_string()));
    }

    fn record(self, output: Option<serde_json::Value>, error: Option<String>) {
        self.sink.record(SpanRecord {
            trace_id: self.trace_id,
            span_id: self.span_id,
            name: self.name,
            input: self.input,
            output,
            error,
            duration_ms: self.start.elapsed().as_millis(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_span_finish_records_output() {
        let sink = Arc::new(MemorySink::new());
        let tracer = Tracer::new(sink.clone());
        let ctx = tracer.start_trace();

        let span = tracer.span(&ctx, "model_invoke", json!({"prompt": "hi"}));
        span.finish(json!({"content": "hello"}));

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "model_invoke");
        assert_eq!(records[0].trace_id, ctx.trace_id);
        assert_eq!(records[0].output, Some(json!({"content": "hello"})));
        assert!(records[0].error.is_none());
    }

    #[test]
    fn test_span_fail_records_error_text() {
        let sink = Arc::new(MemorySink::new());
        let tracer = Tracer::new(sink.clone());
        let ctx = tracer.start_trace();

        let span = tracer.span(&ctx, "model_invoke", json!({}));
        span.fail(&EvalError::Transport("connection refused".to_string()));

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert!(records[0].output.is_none());
        assert!(
            records[0]
                .error
                .as_deref()
                .unwrap()
                .contains("connection refused")
        );
    }

    #[test]
    fn test_spans_share_trace_id_within_one_trace() {
        let sink = Arc::new(MemorySink::new());
        let tracer = Tracer::new(sink.clone());
        let ctx = tracer.start_trace();

        tracer.span(&ctx, "first", json!({})).finish(json!({}));
        tracer.span(&ctx, "second", json!({})).finish(json!({}));

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].trace_id, records[1].trace_id);
        assert_ne!(records[0].span_id, records[1].span_id);
    }

    #[test]
    fn test_separate_traces_get_distinct_ids() {
        let sink = Arc::new(MemorySink::new());
        let tracer = Tracer::new(sink);
        assert_ne!(tracer.start_trace().trace_id, tracer.start_trace().trace_id);
    }
}
