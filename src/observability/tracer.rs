//! Request tracing hooks.
//!
//! The client only needs to open and close spans and to hand span contexts to
//! nested operations. [`TracingRequestTracer`] maps those hooks onto `tracing`
//! spans; [`NoopTracer`] discards them.

use std::sync::Mutex;
use tracing::Span;

/// Propagable context of a request span, used as the parent of nested spans.
#[derive(Clone, Debug)]
pub struct RequestSpanContext {
    span: Span,
}

impl RequestSpanContext {
    pub fn from_span(span: Span) -> Self {
        Self { span }
    }

    pub fn none() -> Self {
        Self { span: Span::none() }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}

/// A single traced unit of work.
pub trait RequestSpan: Send + Sync {
    /// Finish the span. Later calls are no-ops.
    fn end(&self);
    /// Context for spans nested under this one.
    fn context(&self) -> RequestSpanContext;
    fn set_attribute(&self, key: &'static str, value: &str);
}

/// Creates request spans.
pub trait RequestTracer: Send + Sync {
    fn request_span(
        &self,
        parent: Option<&RequestSpanContext>,
        operation: &str,
    ) -> Box<dyn RequestSpan>;
}

/// Tracer that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

struct NoopSpan;

impl RequestSpan for NoopSpan {
    fn end(&self) {}

    fn context(&self) -> RequestSpanContext {
        RequestSpanContext::none()
    }

    fn set_attribute(&self, _key: &'static str, _value: &str) {}
}

impl RequestTracer for NoopTracer {
    fn request_span(
        &self,
        _parent: Option<&RequestSpanContext>,
        _operation: &str,
    ) -> Box<dyn RequestSpan> {
        Box::new(NoopSpan)
    }
}

/// Tracer backed by `tracing` spans.
///
/// Spans without an explicit parent nest under the current span.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingRequestTracer;

struct TracingSpan {
    // `None` once ended; the span closes when its last handle (including those
    // held by child contexts) is dropped.
    span: Mutex<Option<Span>>,
}

impl RequestSpan for TracingSpan {
    fn end(&self) {
        if let Ok(mut guard) = self.span.lock() {
            guard.take();
        }
    }

    fn context(&self) -> RequestSpanContext {
        self.span
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
            .map(RequestSpanContext::from_span)
            .unwrap_or_else(RequestSpanContext::none)
    }

    fn set_attribute(&self, key: &'static str, value: &str) {
        if let Ok(guard) = self.span.lock() {
            if let Some(span) = guard.as_ref() {
                span.record(key, value);
            }
        }
    }
}

impl RequestTracer for TracingRequestTracer {
    fn request_span(
        &self,
        parent: Option<&RequestSpanContext>,
        operation: &str,
    ) -> Box<dyn RequestSpan> {
        let parent = parent.map_or_else(Span::current, |p| p.span().clone());
        let span = tracing::debug_span!(
            parent: &parent,
            "kv_request",
            otel.name = operation,
            db.system = "kv",
            db.operation = tracing::field::Empty,
        );
        Box::new(TracingSpan {
            span: Mutex::new(Some(span)),
        })
    }
}
