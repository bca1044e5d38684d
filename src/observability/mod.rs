//! Observability
//!
//! - tracer.rs: request span hooks (`RequestTracer`, `RequestSpan`)
//! - meter.rs: latency recording hooks (`Meter`)
//! - subscriber.rs: `tracing-subscriber` initialization helpers

pub mod meter;
pub mod subscriber;
pub mod tracer;

pub use meter::{InMemoryMeter, Meter, NoopMeter, TracingMeter};
pub use tracer::{
    NoopTracer, RequestSpan, RequestSpanContext, RequestTracer, TracingRequestTracer,
};

/// Service name used when recording key-value latencies.
pub const METER_SERVICE_KV: &str = "kv";
