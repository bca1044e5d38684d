//! Latency recording hooks.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Records operation latencies.
pub trait Meter: Send + Sync {
    fn record_duration(&self, service: &str, operation: &str, start: Instant);
}

/// Meter that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMeter;

impl Meter for NoopMeter {
    fn record_duration(&self, _service: &str, _operation: &str, _start: Instant) {}
}

/// Meter that emits each latency as a `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMeter;

impl Meter for TracingMeter {
    fn record_duration(&self, service: &str, operation: &str, start: Instant) {
        let elapsed = start.elapsed();
        tracing::trace!(
            target: "kvreliable::metrics",
            service,
            operation,
            duration_us = elapsed.as_micros() as u64,
            "operation duration"
        );
    }
}

/// Meter keeping every recorded latency in memory, keyed by service and operation.
#[derive(Debug, Default)]
pub struct InMemoryMeter {
    durations: Mutex<HashMap<(String, String), Vec<Duration>>>,
}

impl InMemoryMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded latencies for one operation.
    pub fn durations(&self, service: &str, operation: &str) -> Vec<Duration> {
        self.durations
            .lock()
            .ok()
            .and_then(|map| map.get(&(service.to_string(), operation.to_string())).cloned())
            .unwrap_or_default()
    }

    /// Total number of recordings across all operations.
    pub fn total_recordings(&self) -> usize {
        self.durations
            .lock()
            .map(|map| map.values().map(Vec::len).sum())
            .unwrap_or(0)
    }
}

impl Meter for InMemoryMeter {
    fn record_duration(&self, service: &str, operation: &str, start: Instant) {
        let elapsed = start.elapsed();
        if let Ok(mut map) = self.durations.lock() {
            map.entry((service.to_string(), operation.to_string()))
                .or_default()
                .push(elapsed);
        }
    }
}
