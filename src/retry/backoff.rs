//! Backoff calculators
//!
//! A backoff calculator maps the number of retry attempts made so far to the
//! delay before the next one.

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Computes the delay before a retry from the number of attempts made so far.
pub type BackoffCalculator = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

const DEFAULT_MIN_BACKOFF: Duration = Duration::from_millis(1);
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_millis(500);
const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

/// Exponential backoff: `min * factor^attempts`, clamped to `[min, max]`.
///
/// Zero durations and non-positive factors fall back to 1ms, 500ms and 2.0.
pub fn exponential_backoff(min: Duration, max: Duration, factor: f64) -> BackoffCalculator {
    ExponentialBackoff::new()
        .with_min(min)
        .with_max(max)
        .with_factor(factor)
        .build()
}

/// Fixed step backoff used for failures that are always retried.
pub fn controlled_backoff(retry_attempts: u32) -> Duration {
    match retry_attempts {
        0 => Duration::from_millis(1),
        1 => Duration::from_millis(10),
        2 => Duration::from_millis(50),
        3 => Duration::from_millis(100),
        4 => Duration::from_millis(500),
        _ => Duration::from_millis(1000),
    }
}

/// Builder for exponential backoff calculators with optional jitter.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    min: Duration,
    max: Duration,
    factor: f64,
    jitter_factor: f64,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            min: DEFAULT_MIN_BACKOFF,
            max: DEFAULT_MAX_BACKOFF,
            factor: DEFAULT_BACKOFF_FACTOR,
            jitter_factor: 0.0,
        }
    }
}

impl ExponentialBackoff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum delay (ignored when zero)
    pub fn with_min(mut self, min: Duration) -> Self {
        if !min.is_zero() {
            self.min = min;
        }
        self
    }

    /// Set the maximum delay (ignored when zero)
    pub fn with_max(mut self, max: Duration) -> Self {
        if !max.is_zero() {
            self.max = max;
        }
        self
    }

    /// Set the growth factor (ignored unless positive)
    pub fn with_factor(mut self, factor: f64) -> Self {
        if factor > 0.0 {
            self.factor = factor;
        }
        self
    }

    /// Set jitter factor (0.0 to 1.0)
    pub fn with_jitter(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor.clamp(0.0, 1.0);
        self
    }

    /// Delay for the given attempt count.
    pub fn delay(&self, retry_attempts: u32) -> Duration {
        let min = self.min.as_nanos() as f64;
        let max = (self.max.as_nanos() as f64).max(min);

        // Clamp before jitter: the raw exponential reaches infinity on long runs.
        let mut backoff = (min * self.factor.powf(f64::from(retry_attempts))).clamp(min, max);
        if self.jitter_factor > 0.0 {
            let range = backoff * self.jitter_factor;
            backoff = (backoff + rand::thread_rng().gen_range(-range..=range)).clamp(min, max);
        }

        Duration::from_nanos(backoff as u64)
    }

    pub fn build(self) -> BackoffCalculator {
        Arc::new(move |attempts| self.delay(attempts))
    }
}
