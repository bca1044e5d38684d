//! Retry strategies
//!
//! A strategy decides, per failure, whether an operation should be retried and
//! how long to wait first. Strategies are shared across requests, so they only
//! see a read-only [`RetryRequest`] view.

use std::fmt;

use super::action::RetryAction;
use super::backoff::{BackoffCalculator, exponential_backoff};
use super::reason::RetryReason;
use super::request::RetryRequest;
use std::time::Duration;

/// Determines if an operation should be retried, and if so how long to wait.
pub trait RetryStrategy: fmt::Debug + Send + Sync {
    fn retry_after(&self, request: &dyn RetryRequest, reason: RetryReason) -> RetryAction;
}

/// Keeps retrying until the operation succeeds or the caller's deadline expires.
///
/// Non-idempotent operations are only retried when the reason says that is safe.
#[derive(Clone)]
pub struct BestEffortRetryStrategy {
    backoff_calculator: BackoffCalculator,
}

impl BestEffortRetryStrategy {
    /// Uses `calculator` for retry durations, or exponential backoff
    /// (1ms to 500ms, factor 2) when `None`.
    pub fn new(calculator: Option<BackoffCalculator>) -> Self {
        let backoff_calculator = calculator.unwrap_or_else(|| {
            exponential_backoff(Duration::from_millis(1), Duration::from_millis(500), 2.0)
        });
        Self { backoff_calculator }
    }
}

impl Default for BestEffortRetryStrategy {
    fn default() -> Self {
        Self::new(None)
    }
}

impl fmt::Debug for BestEffortRetryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BestEffortRetryStrategy")
            .field("backoff_calculator", &"<fn>")
            .finish()
    }
}

impl RetryStrategy for BestEffortRetryStrategy {
    fn retry_after(&self, request: &dyn RetryRequest, reason: RetryReason) -> RetryAction {
        if request.idempotent() || reason.allows_non_idempotent_retry() {
            return RetryAction::WithDuration((self.backoff_calculator)(request.retry_attempts()));
        }

        RetryAction::NoRetry
    }
}

/// Never retries. Reasons flagged as always-retry still bypass this.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailFastRetryStrategy;

impl RetryStrategy for FailFastRetryStrategy {
    fn retry_after(&self, _request: &dyn RetryRequest, _reason: RetryReason) -> RetryAction {
        RetryAction::NoRetry
    }
}
