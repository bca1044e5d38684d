//! Per-request retry state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::reason::RetryReason;
use super::strategy::RetryStrategy;
use crate::error::ErrorContext;
use crate::observability::RequestSpanContext;

/// Read-only view of a request, as seen by a [`RetryStrategy`].
pub trait RetryRequest: Send + Sync {
    /// Number of retries recorded so far.
    fn retry_attempts(&self) -> u32;
    /// Short correlation identifier, stable for the lifetime of the request.
    fn identifier(&self) -> &str;
    /// Whether the operation is known to be idempotent.
    fn idempotent(&self) -> bool;
    /// The distinct reasons observed so far, in first-seen order.
    fn retry_reasons(&self) -> &[RetryReason];
}

/// A request that can possibly be retried by the orchestrator.
pub struct RetryableRequest {
    // Effectively a set: attempts are counted separately.
    reasons: Vec<RetryReason>,
    attempts: u32,

    operation: String,
    identifier: String,
    idempotent: bool,
    strategy: Option<Arc<dyn RetryStrategy>>,
    parent_span: Option<RequestSpanContext>,
    created_at: Instant,
}

impl RetryableRequest {
    pub fn new(
        operation: impl Into<String>,
        idempotent: bool,
        parent_span: Option<RequestSpanContext>,
        strategy: Option<Arc<dyn RetryStrategy>>,
    ) -> Self {
        let mut identifier = uuid::Uuid::new_v4().simple().to_string();
        identifier.truncate(6);

        Self {
            reasons: Vec::new(),
            attempts: 0,
            operation: operation.into(),
            identifier,
            idempotent,
            strategy,
            parent_span,
            created_at: Instant::now(),
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn strategy(&self) -> Option<&Arc<dyn RetryStrategy>> {
        self.strategy.as_ref()
    }

    pub fn parent_span(&self) -> Option<&RequestSpanContext> {
        self.parent_span.as_ref()
    }

    /// Time since the request was created.
    pub fn elapsed(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Count one more retry, remembering `reason` if it has not been seen yet.
    pub(crate) fn record_retry_attempt(&mut self, reason: RetryReason) {
        self.attempts += 1;
        if !self.reasons.contains(&reason) {
            self.reasons.push(reason);
        }
    }

    /// Snapshot of the retry history, attached to user-visible failures.
    pub(crate) fn error_context(&self) -> ErrorContext {
        ErrorContext {
            operation: self.operation.clone(),
            opaque: self.identifier.clone(),
            time_observed: self.elapsed(),
            retry_reasons: self.reasons.clone(),
            retry_attempts: self.attempts,
        }
    }
}

impl RetryRequest for RetryableRequest {
    fn retry_attempts(&self) -> u32 {
        self.attempts
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn idempotent(&self) -> bool {
        self.idempotent
    }

    fn retry_reasons(&self) -> &[RetryReason] {
        &self.reasons
    }
}

impl std::fmt::Debug for RetryableRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryableRequest")
            .field("operation", &self.operation)
            .field("identifier", &self.identifier)
            .field("idempotent", &self.idempotent)
            .field("attempts", &self.attempts)
            .field("reasons", &self.reasons)
            .field("strategy", &self.strategy)
            .finish()
    }
}
