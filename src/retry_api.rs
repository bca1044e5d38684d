//! Public Retry API Facade
//!
//! [`RetryOrchestrator::submit_retryable`] drives one logical request through as
//! many attempts as its retry strategy allows, within the deadline of its
//! [`RequestContext`].
//!
//! Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use kvreliable::error::DefaultErrorClassifier;
//! use kvreliable::execution::{StatusCode, TransportError};
//! use kvreliable::observability::NoopTracer;
//! use kvreliable::retry::{BestEffortRetryStrategy, RetryableRequest};
//! use kvreliable::retry_api::RetryOrchestrator;
//! use kvreliable::utils::RequestContext;
//!
//! # async fn example() -> Result<(), kvreliable::KvError> {
//! let orchestrator = RetryOrchestrator::new(Arc::new(NoopTracer), Arc::new(DefaultErrorClassifier));
//! let ctx = RequestContext::background().with_timeout(Duration::from_secs(2));
//! let request = RetryableRequest::new(
//!     "ping",
//!     true,
//!     None,
//!     Some(Arc::new(BestEffortRetryStrategy::default())),
//! );
//!
//! let pong = orchestrator
//!     .submit_retryable(&ctx, request, |_ctx| async {
//!         Ok::<_, TransportError>("pong")
//!     })
//!     .await?;
//! assert_eq!(pong, "pong");
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;

use tracing::Instrument;

use crate::error::{ErrorClassifier, KvError, Result};
use crate::execution::TransportError;
use crate::observability::RequestTracer;
use crate::retry::{RetryRequest, RetryableRequest, maybe_retry};
use crate::utils::cancel::{ContextError, RequestContext};

/// Runs requests to completion, retrying them when their failures allow it.
pub struct RetryOrchestrator {
    tracer: Arc<dyn RequestTracer>,
    classifier: Arc<dyn ErrorClassifier>,
}

impl RetryOrchestrator {
    pub fn new(tracer: Arc<dyn RequestTracer>, classifier: Arc<dyn ErrorClassifier>) -> Self {
        Self { tracer, classifier }
    }

    /// Send `request` until it succeeds, fails for good, or `ctx` ends.
    ///
    /// `send` performs one attempt and is given the request context. Attempts
    /// are strictly sequential. Failures that end the request carry the retry
    /// history in their [`ErrorContext`](crate::error::ErrorContext), except a
    /// cancelled context which yields a plain [`KvError::RequestCanceled`].
    pub async fn submit_retryable<T, F, Fut>(
        &self,
        ctx: &RequestContext,
        mut request: RetryableRequest,
        mut send: F,
    ) -> Result<T>
    where
        F: FnMut(RequestContext) -> Fut,
        Fut: Future<Output = std::result::Result<T, TransportError>>,
    {
        loop {
            let span = self
                .tracer
                .request_span(request.parent_span(), "dispatch_to_server");
            let attempt = send(ctx.clone()).instrument(span.context().span().clone());

            let outcome = tokio::select! {
                biased;
                reason = ctx.done() => Err(reason),
                res = attempt => Ok(res),
            };
            span.end();

            let err = match outcome {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(err)) => self.classifier.map_error(err, request.idempotent()),
                Err(ContextError::Cancelled) => return Err(KvError::RequestCanceled),
                Err(ContextError::DeadlineExceeded) if request.idempotent() => {
                    KvError::UnambiguousTimeout
                }
                Err(ContextError::DeadlineExceeded) => KvError::AmbiguousTimeout,
            };

            if self.classifier.is_timeout(&err) {
                return Err(KvError::Timeout {
                    inner: Box::new(err),
                    context: request.error_context(),
                });
            }

            let Some(reason) = self.classifier.retry_reason(&err) else {
                return Err(KvError::Failed {
                    inner: Box::new(err),
                    context: request.error_context(),
                });
            };

            let Some(wake) = maybe_retry(&mut request, reason) else {
                return Err(KvError::Failed {
                    inner: Box::new(err),
                    context: request.error_context(),
                });
            };

            tokio::select! {
                _ = tokio::time::sleep_until(wake) => {}
                reason = ctx.done() => {
                    return Err(match reason {
                        // Ran out of time while waiting to retry.
                        ContextError::DeadlineExceeded => KvError::Timeout {
                            inner: Box::new(KvError::UnambiguousTimeout),
                            context: request.error_context(),
                        },
                        ContextError::Cancelled => KvError::RequestCanceled,
                    });
                }
            }
        }
    }
}

impl std::fmt::Debug for RetryOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryOrchestrator").finish_non_exhaustive()
    }
}
