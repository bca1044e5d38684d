//! Collection handle.
//!
//! Single-document operations go through the retry orchestrator; batches go
//! through the bulk provider and are never retried.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::bulk::{BulkOp, BulkOpOptions, Cas, GetResult, KvBulkProvider, MutationResult};
use crate::config::TimeoutsConfig;
use crate::error::Result;
use crate::execution::{GetRequest, Keyspace, KvService, RemoveRequest, StoreRequest};
use crate::retry::{RetryStrategy, RetryableRequest};
use crate::retry_api::RetryOrchestrator;
use crate::transcoder::Transcoder;
use crate::utils::cancel::RequestContext;

/// A collection within a bucket and scope.
#[derive(Clone)]
pub struct Collection {
    keyspace: Keyspace,
    timeouts: TimeoutsConfig,
    transcoder: Arc<dyn Transcoder>,
    strategy: Option<Arc<dyn RetryStrategy>>,
    service: Arc<dyn KvService>,
    orchestrator: Arc<RetryOrchestrator>,
    bulk: Arc<KvBulkProvider>,
    context: Option<RequestContext>,
}

impl Collection {
    pub(crate) fn new(
        keyspace: Keyspace,
        timeouts: TimeoutsConfig,
        transcoder: Arc<dyn Transcoder>,
        strategy: Option<Arc<dyn RetryStrategy>>,
        service: Arc<dyn KvService>,
        orchestrator: Arc<RetryOrchestrator>,
        bulk: Arc<KvBulkProvider>,
    ) -> Self {
        Self {
            keyspace,
            timeouts,
            transcoder,
            strategy,
            service,
            orchestrator,
            bulk,
            context: None,
        }
    }

    /// A handle whose single-document requests run under `ctx`.
    ///
    /// Cancelling `ctx` cancels every in-flight request made through the
    /// returned handle. The kv timeout still applies on top of its deadline.
    pub fn with_context(&self, ctx: RequestContext) -> Self {
        Self {
            context: Some(ctx),
            ..self.clone()
        }
    }

    pub fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }

    pub fn name(&self) -> &str {
        &self.keyspace.collection_name
    }

    pub fn timeouts(&self) -> &TimeoutsConfig {
        &self.timeouts
    }

    /// Transcoder used when a request does not override it.
    pub fn transcoder(&self) -> &Arc<dyn Transcoder> {
        &self.transcoder
    }

    /// Execute a batch of operations.
    ///
    /// Returns the operations in submission order with their `result` or `err`
    /// populated.
    pub async fn do_bulk(&self, ops: Vec<BulkOp>, opts: BulkOpOptions) -> Result<Vec<BulkOp>> {
        self.bulk.dispatch(self, ops, opts).await
    }

    fn request_context(&self) -> RequestContext {
        self.context
            .clone()
            .unwrap_or_default()
            .with_timeout(self.timeouts.kv_timeout)
    }

    /// Fetch a document.
    pub async fn get(&self, id: &str) -> Result<GetResult> {
        let ctx = self.request_context();
        let request = RetryableRequest::new("get", true, None, self.strategy.clone());

        let response = self
            .orchestrator
            .submit_retryable(&ctx, request, |ctx| {
                let service = self.service.clone();
                let request = GetRequest {
                    keyspace: self.keyspace.clone(),
                    key: id.to_string(),
                };
                async move { service.get(&ctx, request).await }
            })
            .await?;

        Ok(GetResult::from_response(response, self.transcoder.clone()))
    }

    /// Create or overwrite a document. A zero `expiry` leaves it unset.
    pub async fn upsert(&self, id: &str, value: &Value, expiry: Duration) -> Result<MutationResult> {
        let (content, content_flags) = self.transcoder.encode(value)?;
        let ctx = self.request_context();
        let request = RetryableRequest::new("upsert", false, None, self.strategy.clone());

        let response = self
            .orchestrator
            .submit_retryable(&ctx, request, |ctx| {
                let service = self.service.clone();
                let request = StoreRequest {
                    keyspace: self.keyspace.clone(),
                    key: id.to_string(),
                    content: content.clone(),
                    content_flags,
                    expiry_secs: (!expiry.is_zero())
                        .then(|| u32::try_from(expiry.as_secs()).unwrap_or(u32::MAX)),
                    cas: None,
                };
                async move { service.upsert(&ctx, request).await }
            })
            .await?;

        Ok(MutationResult::from(response))
    }

    /// Remove a document, optionally only if its CAS still matches.
    pub async fn remove(&self, id: &str, cas: Cas) -> Result<MutationResult> {
        let ctx = self.request_context();
        let request = RetryableRequest::new("remove", false, None, self.strategy.clone());

        let response = self
            .orchestrator
            .submit_retryable(&ctx, request, |ctx| {
                let service = self.service.clone();
                let request = RemoveRequest {
                    keyspace: self.keyspace.clone(),
                    key: id.to_string(),
                    cas: cas.to_wire(),
                };
                async move { service.remove(&ctx, request).await }
            })
            .await?;

        Ok(MutationResult::from(response))
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("keyspace", &self.keyspace)
            .field("timeouts", &self.timeouts)
            .field("transcoder", &self.transcoder)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}
