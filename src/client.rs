//! Client entry point and builder.

use std::future::Future;
use std::sync::Arc;

use crate::bulk::KvBulkProvider;
use crate::collection::Collection;
use crate::config::{BulkConfig, ClientConfig, TimeoutsConfig};
use crate::error::{DefaultErrorClassifier, ErrorClassifier, Result};
use crate::execution::{Keyspace, KvService, TransportError};
use crate::observability::{Meter, NoopMeter, NoopTracer, RequestSpanContext, RequestTracer};
use crate::retry::{BestEffortRetryStrategy, RetryStrategy, RetryableRequest};
use crate::retry_api::RetryOrchestrator;
use crate::transcoder::{JsonTranscoder, Transcoder};
use crate::utils::cancel::RequestContext;

/// Key-value client.
///
/// Cheap to clone; clones share the retry orchestrator and the bulk worker pool.
#[derive(Clone)]
pub struct KvClient {
    service: Arc<dyn KvService>,
    transcoder: Arc<dyn Transcoder>,
    strategy: Option<Arc<dyn RetryStrategy>>,
    timeouts: TimeoutsConfig,
    orchestrator: Arc<RetryOrchestrator>,
    bulk: Arc<KvBulkProvider>,
}

impl KvClient {
    pub fn builder(service: Arc<dyn KvService>) -> KvClientBuilder {
        KvClientBuilder::new(service)
    }

    pub fn collection(
        &self,
        bucket: impl Into<String>,
        scope: impl Into<String>,
        name: impl Into<String>,
    ) -> Collection {
        Collection::new(
            Keyspace::new(bucket, scope, name),
            self.timeouts,
            self.transcoder.clone(),
            self.strategy.clone(),
            self.service.clone(),
            self.orchestrator.clone(),
            self.bulk.clone(),
        )
    }

    pub fn timeouts(&self) -> &TimeoutsConfig {
        &self.timeouts
    }

    pub fn orchestrator(&self) -> &RetryOrchestrator {
        &self.orchestrator
    }

    pub fn bulk_provider(&self) -> &Arc<KvBulkProvider> {
        &self.bulk
    }

    /// Run `send` through the retry orchestrator under the client's kv timeout.
    ///
    /// `strategy` falls back to the client's default strategy when `None`.
    pub async fn submit_retryable<T, F, Fut>(
        &self,
        operation: &str,
        idempotent: bool,
        parent_span: Option<RequestSpanContext>,
        strategy: Option<Arc<dyn RetryStrategy>>,
        send: F,
    ) -> Result<T>
    where
        F: FnMut(RequestContext) -> Fut,
        Fut: Future<Output = std::result::Result<T, TransportError>>,
    {
        self.submit_retryable_with_context(
            &RequestContext::background(),
            operation,
            idempotent,
            parent_span,
            strategy,
            send,
        )
        .await
    }

    /// Like [`submit_retryable`](Self::submit_retryable), but bound to `ctx`.
    ///
    /// The kv timeout narrows `ctx`'s deadline; cancelling `ctx` ends the
    /// request with [`KvError::RequestCanceled`](crate::KvError::RequestCanceled).
    pub async fn submit_retryable_with_context<T, F, Fut>(
        &self,
        ctx: &RequestContext,
        operation: &str,
        idempotent: bool,
        parent_span: Option<RequestSpanContext>,
        strategy: Option<Arc<dyn RetryStrategy>>,
        send: F,
    ) -> Result<T>
    where
        F: FnMut(RequestContext) -> Fut,
        Fut: Future<Output = std::result::Result<T, TransportError>>,
    {
        let ctx = ctx.with_timeout(self.timeouts.kv_timeout);
        let request = RetryableRequest::new(
            operation,
            idempotent,
            parent_span,
            strategy.or_else(|| self.strategy.clone()),
        );
        self.orchestrator.submit_retryable(&ctx, request, send).await
    }
}

impl std::fmt::Debug for KvClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvClient")
            .field("timeouts", &self.timeouts)
            .field("transcoder", &self.transcoder)
            .field("strategy", &self.strategy)
            .field("bulk", &self.bulk)
            .finish_non_exhaustive()
    }
}

/// Builder for [`KvClient`].
pub struct KvClientBuilder {
    service: Arc<dyn KvService>,
    classifier: Arc<dyn ErrorClassifier>,
    tracer: Arc<dyn RequestTracer>,
    meter: Arc<dyn Meter>,
    transcoder: Arc<dyn Transcoder>,
    strategy: Option<Arc<dyn RetryStrategy>>,
    config: ClientConfig,
}

impl KvClientBuilder {
    pub fn new(service: Arc<dyn KvService>) -> Self {
        Self {
            service,
            classifier: Arc::new(DefaultErrorClassifier),
            tracer: Arc::new(NoopTracer),
            meter: Arc::new(NoopMeter),
            transcoder: Arc::new(JsonTranscoder),
            strategy: Some(Arc::new(BestEffortRetryStrategy::default())),
            config: ClientConfig::default(),
        }
    }

    pub fn classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn tracer(mut self, tracer: Arc<dyn RequestTracer>) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn meter(mut self, meter: Arc<dyn Meter>) -> Self {
        self.meter = meter;
        self
    }

    pub fn transcoder(mut self, transcoder: Arc<dyn Transcoder>) -> Self {
        self.transcoder = transcoder;
        self
    }

    pub fn retry_strategy(mut self, strategy: Arc<dyn RetryStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Only always-retry reasons will be retried.
    pub fn without_retry_strategy(mut self) -> Self {
        self.strategy = None;
        self
    }

    pub fn timeouts(mut self, timeouts: TimeoutsConfig) -> Self {
        self.config.timeouts = timeouts;
        self
    }

    pub fn bulk(mut self, bulk: BulkConfig) -> Self {
        self.config.bulk = bulk;
        self
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<KvClient> {
        self.config.validate()?;

        let orchestrator = RetryOrchestrator::new(self.tracer.clone(), self.classifier.clone());
        let bulk = KvBulkProvider::new(
            self.service.clone(),
            self.classifier,
            self.tracer,
            self.meter,
        )
        .with_worker_count(self.config.bulk.worker_count);

        Ok(KvClient {
            service: self.service,
            transcoder: self.transcoder,
            strategy: self.strategy,
            timeouts: self.config.timeouts,
            orchestrator: Arc::new(orchestrator),
            bulk: Arc::new(bulk),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KvError;
    use crate::execution::*;
    use async_trait::async_trait;
    use std::time::Duration;

    struct Unreachable;

    fn down<T>() -> std::result::Result<T, TransportError> {
        Err(TransportError::new(StatusCode::Unavailable, "unreachable"))
    }

    #[async_trait]
    impl KvService for Unreachable {
        async fn get(
            &self,
            _: &RequestContext,
            _: GetRequest,
        ) -> std::result::Result<GetResponse, TransportError> {
            down()
        }

        async fn get_and_touch(
            &self,
            _: &RequestContext,
            _: GetAndTouchRequest,
        ) -> std::result::Result<GetResponse, TransportError> {
            down()
        }

        async fn touch(
            &self,
            _: &RequestContext,
            _: TouchRequest,
        ) -> std::result::Result<MutationResponse, TransportError> {
            down()
        }

        async fn remove(
            &self,
            _: &RequestContext,
            _: RemoveRequest,
        ) -> std::result::Result<MutationResponse, TransportError> {
            down()
        }

        async fn upsert(
            &self,
            _: &RequestContext,
            _: StoreRequest,
        ) -> std::result::Result<MutationResponse, TransportError> {
            down()
        }

        async fn insert(
            &self,
            _: &RequestContext,
            _: StoreRequest,
        ) -> std::result::Result<MutationResponse, TransportError> {
            down()
        }

        async fn replace(
            &self,
            _: &RequestContext,
            _: StoreRequest,
        ) -> std::result::Result<MutationResponse, TransportError> {
            down()
        }

        async fn append(
            &self,
            _: &RequestContext,
            _: AdjoinRequest,
        ) -> std::result::Result<MutationResponse, TransportError> {
            down()
        }

        async fn prepend(
            &self,
            _: &RequestContext,
            _: AdjoinRequest,
        ) -> std::result::Result<MutationResponse, TransportError> {
            down()
        }

        async fn increment(
            &self,
            _: &RequestContext,
            _: CounterRequest,
        ) -> std::result::Result<CounterResponse, TransportError> {
            down()
        }

        async fn decrement(
            &self,
            _: &RequestContext,
            _: CounterRequest,
        ) -> std::result::Result<CounterResponse, TransportError> {
            down()
        }
    }

    #[test]
    fn build_rejects_invalid_config() {
        let result = KvClient::builder(Arc::new(Unreachable))
            .bulk(BulkConfig::default().with_worker_count(0))
            .build();
        assert!(matches!(result, Err(KvError::Configuration(_))));
    }

    #[tokio::test]
    async fn unavailable_service_times_out_with_history() {
        let client = KvClient::builder(Arc::new(Unreachable))
            .timeouts(TimeoutsConfig::default().with_kv_timeout(Duration::from_millis(60)))
            .build()
            .unwrap();

        let err = client
            .collection("default", "_default", "_default")
            .get("missing")
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert!(err.retry_attempts() >= 1);
        assert!(!client.bulk_provider().is_started());
    }
}
