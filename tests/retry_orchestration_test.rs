use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use kvreliable::error::{DefaultErrorClassifier, ErrorClassifier, KvError};
use kvreliable::execution::{StatusCode, TransportError};
use kvreliable::observability::{NoopTracer, TracingRequestTracer};
use kvreliable::prelude::*;
use kvreliable::retry::RetryableRequest;
use serde_json::json;

mod support;
use support::MockKv;

/// Retries after a fixed, long delay.
#[derive(Debug)]
struct SlowRetryStrategy;

impl RetryStrategy for SlowRetryStrategy {
    fn retry_after(&self, _: &dyn RetryRequest, _: RetryReason) -> RetryAction {
        RetryAction::WithDuration(Duration::from_secs(10))
    }
}

/// Reports every unavailable service as a topology change.
struct TopologyClassifier;

impl ErrorClassifier for TopologyClassifier {
    fn map_error(&self, err: TransportError, idempotent: bool) -> KvError {
        DefaultErrorClassifier.map_error(err, idempotent)
    }

    fn retry_reason(&self, err: &KvError) -> Option<RetryReason> {
        match err.root() {
            KvError::ServiceNotAvailable => Some(RetryReason::KvNotMyVBucket),
            other => DefaultErrorClassifier.retry_reason(other),
        }
    }
}

fn client(kv: Arc<MockKv>) -> KvClient {
    KvClient::builder(kv)
        .timeouts(TimeoutsConfig::default().with_kv_timeout(Duration::from_secs(2)))
        .build()
        .unwrap()
}

#[tokio::test]
async fn locked_document_stops_non_idempotent_retries() {
    let kv = Arc::new(MockKv::new().fail(
        "doc",
        [
            StatusCode::Unavailable,
            StatusCode::Unavailable,
            StatusCode::FailedPrecondition,
        ],
    ));
    let collection = client(kv.clone()).collection("default", "_default", "_default");

    let err = collection
        .upsert("doc", &json!({"v": 1}), Duration::ZERO)
        .await
        .unwrap_err();

    assert!(matches!(err, KvError::Failed { .. }));
    assert!(matches!(err.root(), KvError::DocumentLocked));
    assert_eq!(err.retry_attempts(), 2);
    assert_eq!(err.retry_reasons(), &[RetryReason::ServiceNotAvailable]);
    assert_eq!(kv.call_count("upsert"), 3);
    assert!(err.to_string().starts_with("document locked | {"));
}

#[tokio::test]
async fn idempotent_get_retries_until_success() {
    let kv = Arc::new(MockKv::new().fail(
        "doc",
        [StatusCode::ResourceExhausted, StatusCode::FailedPrecondition],
    ));
    let collection = client(kv.clone()).collection("default", "_default", "_default");

    let result = collection.get("doc").await.unwrap();
    let body: serde_json::Value = result.content_as().unwrap();

    assert_eq!(body, json!({"id": "doc"}));
    assert_eq!(kv.call_count("get"), 3);
}

#[tokio::test]
async fn times_out_while_waiting_to_retry() {
    let kv = Arc::new(MockKv::new().fail("doc", [StatusCode::Unavailable]));
    let client = KvClient::builder(kv.clone())
        .retry_strategy(Arc::new(SlowRetryStrategy))
        .timeouts(TimeoutsConfig::default().with_kv_timeout(Duration::from_millis(50)))
        .build()
        .unwrap();

    let started = std::time::Instant::now();
    let err = client
        .collection("default", "_default", "_default")
        .get("doc")
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(matches!(err, KvError::Timeout { .. }));
    assert!(matches!(err.root(), KvError::UnambiguousTimeout));
    assert_eq!(err.retry_attempts(), 1);
    assert_eq!(err.retry_reasons(), &[RetryReason::ServiceNotAvailable]);
    assert_eq!(kv.call_count("get"), 1);
}

#[tokio::test]
async fn cancellation_while_waiting_to_retry_is_plain() {
    let orchestrator =
        RetryOrchestrator::new(Arc::new(NoopTracer), Arc::new(DefaultErrorClassifier));
    let ctx = RequestContext::background().with_timeout(Duration::from_secs(30));
    let request = RetryableRequest::new(
        "get",
        true,
        None,
        Some(Arc::new(SlowRetryStrategy) as Arc<dyn RetryStrategy>),
    );

    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        canceller.cancel();
    });

    let calls = AtomicU32::new(0);
    let err = orchestrator
        .submit_retryable(&ctx, request, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(TransportError::new(StatusCode::Unavailable, "down")) }
        })
        .await
        .unwrap_err();

    assert!(matches!(err, KvError::RequestCanceled));
    assert!(err.context().is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn always_retry_reasons_ignore_fail_fast_strategy() {
    let kv = Arc::new(MockKv::new().fail(
        "doc",
        [
            StatusCode::Unavailable,
            StatusCode::Unavailable,
            StatusCode::Unavailable,
        ],
    ));
    let client = KvClient::builder(kv.clone())
        .classifier(Arc::new(TopologyClassifier))
        .retry_strategy(Arc::new(FailFastRetryStrategy))
        .build()
        .unwrap();

    // Non-idempotent, yet still retried.
    let result = client
        .collection("default", "_default", "_default")
        .remove("doc", Default::default())
        .await
        .unwrap();

    assert_eq!(result.cas.0, 200);
    assert_eq!(kv.call_count("remove"), 4);
}

#[tokio::test]
async fn fail_fast_reports_first_failure() {
    let kv = Arc::new(MockKv::new().fail("doc", [StatusCode::ResourceExhausted]));
    let client = KvClient::builder(kv.clone())
        .retry_strategy(Arc::new(FailFastRetryStrategy))
        .build()
        .unwrap();

    let err = client
        .collection("default", "_default", "_default")
        .get("doc")
        .await
        .unwrap_err();

    assert!(matches!(err.root(), KvError::TemporaryFailure));
    assert_eq!(err.retry_attempts(), 0);
    assert_eq!(kv.call_count("get"), 1);
}

#[tokio::test]
async fn client_submit_retryable_uses_default_strategy() {
    let kv = Arc::new(MockKv::new());
    let client = KvClient::builder(kv)
        .tracer(Arc::new(TracingRequestTracer))
        .build()
        .unwrap();

    let calls = AtomicU32::new(0);
    let value = client
        .submit_retryable("lookup_in", true, None, None, |_ctx| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(TransportError::new(StatusCode::Unavailable, "warming up"))
                } else {
                    Ok("ready")
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(value, "ready");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// Retries after a delay too long to represent on the clock.
#[derive(Debug)]
struct EndlessRetryStrategy;

impl RetryStrategy for EndlessRetryStrategy {
    fn retry_after(&self, _: &dyn RetryRequest, _: RetryReason) -> RetryAction {
        RetryAction::WithDuration(Duration::MAX)
    }
}

#[tokio::test]
async fn unbounded_backoff_still_ends_at_deadline() {
    let kv = Arc::new(MockKv::new().fail("doc", [StatusCode::ResourceExhausted]));
    let client = KvClient::builder(kv.clone())
        .retry_strategy(Arc::new(EndlessRetryStrategy))
        .timeouts(TimeoutsConfig::default().with_kv_timeout(Duration::from_millis(50)))
        .build()
        .unwrap();

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        client
            .collection("default", "_default", "_default")
            .get("doc"),
    )
    .await
    .expect("retry wait was not pre-empted by the deadline")
    .unwrap_err();

    assert!(matches!(err, KvError::Timeout { .. }));
    assert!(matches!(err.root(), KvError::UnambiguousTimeout));
    assert_eq!(err.retry_attempts(), 1);
    assert_eq!(kv.call_count("get"), 1);
}

#[tokio::test]
async fn collection_context_cancels_single_document_requests() {
    let kv = Arc::new(MockKv::new().with_delay(Duration::from_secs(30)));
    let collection = client(kv.clone()).collection("default", "_default", "_default");

    let ctx = RequestContext::background();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        canceller.cancel();
    });

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        collection.with_context(ctx).get("doc"),
    )
    .await
    .expect("cancel did not end the request")
    .unwrap_err();

    assert!(matches!(err, KvError::RequestCanceled));
    assert_eq!(kv.call_count("get"), 1);
}

#[tokio::test]
async fn client_submit_retryable_honours_caller_context() {
    let client = client(Arc::new(MockKv::new()));
    let ctx = RequestContext::background();
    ctx.cancel();

    let calls = AtomicU32::new(0);
    let err = client
        .submit_retryable_with_context(&ctx, "lookup_in", true, None, None, |_ctx| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok::<_, TransportError>(())
            }
        })
        .await
        .unwrap_err();

    assert!(matches!(err, KvError::RequestCanceled));
    assert!(err.context().is_none());
}
