//! Bulk worker: executes one queued operation against the key-value service.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{Instrument, error, trace, warn};

use super::ops::BulkOp;
use super::results::{CounterResult, GetResult, MutationResult};
use crate::error::{ErrorClassifier, KvError, Result};
use crate::execution::{
    AdjoinRequest, CounterRequest, GetAndTouchRequest, GetRequest, Keyspace, KvService,
    RemoveRequest, StatusCode, StoreRequest, TouchRequest, TransportError,
};
use crate::observability::{METER_SERVICE_KV, Meter, RequestSpanContext, RequestTracer};
use crate::transcoder::Transcoder;
use crate::utils::cancel::{ContextError, RequestContext};

/// One operation queued for the worker pool.
pub(crate) struct BulkJob {
    pub index: usize,
    pub op: BulkOp,
    pub ctx: RequestContext,
    pub parent_span: RequestSpanContext,
    pub keyspace: Keyspace,
    pub transcoder: Arc<dyn Transcoder>,
    pub completions: mpsc::Sender<(usize, BulkOp)>,
}

/// Collaborators shared by every worker of a pool.
pub(crate) struct Worker {
    pub service: Arc<dyn KvService>,
    pub classifier: Arc<dyn ErrorClassifier>,
    pub tracer: Arc<dyn RequestTracer>,
    pub meter: Arc<dyn Meter>,
}

impl Worker {
    /// Serve jobs until the queue is closed.
    pub async fn run(self: Arc<Self>, queue: async_channel::Receiver<BulkJob>) {
        while let Ok(job) = queue.recv().await {
            self.execute(job).await;
        }
        trace!("bulk worker stopped");
    }

    async fn execute(&self, job: BulkJob) {
        let BulkJob {
            index,
            mut op,
            ctx,
            parent_span,
            keyspace,
            transcoder,
            completions,
        } = job;

        let name = op.name();
        let span = self.tracer.request_span(Some(&parent_span), name);
        span.set_attribute("db.operation", name);
        let span_ctx = span.context();
        let start = Instant::now();

        let meter = self.meter.clone();
        op.set_finish(Box::new(move || {
            span.end();
            meter.record_duration(METER_SERVICE_KV, name, start);
        }));

        let exec = Exec {
            worker: self,
            ctx: &ctx,
            span: &span_ctx,
            keyspace: &keyspace,
            transcoder: &transcoder,
        };
        // A panicking service call fails its op; the worker keeps serving.
        let outcome = AssertUnwindSafe(exec.run(&mut op).instrument(span_ctx.span().clone()))
            .catch_unwind()
            .await;
        if let Err(panic) = outcome {
            let message = panic_message(panic.as_ref());
            error!(index, operation = name, panic = %message, "bulk operation panicked");
            op.fail(KvError::Internal(format!("bulk operation panicked: {message}")));
        }

        // Sized to the batch, so this only fails if the submitter is gone.
        if completions.try_send((index, op)).is_err() {
            warn!(index, operation = name, "bulk completion was dropped");
        }
    }
}

struct Exec<'a> {
    worker: &'a Worker,
    ctx: &'a RequestContext,
    span: &'a RequestSpanContext,
    keyspace: &'a Keyspace,
    transcoder: &'a Arc<dyn Transcoder>,
}

impl Exec<'_> {
    async fn run(&self, op: &mut BulkOp) {
        let service = &self.worker.service;
        let ctx = self.ctx;

        match op {
            BulkOp::Get(op) => {
                let request = GetRequest {
                    keyspace: self.keyspace.clone(),
                    key: op.id.clone(),
                };
                match self.call(service.get(ctx, request)).await {
                    Ok(response) => {
                        op.result = Some(GetResult::from_response(
                            response,
                            self.transcoder.clone(),
                        ))
                    }
                    Err(err) => op.err = Some(self.worker.classifier.map_error(err, true)),
                }
            }
            BulkOp::GetAndTouch(op) => {
                let request = GetAndTouchRequest {
                    keyspace: self.keyspace.clone(),
                    key: op.id.clone(),
                    expiry_secs: whole_secs(op.expiry),
                };
                match self.call(service.get_and_touch(ctx, request)).await {
                    Ok(response) => {
                        op.result = Some(GetResult::from_response(
                            response,
                            self.transcoder.clone(),
                        ))
                    }
                    Err(err) => op.err = Some(self.map_error(err)),
                }
            }
            BulkOp::Touch(op) => {
                let request = TouchRequest {
                    keyspace: self.keyspace.clone(),
                    key: op.id.clone(),
                    expiry_secs: whole_secs(op.expiry),
                };
                match self.call(service.touch(ctx, request)).await {
                    Ok(response) => op.result = Some(MutationResult::from(response)),
                    Err(err) => op.err = Some(self.map_error(err)),
                }
            }
            BulkOp::Remove(op) => {
                let request = RemoveRequest {
                    keyspace: self.keyspace.clone(),
                    key: op.id.clone(),
                    cas: op.cas.to_wire(),
                };
                match self.call(service.remove(ctx, request)).await {
                    Ok(response) => op.result = Some(MutationResult::from(response)),
                    Err(err) => op.err = Some(self.map_error(err)),
                }
            }
            BulkOp::Upsert(op) => {
                let request = match self.store_request(&op.id, &op.value, op.expiry, None) {
                    Ok(request) => request,
                    Err(err) => {
                        op.err = Some(err);
                        return;
                    }
                };
                match self.call(service.upsert(ctx, request)).await {
                    Ok(response) => op.result = Some(MutationResult::from(response)),
                    Err(err) => op.err = Some(self.map_error(err)),
                }
            }
            BulkOp::Insert(op) => {
                let request = match self.store_request(&op.id, &op.value, op.expiry, None) {
                    Ok(request) => request,
                    Err(err) => {
                        op.err = Some(err);
                        return;
                    }
                };
                match self.call(service.insert(ctx, request)).await {
                    Ok(response) => op.result = Some(MutationResult::from(response)),
                    Err(err) => op.err = Some(self.map_error(err)),
                }
            }
            BulkOp::Replace(op) => {
                let cas = op.cas.to_wire();
                let request = match self.store_request(&op.id, &op.value, op.expiry, cas) {
                    Ok(request) => request,
                    Err(err) => {
                        op.err = Some(err);
                        return;
                    }
                };
                match self.call(service.replace(ctx, request)).await {
                    Ok(response) => op.result = Some(MutationResult::from(response)),
                    Err(err) => op.err = Some(self.map_error(err)),
                }
            }
            BulkOp::Append(op) => {
                let request = AdjoinRequest {
                    keyspace: self.keyspace.clone(),
                    key: op.id.clone(),
                    content: op.value.clone(),
                };
                match self.call(service.append(ctx, request)).await {
                    Ok(response) => op.result = Some(MutationResult::from(response)),
                    Err(err) => op.err = Some(self.map_error(err)),
                }
            }
            BulkOp::Prepend(op) => {
                let request = AdjoinRequest {
                    keyspace: self.keyspace.clone(),
                    key: op.id.clone(),
                    content: op.value.clone(),
                };
                match self.call(service.prepend(ctx, request)).await {
                    Ok(response) => op.result = Some(MutationResult::from(response)),
                    Err(err) => op.err = Some(self.map_error(err)),
                }
            }
            BulkOp::Increment(op) => {
                let request = CounterRequest {
                    keyspace: self.keyspace.clone(),
                    key: op.id.clone(),
                    delta: op.delta,
                    initial: op.initial,
                    expiry_secs: positive_secs(op.expiry),
                };
                match self.call(service.increment(ctx, request)).await {
                    Ok(response) => op.result = Some(CounterResult::from(response)),
                    Err(err) => op.err = Some(self.map_error(err)),
                }
            }
            BulkOp::Decrement(op) => {
                let request = CounterRequest {
                    keyspace: self.keyspace.clone(),
                    key: op.id.clone(),
                    delta: op.delta,
                    initial: op.initial,
                    expiry_secs: positive_secs(op.expiry),
                };
                match self.call(service.decrement(ctx, request)).await {
                    Ok(response) => op.result = Some(CounterResult::from(response)),
                    Err(err) => op.err = Some(self.map_error(err)),
                }
            }
        }
    }

    /// Race a service call against the batch context.
    async fn call<T>(
        &self,
        fut: impl Future<Output = std::result::Result<T, TransportError>>,
    ) -> std::result::Result<T, TransportError> {
        tokio::select! {
            biased;
            reason = self.ctx.done() => Err(match reason {
                ContextError::DeadlineExceeded => {
                    TransportError::new(StatusCode::DeadlineExceeded, reason.to_string())
                }
                ContextError::Cancelled => {
                    TransportError::new(StatusCode::Cancelled, reason.to_string())
                }
            }),
            res = fut => res,
        }
    }

    // Only plain gets are safe to treat as idempotent.
    fn map_error(&self, err: TransportError) -> KvError {
        self.worker.classifier.map_error(err, false)
    }

    fn store_request(
        &self,
        id: &str,
        value: &Value,
        expiry: Duration,
        cas: Option<u64>,
    ) -> Result<StoreRequest> {
        let (content, content_flags) = self.encode(value)?;
        Ok(StoreRequest {
            keyspace: self.keyspace.clone(),
            key: id.to_string(),
            content,
            content_flags,
            expiry_secs: positive_secs(expiry),
            cas,
        })
    }

    fn encode(&self, value: &Value) -> Result<(Vec<u8>, u32)> {
        let span = self
            .worker
            .tracer
            .request_span(Some(self.span), "request_encoding");
        let encoded = self.transcoder.encode(value);
        span.end();
        encoded
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn whole_secs(expiry: Duration) -> u32 {
    u32::try_from(expiry.as_secs()).unwrap_or(u32::MAX)
}

/// Expiry is only sent when set.
fn positive_secs(expiry: Duration) -> Option<u32> {
    (!expiry.is_zero()).then(|| whole_secs(expiry))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_only_sent_when_set() {
        assert_eq!(positive_secs(Duration::ZERO), None);
        assert_eq!(positive_secs(Duration::from_secs(30)), Some(30));
        assert_eq!(whole_secs(Duration::from_millis(1500)), 1);
    }

    #[test]
    fn panic_payloads_become_messages() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn std::any::Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
