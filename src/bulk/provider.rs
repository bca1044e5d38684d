//! Bulk dispatch provider.
//!
//! Owns a lazily started pool of long-lived workers fed from one shared queue.
//! A batch is pushed through the queue item by item and then drained from a
//! completion channel sized to the batch, so workers never block on reporting.

use std::sync::{Arc, OnceLock};

use tokio::sync::mpsc;
use tracing::{info, trace};

use super::ops::{BulkOp, BulkOpOptions};
use super::worker::{BulkJob, Worker};
use crate::collection::Collection;
use crate::config::DEFAULT_BULK_WORKER_COUNT;
use crate::error::{ErrorClassifier, KvError, Result};
use crate::execution::KvService;
use crate::observability::{Meter, RequestTracer};

pub struct KvBulkProvider {
    service: Arc<dyn KvService>,
    classifier: Arc<dyn ErrorClassifier>,
    tracer: Arc<dyn RequestTracer>,
    meter: Arc<dyn Meter>,
    worker_count: usize,
    queue: OnceLock<async_channel::Sender<BulkJob>>,
}

impl KvBulkProvider {
    pub fn new(
        service: Arc<dyn KvService>,
        classifier: Arc<dyn ErrorClassifier>,
        tracer: Arc<dyn RequestTracer>,
        meter: Arc<dyn Meter>,
    ) -> Self {
        Self {
            service,
            classifier,
            tracer,
            meter,
            worker_count: DEFAULT_BULK_WORKER_COUNT,
            queue: OnceLock::new(),
        }
    }

    /// Number of workers to start. Has no effect once the pool is running.
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count.max(1);
        self
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Whether the worker pool has been started.
    pub fn is_started(&self) -> bool {
        self.queue.get().is_some()
    }

    /// Start the pool on first use. Must be called from within a tokio runtime.
    fn queue(&self) -> &async_channel::Sender<BulkJob> {
        self.queue.get_or_init(|| {
            // Capacity 1: submitters block until a worker picks the job up.
            let (tx, rx) = async_channel::bounded(1);
            let worker = Arc::new(Worker {
                service: self.service.clone(),
                classifier: self.classifier.clone(),
                tracer: self.tracer.clone(),
                meter: self.meter.clone(),
            });
            for _ in 0..self.worker_count {
                tokio::spawn(worker.clone().run(rx.clone()));
            }
            info!(workers = self.worker_count, "started bulk worker pool");
            tx
        })
    }

    /// Execute a batch, returning the operations in submission order.
    ///
    /// Per-operation failures are stored on each op. An `Err` is only returned
    /// when the pool itself is unusable.
    pub async fn dispatch(
        &self,
        collection: &Collection,
        ops: Vec<BulkOp>,
        opts: BulkOpOptions,
    ) -> Result<Vec<BulkOp>> {
        if ops.is_empty() {
            return Ok(ops);
        }
        let count = ops.len();

        let timeout = opts.timeout.unwrap_or_else(|| {
            collection
                .timeouts()
                .kv_timeout
                .saturating_mul(u32::try_from(count).unwrap_or(u32::MAX))
        });
        let ctx = opts.context.unwrap_or_default().with_timeout(timeout);
        let transcoder = opts
            .transcoder
            .unwrap_or_else(|| collection.transcoder().clone());

        let bulk_span = self.tracer.request_span(opts.parent_span.as_ref(), "bulk");
        let parent_span = bulk_span.context();

        trace!(count, timeout = ?timeout, "dispatching bulk operations");

        let (completions, mut drained) = mpsc::channel(count);
        let queue = self.queue();
        for (index, op) in ops.into_iter().enumerate() {
            let job = BulkJob {
                index,
                op,
                ctx: ctx.clone(),
                parent_span: parent_span.clone(),
                keyspace: collection.keyspace().clone(),
                transcoder: transcoder.clone(),
                completions: completions.clone(),
            };
            if queue.send(job).await.is_err() {
                bulk_span.end();
                return Err(KvError::Internal(
                    "bulk dispatch queue is closed".to_string(),
                ));
            }
        }
        drop(completions);

        let mut slots: Vec<Option<BulkOp>> = (0..count).map(|_| None).collect();
        let mut received = 0;
        while received < count {
            let Some((index, mut op)) = drained.recv().await else {
                break;
            };
            op.finish();
            if let Some(slot) = slots.get_mut(index) {
                *slot = Some(op);
            }
            received += 1;
        }

        ctx.cancel();
        bulk_span.end();

        let ops: Vec<BulkOp> = slots.into_iter().flatten().collect();
        if ops.len() != count {
            return Err(KvError::Internal(format!(
                "bulk dispatch lost {} of {count} operations",
                count - ops.len()
            )));
        }
        Ok(ops)
    }
}

impl std::fmt::Debug for KvBulkProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvBulkProvider")
            .field("worker_count", &self.worker_count)
            .field("started", &self.is_started())
            .finish()
    }
}
