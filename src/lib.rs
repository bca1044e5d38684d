//! # kvreliable - Reliability layer for key-value database clients
//!
//! kvreliable sits between application calls and an injectable key-value
//! transport. It decides whether failed requests are retried and when, and it
//! executes batches of operations through a shared pool of workers.
//!
//! ## Features
//!
//! - **Retry Orchestration**: closed set of retry reasons, pluggable retry strategies, bounded backoff.
//! - **Bulk Dispatch**: lazily started worker pool, backpressured submission, per-item results.
//! - **Cancellation**: every request runs under a deadline-bound, cancellable [`RequestContext`](utils::RequestContext).
//! - **Pluggable Seams**: transport, error classification, tracing, metering and transcoding are traits.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use kvreliable::prelude::*;
//! use serde_json::json;
//!
//! # async fn example(service: Arc<dyn KvService>) -> Result<(), KvError> {
//! let client = KvClient::builder(service).build()?;
//! let collection = client.collection("travel", "inventory", "hotels");
//!
//! let ops = vec![
//!     UpsertOp::new("hotel_1", json!({"name": "Grand"})).into(),
//!     GetOp::new("hotel_2").into(),
//! ];
//! for op in collection.do_bulk(ops, BulkOpOptions::default()).await? {
//!     if let Some(err) = op.err() {
//!         println!("{} failed: {err}", op.id());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod bulk;
pub mod client;
pub mod collection;
pub mod config;
pub mod error;
pub mod execution;
pub mod observability;
pub mod retry;
pub mod retry_api;
pub mod transcoder;
pub mod utils;

pub use client::{KvClient, KvClientBuilder};
pub use collection::Collection;
pub use error::{KvError, Result};

pub mod prelude {
    pub use crate::bulk::*;
    pub use crate::client::{KvClient, KvClientBuilder};
    pub use crate::collection::Collection;
    pub use crate::config::{BulkConfig, ClientConfig, TimeoutsConfig};
    pub use crate::error::{DefaultErrorClassifier, ErrorClassifier, ErrorContext, KvError};
    pub use crate::execution::{KvService, StatusCode, TransportError};
    pub use crate::observability::{Meter, RequestSpanContext, RequestTracer};
    pub use crate::retry::{
        BestEffortRetryStrategy, FailFastRetryStrategy, RetryAction, RetryReason, RetryRequest,
        RetryStrategy,
    };
    pub use crate::retry_api::RetryOrchestrator;
    pub use crate::transcoder::{JsonTranscoder, RawStringTranscoder, Transcoder};
    pub use crate::utils::RequestContext;
}
