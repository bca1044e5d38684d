//! Retry reasons
//!
//! A [`RetryReason`] explains *why* an operation failed in a way that is relevant
//! to retrying it. The set is closed: every reason the client can observe is a
//! variant here, each with fixed metadata.

use serde::{Serialize, Serializer};
use std::fmt;

/// The reason for an operation possibly being retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryReason {
    /// The operation failed for an unknown reason.
    Unknown,
    /// The underlying socket was not available.
    SocketNotAvailable,
    /// The requested service was not available.
    ServiceNotAvailable,
    /// The requested node was not available.
    NodeNotAvailable,
    /// The operation was sent to the wrong node for the vbucket.
    KvNotMyVBucket,
    /// The collection id on the request is outdated.
    KvCollectionOutdated,
    /// Unsupported failure, but the KV error map indicated that it can be retried.
    KvErrMap,
    /// The document was locked.
    KvLocked,
    /// The server reported a temporary failure.
    KvTemporaryFailure,
    /// A sync write is in progress on the document.
    KvSyncWriteInProgress,
    /// A sync write re-commit is in progress on the document.
    KvSyncWriteRecommitInProgress,
    /// The service responded stating that the request should be retried.
    ServiceResponseCodeIndicated,
    /// The socket was closed whilst the operation was in flight.
    SocketCloseInFlight,
    /// The client-side pipeline is saturated and cannot accept the request yet.
    PipelineOverloaded,
    /// The circuit breaker on the connection was open.
    CircuitBreakerOpen,
    /// A query index was missing.
    QueryIndexNotFound,
    /// A prepared statement failed.
    QueryPreparedStatementFailure,
    /// The query engine indicated that the error is retryable.
    QueryErrorRetryable,
    /// An analytics operation failed due to a temporary failure.
    AnalyticsTemporaryFailure,
    /// A search operation failed due to too many requests.
    SearchTooManyRequests,
    /// Connections are not set up and ready to be used yet.
    NotReady,
}

impl RetryReason {
    /// Every reason, in declaration order.
    pub const ALL: [RetryReason; 21] = [
        Self::Unknown,
        Self::SocketNotAvailable,
        Self::ServiceNotAvailable,
        Self::NodeNotAvailable,
        Self::KvNotMyVBucket,
        Self::KvCollectionOutdated,
        Self::KvErrMap,
        Self::KvLocked,
        Self::KvTemporaryFailure,
        Self::KvSyncWriteInProgress,
        Self::KvSyncWriteRecommitInProgress,
        Self::ServiceResponseCodeIndicated,
        Self::SocketCloseInFlight,
        Self::PipelineOverloaded,
        Self::CircuitBreakerOpen,
        Self::QueryIndexNotFound,
        Self::QueryPreparedStatementFailure,
        Self::QueryErrorRetryable,
        Self::AnalyticsTemporaryFailure,
        Self::SearchTooManyRequests,
        Self::NotReady,
    ];

    /// Human readable, stable name of the reason.
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::SocketNotAvailable => "SOCKET_NOT_AVAILABLE",
            Self::ServiceNotAvailable => "SERVICE_NOT_AVAILABLE",
            Self::NodeNotAvailable => "NODE_NOT_AVAILABLE",
            Self::KvNotMyVBucket => "KV_NOT_MY_VBUCKET",
            Self::KvCollectionOutdated => "KV_COLLECTION_OUTDATED",
            Self::KvErrMap => "KV_ERROR_MAP_RETRY_INDICATED",
            Self::KvLocked => "KV_LOCKED",
            Self::KvTemporaryFailure => "KV_TEMPORARY_FAILURE",
            Self::KvSyncWriteInProgress => "KV_SYNC_WRITE_IN_PROGRESS",
            Self::KvSyncWriteRecommitInProgress => "KV_SYNC_WRITE_RE_COMMIT_IN_PROGRESS",
            Self::ServiceResponseCodeIndicated => "SERVICE_RESPONSE_CODE_INDICATED",
            Self::SocketCloseInFlight => "SOCKET_CLOSED_WHILE_IN_FLIGHT",
            Self::PipelineOverloaded => "PIPELINE_OVERLOADED",
            Self::CircuitBreakerOpen => "CIRCUIT_BREAKER_OPEN",
            Self::QueryIndexNotFound => "QUERY_INDEX_NOT_FOUND",
            Self::QueryPreparedStatementFailure => "QUERY_PREPARED_STATEMENT_FAILURE",
            Self::QueryErrorRetryable => "QUERY_ERROR_RETRYABLE",
            Self::AnalyticsTemporaryFailure => "ANALYTICS_TEMPORARY_FAILURE",
            Self::SearchTooManyRequests => "SEARCH_TOO_MANY_REQUESTS",
            Self::NotReady => "NOT_READY",
        }
    }

    /// Whether retrying is safe even when the operation is not known to be idempotent.
    pub const fn allows_non_idempotent_retry(&self) -> bool {
        matches!(
            self,
            Self::SocketNotAvailable
                | Self::ServiceNotAvailable
                | Self::NodeNotAvailable
                | Self::KvNotMyVBucket
                | Self::KvCollectionOutdated
                | Self::PipelineOverloaded
                | Self::QueryIndexNotFound
                | Self::QueryPreparedStatementFailure
                | Self::QueryErrorRetryable
                | Self::AnalyticsTemporaryFailure
                | Self::SearchTooManyRequests
                | Self::NotReady
        )
    }

    /// Whether the failure is transient and infrastructural: retried regardless of
    /// the configured strategy or the idempotency of the operation.
    pub const fn always_retry(&self) -> bool {
        matches!(
            self,
            Self::KvNotMyVBucket
                | Self::KvCollectionOutdated
                | Self::PipelineOverloaded
                | Self::NotReady
        )
    }
}

impl fmt::Display for RetryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl Serialize for RetryReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.description())
    }
}
