//! Key-value transport abstraction.
//!
//! The client never talks to the network itself. Every remote call goes through
//! an injectable [`KvService`], which receives protocol-level requests and
//! returns protocol-level responses or a raw [`TransportError`].

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

use crate::utils::cancel::RequestContext;

/// Status codes reported by the transport for a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
            Self::InvalidArgument => "invalid_argument",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::NotFound => "not_found",
            Self::AlreadyExists => "already_exists",
            Self::PermissionDenied => "permission_denied",
            Self::ResourceExhausted => "resource_exhausted",
            Self::FailedPrecondition => "failed_precondition",
            Self::Aborted => "aborted",
            Self::OutOfRange => "out_of_range",
            Self::Unimplemented => "unimplemented",
            Self::Internal => "internal",
            Self::Unavailable => "unavailable",
            Self::DataLoss => "data_loss",
            Self::Unauthenticated => "unauthenticated",
        };
        f.write_str(name)
    }
}

/// Raw failure returned by a [`KvService`] call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct TransportError {
    pub code: StatusCode,
    pub message: String,
}

impl TransportError {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Bucket, scope and collection a request is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Keyspace {
    pub bucket_name: String,
    pub scope_name: String,
    pub collection_name: String,
}

impl Keyspace {
    pub fn new(
        bucket_name: impl Into<String>,
        scope_name: impl Into<String>,
        collection_name: impl Into<String>,
    ) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            scope_name: scope_name.into(),
            collection_name: collection_name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetRequest {
    pub keyspace: Keyspace,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetAndTouchRequest {
    pub keyspace: Keyspace,
    pub key: String,
    pub expiry_secs: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TouchRequest {
    pub keyspace: Keyspace,
    pub key: String,
    pub expiry_secs: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveRequest {
    pub keyspace: Keyspace,
    pub key: String,
    pub cas: Option<u64>,
}

/// Full document write (upsert, insert, replace).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRequest {
    pub keyspace: Keyspace,
    pub key: String,
    pub content: Vec<u8>,
    pub content_flags: u32,
    pub expiry_secs: Option<u32>,
    /// Only honoured by replace.
    pub cas: Option<u64>,
}

/// Raw byte append or prepend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjoinRequest {
    pub keyspace: Keyspace,
    pub key: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterRequest {
    pub keyspace: Keyspace,
    pub key: String,
    pub delta: u64,
    pub initial: Option<u64>,
    pub expiry_secs: Option<u32>,
}

/// Document body as sent by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentContent {
    Uncompressed(Vec<u8>),
    Compressed(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetResponse {
    pub content: DocumentContent,
    pub content_flags: u32,
    pub cas: u64,
}

/// Mutation token as reported on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireMutationToken {
    pub bucket_name: String,
    pub vbucket_id: u16,
    pub vbucket_uuid: u64,
    pub seq_no: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationResponse {
    pub cas: u64,
    pub mutation_token: Option<WireMutationToken>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterResponse {
    pub cas: u64,
    pub content: u64,
    pub mutation_token: Option<WireMutationToken>,
}

/// Remote key-value service.
///
/// Implementations should observe `ctx` for cancellation; callers additionally
/// race every call against the context, so a transport that ignores it still
/// cannot outlive the request's deadline from the caller's perspective.
#[async_trait]
pub trait KvService: Send + Sync {
    async fn get(&self, ctx: &RequestContext, request: GetRequest)
    -> Result<GetResponse, TransportError>;

    async fn get_and_touch(
        &self,
        ctx: &RequestContext,
        request: GetAndTouchRequest,
    ) -> Result<GetResponse, TransportError>;

    async fn touch(
        &self,
        ctx: &RequestContext,
        request: TouchRequest,
    ) -> Result<MutationResponse, TransportError>;

    async fn remove(
        &self,
        ctx: &RequestContext,
        request: RemoveRequest,
    ) -> Result<MutationResponse, TransportError>;

    async fn upsert(
        &self,
        ctx: &RequestContext,
        request: StoreRequest,
    ) -> Result<MutationResponse, TransportError>;

    async fn insert(
        &self,
        ctx: &RequestContext,
        request: StoreRequest,
    ) -> Result<MutationResponse, TransportError>;

    async fn replace(
        &self,
        ctx: &RequestContext,
        request: StoreRequest,
    ) -> Result<MutationResponse, TransportError>;

    async fn append(
        &self,
        ctx: &RequestContext,
        request: AdjoinRequest,
    ) -> Result<MutationResponse, TransportError>;

    async fn prepend(
        &self,
        ctx: &RequestContext,
        request: AdjoinRequest,
    ) -> Result<MutationResponse, TransportError>;

    async fn increment(
        &self,
        ctx: &RequestContext,
        request: CounterRequest,
    ) -> Result<CounterResponse, TransportError>;

    async fn decrement(
        &self,
        ctx: &RequestContext,
        request: CounterRequest,
    ) -> Result<CounterResponse, TransportError>;
}
