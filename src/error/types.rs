//! Core error types.

use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::execution::StatusCode;
use crate::retry::RetryReason;

/// Errors surfaced by the key-value client.
#[derive(Error, Debug, Clone)]
pub enum KvError {
    #[error("document not found")]
    DocumentNotFound,

    #[error("document exists")]
    DocumentExists,

    #[error("document locked")]
    DocumentLocked,

    #[error("cas mismatch")]
    CasMismatch,

    #[error("temporary failure")]
    TemporaryFailure,

    #[error("service not available")]
    ServiceNotAvailable,

    #[error("value too large")]
    ValueTooLarge,

    #[error("authentication failure")]
    AuthenticationFailure,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation timed out and is known not to have had any effect.
    #[error("unambiguous timeout")]
    UnambiguousTimeout,

    /// The operation timed out and may or may not have been applied.
    #[error("ambiguous timeout")]
    AmbiguousTimeout,

    #[error("request canceled")]
    RequestCanceled,

    #[error("encoding failure: {0}")]
    Encoding(String),

    #[error("decoding failure: {0}")]
    Decoding(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),

    /// A transport failure with no more specific mapping.
    #[error("transport error ({code}): {message}")]
    Transport { code: StatusCode, message: String },

    /// The request ran out of time, during dispatch or while waiting to retry.
    #[error("{inner} | {context}")]
    Timeout {
        #[source]
        inner: Box<KvError>,
        context: ErrorContext,
    },

    /// The request failed and will not be retried.
    #[error("{inner} | {context}")]
    Failed {
        #[source]
        inner: Box<KvError>,
        context: ErrorContext,
    },
}

static_assertions::assert_impl_all!(KvError: Send, Sync, Clone);

impl KvError {
    /// The innermost error, with retry context stripped.
    pub fn root(&self) -> &KvError {
        match self {
            Self::Timeout { inner, .. } | Self::Failed { inner, .. } => inner.root(),
            other => other,
        }
    }

    /// Retry history, if the error came out of the retry orchestrator.
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Self::Timeout { context, .. } | Self::Failed { context, .. } => Some(context),
            _ => None,
        }
    }

    pub fn retry_attempts(&self) -> u32 {
        self.context().map_or(0, |c| c.retry_attempts)
    }

    pub fn retry_reasons(&self) -> &[RetryReason] {
        match self.context() {
            Some(context) => &context.retry_reasons,
            None => &[],
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::UnambiguousTimeout | Self::AmbiguousTimeout
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), Self::RequestCanceled)
    }
}

/// Diagnostic details attached to user-visible request failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorContext {
    #[serde(rename = "operation_id")]
    pub operation: String,
    pub opaque: String,
    #[serde(rename = "time_observed_us", serialize_with = "serialize_micros")]
    pub time_observed: Duration,
    pub retry_reasons: Vec<RetryReason>,
    pub retry_attempts: u32,
}

fn serialize_micros<S: Serializer>(
    d: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(d.as_micros()).unwrap_or(u64::MAX))
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, KvError>;
