//! Mapping of raw transport failures onto client errors and retry reasons.

use crate::error::KvError;
use crate::execution::{StatusCode, TransportError};
use crate::retry::RetryReason;

/// Classifies failures for the retry orchestrator and the bulk engine.
pub trait ErrorClassifier: Send + Sync {
    /// Map a raw transport failure to a client error. `idempotent` decides
    /// whether a deadline hit in flight is ambiguous.
    fn map_error(&self, err: TransportError, idempotent: bool) -> KvError;

    /// The retry reason for a mapped error, or `None` when it is not retryable.
    fn retry_reason(&self, err: &KvError) -> Option<RetryReason>;

    /// Whether the error is a definitive timeout.
    fn is_timeout(&self, err: &KvError) -> bool {
        err.is_timeout()
    }
}

/// Status code based classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorClassifier;

impl ErrorClassifier for DefaultErrorClassifier {
    fn map_error(&self, err: TransportError, idempotent: bool) -> KvError {
        match err.code {
            StatusCode::NotFound => KvError::DocumentNotFound,
            StatusCode::AlreadyExists => KvError::DocumentExists,
            StatusCode::FailedPrecondition => KvError::DocumentLocked,
            StatusCode::Aborted => KvError::CasMismatch,
            StatusCode::ResourceExhausted => KvError::TemporaryFailure,
            StatusCode::Unavailable => KvError::ServiceNotAvailable,
            StatusCode::OutOfRange => KvError::ValueTooLarge,
            StatusCode::Cancelled => KvError::RequestCanceled,
            StatusCode::InvalidArgument => KvError::InvalidArgument(err.message),
            StatusCode::PermissionDenied | StatusCode::Unauthenticated => {
                KvError::AuthenticationFailure
            }
            StatusCode::DeadlineExceeded if idempotent => KvError::UnambiguousTimeout,
            StatusCode::DeadlineExceeded => KvError::AmbiguousTimeout,
            code => KvError::Transport {
                code,
                message: err.message,
            },
        }
    }

    fn retry_reason(&self, err: &KvError) -> Option<RetryReason> {
        match err.root() {
            KvError::DocumentLocked => Some(RetryReason::KvLocked),
            KvError::TemporaryFailure => Some(RetryReason::KvTemporaryFailure),
            KvError::ServiceNotAvailable => Some(RetryReason::ServiceNotAvailable),
            _ => None,
        }
    }
}
