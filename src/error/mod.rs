//! Error Handling Module
//!
//! This module provides error handling for the client, including:
//! - Core error types (`KvError`, `ErrorContext`)
//! - Classification of raw transport failures (`ErrorClassifier`)
//!
//! # Example
//!
//! ```rust
//! use kvreliable::error::{DefaultErrorClassifier, ErrorClassifier, KvError};
//! use kvreliable::execution::{StatusCode, TransportError};
//! use kvreliable::retry::RetryReason;
//!
//! let err = DefaultErrorClassifier.map_error(TransportError::new(StatusCode::Unavailable, "down"), false);
//! assert!(matches!(err, KvError::ServiceNotAvailable));
//! assert_eq!(DefaultErrorClassifier.retry_reason(&err), Some(RetryReason::ServiceNotAvailable));
//! ```

pub mod classify;
pub mod types;

pub use classify::*;
pub use types::*;
