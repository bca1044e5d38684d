//! Retry actions returned by a [`RetryStrategy`](super::RetryStrategy).

use std::time::Duration;

/// How long to wait before retrying an operation, if at all.
///
/// A zero duration is treated exactly like [`RetryAction::NoRetry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    /// Do not retry the operation.
    NoRetry,
    /// Retry after the given duration.
    WithDuration(Duration),
}

impl RetryAction {
    /// The length of time to wait before retrying. Zero for [`RetryAction::NoRetry`].
    pub const fn duration(&self) -> Duration {
        match self {
            Self::NoRetry => Duration::ZERO,
            Self::WithDuration(d) => *d,
        }
    }
}
