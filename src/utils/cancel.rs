//! Cancellation utilities
//!
//! Every request and batch runs under a [`RequestContext`]: an optional deadline
//! plus an explicit cancellation token. Narrowing a context (`with_timeout`)
//! derives a child token, so cancelling a parent cancels every request started
//! from it, while cancelling a child leaves the parent untouched.

use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a context stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    /// The deadline passed.
    DeadlineExceeded,
    /// The context was cancelled explicitly.
    Cancelled,
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeadlineExceeded => f.write_str("context deadline exceeded"),
            Self::Cancelled => f.write_str("context canceled"),
        }
    }
}

/// Deadline-bound, explicitly cancellable execution context.
#[derive(Clone, Debug)]
pub struct RequestContext {
    deadline: Option<Instant>,
    token: CancellationToken,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::background()
    }
}

impl RequestContext {
    /// A context with no deadline that is only cancelled explicitly.
    pub fn background() -> Self {
        Self {
            deadline: None,
            token: CancellationToken::new(),
        }
    }

    /// Derive a child context whose deadline is the earlier of the parent's and
    /// `now + timeout`.
    ///
    /// A timeout too large to represent adds no deadline of its own.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self.child(),
        }
    }

    /// Derive a child context whose deadline is the earlier of the parent's and
    /// `deadline`.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        };
        Self {
            deadline: Some(deadline),
            token: self.token.child_token(),
        }
    }

    /// Derive a cancellable child context with the same deadline.
    pub fn child(&self) -> Self {
        Self {
            deadline: self.deadline,
            token: self.token.child_token(),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Request cancellation of this context and every context derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Why the context has stopped, or `None` while it is still live.
    pub fn err(&self) -> Option<ContextError> {
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            Some(ContextError::DeadlineExceeded)
        } else if self.token.is_cancelled() {
            Some(ContextError::Cancelled)
        } else {
            None
        }
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> ContextError {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = tokio::time::sleep_until(deadline) => ContextError::DeadlineExceeded,
                    _ = self.token.cancelled() => ContextError::Cancelled,
                }
            }
            None => {
                self.token.cancelled().await;
                ContextError::Cancelled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deadline_fires() {
        let ctx = RequestContext::background().with_timeout(Duration::from_millis(10));
        assert_eq!(ctx.err(), None);
        assert_eq!(ctx.done().await, ContextError::DeadlineExceeded);
        assert_eq!(ctx.err(), Some(ContextError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn cancel_wakes_pending_done_immediately() {
        let ctx = RequestContext::background().with_timeout(Duration::from_secs(60));
        let waiter = {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.done().await })
        };

        tokio::task::yield_now().await;
        ctx.cancel();

        let out = tokio::time::timeout(Duration::from_millis(200), waiter)
            .await
            .expect("cancel should wake the waiting task")
            .expect("task ok");
        assert_eq!(out, ContextError::Cancelled);
    }

    #[tokio::test]
    async fn parent_cancel_propagates_but_child_cancel_does_not() {
        let parent = RequestContext::background();
        let child = parent.with_timeout(Duration::from_secs(60));

        child.cancel();
        assert_eq!(child.err(), Some(ContextError::Cancelled));
        assert_eq!(parent.err(), None);

        let other = parent.child();
        parent.cancel();
        assert_eq!(other.err(), Some(ContextError::Cancelled));
    }

    #[test]
    fn unrepresentable_timeout_keeps_parent_deadline() {
        let unbounded = RequestContext::background().with_timeout(Duration::MAX);
        assert_eq!(unbounded.deadline(), None);
        assert_eq!(unbounded.err(), None);

        let parent = RequestContext::background().with_timeout(Duration::from_secs(5));
        let child = parent.with_timeout(Duration::MAX);
        assert_eq!(child.deadline(), parent.deadline());

        parent.cancel();
        assert_eq!(child.err(), Some(ContextError::Cancelled));
    }

    #[test]
    fn child_deadline_never_extends_parent() {
        let parent = RequestContext::background().with_timeout(Duration::from_millis(5));
        let child = parent.with_timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());
    }
}
