//! Retry decision function.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use super::backoff::controlled_backoff;
use super::reason::RetryReason;
use super::request::{RetryRequest, RetryableRequest};

// Roughly 30 years; stands in for backoffs past the end of the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

fn wake_after(backoff: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(backoff)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// Decide whether `request` should be retried after failing for `reason`.
///
/// Returns the instant to wake up at when the request should be retried, and
/// records the attempt on the request. Reasons flagged as always-retry bypass
/// the strategy and use [`controlled_backoff`]. A strategy answering with a zero
/// duration means no retry.
pub fn maybe_retry(request: &mut RetryableRequest, reason: RetryReason) -> Option<Instant> {
    if reason.always_retry() {
        let backoff = controlled_backoff(request.retry_attempts());
        debug!(
            backoff = ?backoff,
            operation_id = request.identifier(),
            reason = %reason,
            "Will retry request"
        );

        request.record_retry_attempt(reason);
        return Some(wake_after(backoff));
    }

    let strategy = request.strategy()?.clone();

    let backoff = strategy.retry_after(&*request, reason).duration();
    if backoff.is_zero() {
        debug!(
            operation_id = request.identifier(),
            reason = %reason,
            "Won't retry request"
        );
        return None;
    }

    debug!(
        backoff = ?backoff,
        operation_id = request.identifier(),
        reason = %reason,
        "Will retry request"
    );
    request.record_retry_attempt(reason);

    Some(wake_after(backoff))
}
