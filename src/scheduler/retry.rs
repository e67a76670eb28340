//! Retry decisions as a pure function of the attempt count and policy knobs,
//! kept separate from the executor and the store so the whole input space can
//! be unit-tested.

use chrono::{DateTime, Duration, Utc};

/// Terminal store update owed to a job after a failed execution attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Schedule another attempt once `next_retry_at` has passed.
    Retry { next_retry_at: DateTime<Utc> },
    /// Retries exhausted; route to the dead letter queue.
    Dead,
}

/// Decide what happens after a retryable failure.
///
/// `attempts_after_run` counts the attempt that just failed, so the first
/// failure passes 1. The backoff delay is `backoff_base ^ attempts_after_run`
/// seconds with no jitter and no cap other than `max_retries` itself.
pub fn after_failure(
    attempts_after_run: u32,
    max_retries: u32,
    backoff_base: u32,
    now: DateTime<Utc>,
) -> Disposition {
    if attempts_after_run >= max_retries {
        return Disposition::Dead;
    }
    Disposition::Retry {
        next_retry_at: now + Duration::seconds(backoff_delay(backoff_base, attempts_after_run)),
    }
}

/// Backoff delay in seconds for the given attempt, saturating instead of
/// overflowing for pathological bases.
pub fn backoff_delay(backoff_base: u32, attempt: u32) -> i64 {
    (backoff_base as i64).saturating_pow(attempt)
}
