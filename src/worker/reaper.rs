use chrono::{DateTime, Duration, Utc};

use crate::error::Result;
use crate::store::Store;

/// How often a worker runs its reap step, besides once at startup.
pub const REAP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

/// Slack on top of the longest in-flight deadline before a claim is
/// presumed abandoned.
const MARGIN_SECS: i64 = 60;

/// Returns abandoned `processing` claims to `pending` so a crashed worker's
/// jobs make progress again. Attempts are preserved: a job that keeps
/// crashing its worker still marches toward the dead letter queue on its
/// subsequent failed runs.
pub struct Reaper {
    floor: Duration,
}

impl Reaper {
    pub fn new(floor: Duration) -> Self {
        Self { floor }
    }

    /// The stale window is the configured floor, stretched to cover the
    /// longest execution deadline still in flight plus a margin. A row only
    /// counts as abandoned once every legitimate run of it must have ended.
    pub fn run_once(&self, store: &mut Store, now: DateTime<Utc>) -> Result<u64> {
        let longest = store.longest_processing_timeout()?;
        let window = self
            .floor
            .max(Duration::seconds(longest as i64 + MARGIN_SECS));
        let reaped = store.reap_stale(now - window)?;
        if reaped > 0 {
            tracing::warn!(reaped, "returned stale processing jobs to pending");
        }
        Ok(reaped)
    }
}
