use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::scheduler::Job;
use crate::store::Store;

/// Thin policy layer over the store's atomic claim.
///
/// Re-eligibility of `failed` jobs is realised by promotion: due retries are
/// rewritten to `pending` first, and the claim itself only ever considers
/// `pending` rows. This is the single mechanism; `failed` rows are never
/// claimed directly.
pub struct Dispatcher;

impl Dispatcher {
    /// Return the next claimed job, or `None` when nothing is eligible.
    /// The caller owns execution responsibility for a returned job.
    pub fn poll(store: &mut Store, now: DateTime<Utc>) -> Result<Option<Job>> {
        let promoted = store.promote_due(now)?;
        if promoted > 0 {
            tracing::debug!(promoted, "returned due retries to pending");
        }
        store.claim_next(now)
    }
}
