//! Worker loop: reap, dispatch, execute, finalize.
//!
//! Each worker owns its store handle and never holds a transaction across
//! command execution. The store row is the only authoritative state; the
//! loop keeps nothing in memory between ticks, which is what lets the reaper
//! recover from a crash at any point.

pub mod executor;
pub mod reaper;

pub use executor::{JobExecutor, Outcome};
pub use reaper::Reaper;

use std::time::Instant;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::QueueConfig;
use crate::error::{QueueError, Result};
use crate::scheduler::{retry, Dispatcher, Job};
use crate::store::Store;

const FINALIZE_ATTEMPTS: u32 = 3;
const FINALIZE_RETRY_PAUSE: std::time::Duration = std::time::Duration::from_millis(100);

pub struct Worker {
    id: String,
    store: Store,
    config: QueueConfig,
    executor: JobExecutor,
    reaper: Reaper,
    shutdown: CancellationToken,
}

impl Worker {
    pub fn new(index: usize, store: Store, config: QueueConfig, shutdown: CancellationToken) -> Self {
        let nonce = Uuid::new_v4().simple().to_string();
        let id = format!("{}-{}-{}", std::process::id(), index, &nonce[..8]);
        let reaper = Reaper::new(config.stale_floor());
        Self {
            id,
            store,
            config,
            executor: JobExecutor::new(),
            reaper,
            shutdown,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn run(mut self) {
        tracing::info!(worker_id = %self.id, "worker started");
        if let Err(e) = self
            .store
            .register_worker(&self.id, std::process::id() as i64, Utc::now())
        {
            tracing::warn!(worker_id = %self.id, error = %e, "failed to register worker");
        }
        // Rescue claims abandoned by a previous pool before the first dispatch.
        if let Err(e) = self.reaper.run_once(&mut self.store, Utc::now()) {
            tracing::warn!(worker_id = %self.id, error = %e, "startup reap failed");
        }

        let poll = self.config.poll_interval();
        let mut last_reap = Instant::now();

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            if let Err(e) = self.store.heartbeat_worker(&self.id, Utc::now()) {
                tracing::warn!(worker_id = %self.id, error = %e, "heartbeat failed");
            }

            if last_reap.elapsed() >= reaper::REAP_INTERVAL {
                if let Err(e) = self.reaper.run_once(&mut self.store, Utc::now()) {
                    tracing::warn!(worker_id = %self.id, error = %e, "reap failed");
                }
                last_reap = Instant::now();
            }

            match Dispatcher::poll(&mut self.store, Utc::now()) {
                Ok(Some(job)) => self.process(job).await,
                Ok(None) => {
                    tokio::select! {
                        _ = self.shutdown.cancelled() => break,
                        _ = tokio::time::sleep(poll) => {}
                    }
                }
                Err(e) => {
                    tracing::error!(worker_id = %self.id, error = %e, "dispatch failed");
                    tokio::select! {
                        _ = self.shutdown.cancelled() => break,
                        _ = tokio::time::sleep(std::time::Duration::from_secs(1)) => {}
                    }
                }
            }
        }

        if let Err(e) = self.store.stop_worker(&self.id, Utc::now()) {
            tracing::warn!(worker_id = %self.id, error = %e, "failed to deregister worker");
        }
        tracing::info!(worker_id = %self.id, "worker stopped");
    }

    /// Execute a claimed job and apply the outcome. A transiently failing
    /// finalize is retried a few times; after that the job is left in
    /// `processing` for the reaper and the loop moves on.
    async fn process(&mut self, job: Job) {
        tracing::info!(worker_id = %self.id, job_id = %job.id, "picked up job");
        let outcome = self.executor.execute(&job).await;

        for attempt in 1..=FINALIZE_ATTEMPTS {
            match self.finalize(&job, &outcome) {
                Ok(finalized) => {
                    self.log_outcome(&finalized);
                    return;
                }
                Err(e @ (QueueError::Busy(_) | QueueError::Storage(_)))
                    if attempt < FINALIZE_ATTEMPTS =>
                {
                    tracing::warn!(
                        worker_id = %self.id,
                        job_id = %job.id,
                        attempt,
                        error = %e,
                        "finalize failed, retrying"
                    );
                    tokio::time::sleep(FINALIZE_RETRY_PAUSE).await;
                }
                Err(e) => {
                    tracing::error!(
                        worker_id = %self.id,
                        job_id = %job.id,
                        error = %e,
                        "giving up on finalize, job stays processing until reaped"
                    );
                    return;
                }
            }
        }
    }

    fn finalize(&mut self, job: &Job, outcome: &Outcome) -> Result<Job> {
        let now = Utc::now();
        match outcome {
            Outcome::Success { details } => self.store.finalize_success(&job.id, now, details),
            Outcome::Failure { error, details } => {
                let disposition = retry::after_failure(
                    job.attempts + 1,
                    job.max_retries,
                    self.config.backoff_base,
                    now,
                );
                self.store
                    .finalize_failure(&job.id, now, error, &disposition, details)
            }
        }
    }

    fn log_outcome(&self, job: &Job) {
        use crate::scheduler::JobState;
        match job.state {
            JobState::Completed => {
                tracing::info!(worker_id = %self.id, job_id = %job.id, attempts = job.attempts, "job completed");
            }
            JobState::Failed => {
                tracing::warn!(
                    worker_id = %self.id,
                    job_id = %job.id,
                    attempts = job.attempts,
                    next_retry_at = ?job.next_retry_at,
                    "job failed, will retry"
                );
            }
            JobState::Dead => {
                tracing::warn!(
                    worker_id = %self.id,
                    job_id = %job.id,
                    attempts = job.attempts,
                    "job exhausted retries, moved to dead letter queue"
                );
            }
            _ => {}
        }
    }
}
