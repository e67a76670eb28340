use std::path::PathBuf;

use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::QueueConfig;
use crate::error::Result;
use crate::store::Store;
use crate::worker::Worker;

/// How long a stopping pool waits for workers to finish their current jobs.
/// Jobs still running after this are left `processing` for the next pool's
/// reaper.
pub const STOP_GRACE: std::time::Duration = std::time::Duration::from_secs(30);

/// Spawns N worker loops over one database. Each worker gets its own store
/// handle; the config snapshot is captured once here, so changing config
/// mid-drain requires a pool restart to take effect.
///
/// The pool owns its shutdown token: cancel [`shutdown_handle`] (or wire
/// [`stop_on_signals`]) to stop it.
///
/// [`shutdown_handle`]: WorkerPool::shutdown_handle
/// [`stop_on_signals`]: WorkerPool::stop_on_signals
pub struct WorkerPool {
    db_path: PathBuf,
    count: usize,
    config: QueueConfig,
    shutdown: CancellationToken,
}

impl WorkerPool {
    pub fn new(db_path: impl Into<PathBuf>, count: usize) -> Result<Self> {
        let db_path = db_path.into();
        let store = Store::open(&db_path)?;
        let config = store.load_config()?;
        Ok(Self {
            db_path,
            count,
            config,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Token that stops the pool when cancelled.
    pub fn shutdown_handle(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop the pool when the process receives SIGTERM or SIGINT. Workers
    /// finish the job they hold; nothing new is claimed after the signal.
    pub fn stop_on_signals(&self) -> Result<()> {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let shutdown = self.shutdown.clone();
        let workers = self.count;
        tokio::spawn(async move {
            let received = tokio::select! {
                _ = sigterm.recv() => "SIGTERM",
                _ = sigint.recv() => "SIGINT",
            };
            tracing::info!(signal = received, workers, "signal received, stopping worker pool");
            shutdown.cancel();
        });
        Ok(())
    }

    /// Run until the shutdown token fires, then drain within the grace
    /// window.
    pub async fn run(self) -> Result<()> {
        tracing::info!(
            count = self.count,
            db = %self.db_path.display(),
            poll_interval_s = self.config.worker_poll_interval,
            "starting workers"
        );

        let mut workers = JoinSet::new();
        for index in 1..=self.count {
            let store = Store::open(&self.db_path)?;
            let worker = Worker::new(index, store, self.config.clone(), self.shutdown.clone());
            workers.spawn(worker.run());
        }

        self.shutdown.cancelled().await;
        tracing::info!("stopping workers gracefully (finishing current jobs)");

        let timed_out = {
            let drain = async {
                while workers.join_next().await.is_some() {}
            };
            tokio::time::timeout(STOP_GRACE, drain).await.is_err()
        };
        if timed_out {
            tracing::warn!(
                grace_s = STOP_GRACE.as_secs(),
                "grace period elapsed, abandoning remaining jobs to the reaper"
            );
            workers.abort_all();
        }

        tracing::info!("all workers stopped");
        Ok(())
    }
}
