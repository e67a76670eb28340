//! Shared helpers for integration tests: temp-file databases, payload
//! construction, and drain waiting.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tempfile::TempDir;

use queuectl::scheduler::{Job, JobSpec};
use queuectl::store::Store;

/// A store backed by a file in a temp directory that lives as long as the
/// handle does.
pub struct TestDb {
    _dir: TempDir,
    pub path: PathBuf,
}

pub fn test_db() -> TestDb {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("queue.db");
    TestDb { _dir: dir, path }
}

impl TestDb {
    pub fn store(&self) -> Store {
        Store::open(&self.path).expect("open store")
    }
}

pub fn spec(id: &str, command: &str) -> JobSpec {
    JobSpec {
        id: id.to_string(),
        command: command.to_string(),
        max_retries: None,
        priority: None,
        run_at: None,
        timeout_seconds: None,
    }
}

pub fn enqueue(store: &mut Store, id: &str, command: &str) -> Job {
    store
        .insert(&spec(id, command), 3, Utc::now())
        .expect("insert job")
}

pub fn enqueue_at(store: &mut Store, spec: &JobSpec, now: DateTime<Utc>) -> Job {
    store.insert(spec, 3, now).expect("insert job")
}

/// Poll the store until no pending/processing/failed job remains, or the
/// deadline passes. Returns whether the queue drained.
pub async fn wait_for_drain(path: &Path, deadline: Duration) -> bool {
    let store = Store::open(path).expect("open store");
    let start = Instant::now();
    while start.elapsed() < deadline {
        let counts = store.counts_by_state().expect("count jobs");
        if counts.total() > 0 && counts.drained() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

/// Speed the workers up so drain tests finish quickly.
pub fn fast_poll(store: &mut Store) {
    store
        .config_set("worker-poll-interval", "0.05")
        .expect("set poll interval");
}
