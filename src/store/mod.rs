//! Durable SQLite-backed store for jobs, config, and the worker registry.
//!
//! All mutations run under `BEGIN IMMEDIATE` transactions so writes are
//! serialized; the claim's select-and-mark is one such transaction, which is
//! what makes "at most one worker owns a processing row" hold. Each worker
//! opens its own `Store` (one connection per handle); handles are never
//! shared across workers.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use serde::Serialize;

use crate::config::{QueueConfig, KEY_BACKOFF_BASE, KEY_MAX_RETRIES, KEY_WORKER_POLL_INTERVAL};
use crate::error::{QueueError, Result};
use crate::scheduler::{Disposition, Job, JobSpec, JobState, RunDetails};

const WRITE_ATTEMPTS: u32 = 3;
const BUSY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);
const BUSY_RETRY_PAUSE: std::time::Duration = std::time::Duration::from_millis(50);

/// Diagnostic recorded on rows rescued by the reaper.
pub const REAPED_MESSAGE: &str = "reaped: worker presumed crashed";

/// Job counts per state, plus the drain condition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StateCounts {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
    pub dead: u64,
}

impl StateCounts {
    pub fn total(&self) -> u64 {
        self.pending + self.processing + self.completed + self.failed + self.dead
    }

    /// True once no job can still make progress on its own.
    pub fn drained(&self) -> bool {
        self.pending == 0 && self.processing == 0 && self.failed == 0
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct QueueMetrics {
    /// Average duration of the 20 most recently completed jobs.
    pub avg_duration_ms: Option<i64>,
    /// Jobs completed within the last 60 seconds.
    pub completed_last_min: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkerRecord {
    pub id: String,
    pub pid: i64,
    pub started_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
}

impl WorkerRecord {
    /// A worker counts as active while it has not stopped and its heartbeat
    /// is younger than `stale_secs`.
    pub fn is_active(&self, now: DateTime<Utc>, stale_secs: i64) -> bool {
        self.stopped_at.is_none()
            && now.signed_duration_since(self.last_heartbeat).num_seconds() < stale_secs
    }
}

pub struct Store {
    conn: Connection,
    path: PathBuf,
}

impl Store {
    /// Open (creating if needed) the store at `path`. Schema mismatches and
    /// unreadable files surface here, before any worker starts.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        ensure_schema(&conn)?;
        Ok(Self { conn, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // -------------------- jobs --------------------

    /// Persist a new job in `pending`. Fails with `DuplicateId` when the id
    /// is already taken.
    pub fn insert(&mut self, spec: &JobSpec, default_max_retries: u32, now: DateTime<Utc>) -> Result<Job> {
        let job = Job::from_spec(spec.clone(), default_max_retries, now);
        let inserted = job.clone();
        self.write_tx(move |tx| {
            let outcome = tx.execute(
                "INSERT INTO jobs (id, command, state, attempts, max_retries, priority,
                                   created_at, updated_at, run_at, timeout_seconds,
                                   next_retry_at, completed_at, error_message,
                                   last_stdout, last_stderr, duration_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                params![
                    job.id,
                    job.command,
                    job.state.as_str(),
                    job.attempts,
                    job.max_retries,
                    job.priority,
                    fmt_ts(job.created_at),
                    fmt_ts(job.updated_at),
                    job.run_at.map(fmt_ts),
                    job.timeout_seconds,
                    job.next_retry_at.map(fmt_ts),
                    job.completed_at.map(fmt_ts),
                    job.error_message,
                    job.last_stdout,
                    job.last_stderr,
                    job.duration_ms,
                ],
            );
            match outcome {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    Err(QueueError::DuplicateId(job.id.clone()))
                }
                Err(e) => Err(e.into()),
            }
        })?;
        Ok(inserted)
    }

    pub fn get(&self, id: &str) -> Result<Option<Job>> {
        let job = self
            .conn
            .query_row("SELECT * FROM jobs WHERE id = ?1", params![id], row_to_job)
            .optional()?;
        Ok(job)
    }

    /// List jobs, newest first, optionally filtered by state.
    pub fn list(&self, state: Option<JobState>, limit: Option<usize>) -> Result<Vec<Job>> {
        let limit = limit.map(|n| n as i64).unwrap_or(-1);
        let mut jobs = Vec::new();
        match state {
            Some(state) => {
                let mut stmt = self.conn.prepare(
                    "SELECT * FROM jobs WHERE state = ?1 ORDER BY created_at DESC LIMIT ?2",
                )?;
                let rows = stmt.query_map(params![state.as_str(), limit], row_to_job)?;
                for row in rows {
                    jobs.push(row?);
                }
            }
            None => {
                let mut stmt = self
                    .conn
                    .prepare("SELECT * FROM jobs ORDER BY created_at DESC LIMIT ?1")?;
                let rows = stmt.query_map(params![limit], row_to_job)?;
                for row in rows {
                    jobs.push(row?);
                }
            }
        }
        Ok(jobs)
    }

    pub fn counts_by_state(&self) -> Result<StateCounts> {
        let mut stmt = self
            .conn
            .prepare("SELECT state, COUNT(*) FROM jobs GROUP BY state")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        let mut counts = StateCounts::default();
        for row in rows {
            let (state, count) = row?;
            let count = count as u64;
            match state.parse::<JobState>() {
                Ok(JobState::Pending) => counts.pending = count,
                Ok(JobState::Processing) => counts.processing = count,
                Ok(JobState::Completed) => counts.completed = count,
                Ok(JobState::Failed) => counts.failed = count,
                Ok(JobState::Dead) => counts.dead = count,
                Err(_) => {}
            }
        }
        Ok(counts)
    }

    /// Atomically claim the next eligible pending job: highest priority
    /// first, FIFO within a priority, id as the stable tiebreaker. The mark
    /// is guarded on `state = 'pending'`, so a lost race affects zero rows
    /// and yields `None`.
    pub fn claim_next(&mut self, now: DateTime<Utc>) -> Result<Option<Job>> {
        let now_s = fmt_ts(now);
        self.write_tx(move |tx| {
            let candidate: Option<String> = tx
                .query_row(
                    "SELECT id FROM jobs
                     WHERE state = 'pending' AND (run_at IS NULL OR run_at <= ?1)
                     ORDER BY priority DESC, created_at ASC, id ASC
                     LIMIT 1",
                    params![now_s],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(id) = candidate else {
                return Ok(None);
            };
            let changed = tx.execute(
                "UPDATE jobs SET state = 'processing', updated_at = ?1
                 WHERE id = ?2 AND state = 'pending'",
                params![now_s, id],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            fetch_job(tx, &id).map(Some)
        })
    }

    /// Record a successful run: requires `processing`, moves to `completed`,
    /// clears the error, counts the attempt.
    pub fn finalize_success(
        &mut self,
        id: &str,
        now: DateTime<Utc>,
        details: &RunDetails,
    ) -> Result<Job> {
        let id = id.to_string();
        let now_s = fmt_ts(now);
        let details = details.clone();
        self.write_tx(move |tx| {
            let changed = tx.execute(
                "UPDATE jobs SET state = 'completed', attempts = attempts + 1,
                        completed_at = ?1, updated_at = ?1, error_message = NULL,
                        next_retry_at = NULL, last_stdout = ?2, last_stderr = ?3,
                        duration_ms = ?4
                 WHERE id = ?5 AND state = 'processing'",
                params![
                    now_s,
                    details.last_stdout,
                    details.last_stderr,
                    details.duration_ms,
                    id
                ],
            )?;
            if changed == 0 {
                return Err(QueueError::InvalidTransition {
                    id: id.clone(),
                    expected: JobState::Processing,
                });
            }
            fetch_job(tx, &id)
        })
    }

    /// Record a failed run: requires `processing`, counts the attempt, and
    /// lands in `failed` (with a retry floor) or `dead` per the disposition.
    pub fn finalize_failure(
        &mut self,
        id: &str,
        now: DateTime<Utc>,
        error: &str,
        disposition: &Disposition,
        details: &RunDetails,
    ) -> Result<Job> {
        let id = id.to_string();
        let now_s = fmt_ts(now);
        let error = error.to_string();
        let details = details.clone();
        let disposition = disposition.clone();
        self.write_tx(move |tx| {
            let changed = match &disposition {
                Disposition::Retry { next_retry_at } => tx.execute(
                    "UPDATE jobs SET state = 'failed', attempts = attempts + 1,
                            error_message = ?1, next_retry_at = ?2, completed_at = NULL,
                            updated_at = ?3, last_stdout = ?4, last_stderr = ?5,
                            duration_ms = ?6
                     WHERE id = ?7 AND state = 'processing'",
                    params![
                        error,
                        fmt_ts(*next_retry_at),
                        now_s,
                        details.last_stdout,
                        details.last_stderr,
                        details.duration_ms,
                        id
                    ],
                )?,
                Disposition::Dead => tx.execute(
                    "UPDATE jobs SET state = 'dead', attempts = attempts + 1,
                            error_message = ?1, next_retry_at = NULL, completed_at = ?2,
                            updated_at = ?2, last_stdout = ?3, last_stderr = ?4,
                            duration_ms = ?5
                     WHERE id = ?6 AND state = 'processing'",
                    params![
                        error,
                        now_s,
                        details.last_stdout,
                        details.last_stderr,
                        details.duration_ms,
                        id
                    ],
                )?,
            };
            if changed == 0 {
                return Err(QueueError::InvalidTransition {
                    id: id.clone(),
                    expected: JobState::Processing,
                });
            }
            fetch_job(tx, &id)
        })
    }

    /// Move `failed` rows whose retry floor has passed back to `pending`.
    /// Returns the number of promoted rows.
    pub fn promote_due(&mut self, now: DateTime<Utc>) -> Result<u64> {
        let now_s = fmt_ts(now);
        self.write_tx(move |tx| {
            let changed = tx.execute(
                "UPDATE jobs SET state = 'pending', next_retry_at = NULL, updated_at = ?1
                 WHERE state = 'failed' AND next_retry_at IS NOT NULL AND next_retry_at <= ?1",
                params![now_s],
            )?;
            Ok(changed as u64)
        })
    }

    /// Largest execution deadline among rows currently `processing`, with
    /// the default applied where a job has none. The reaper uses this to
    /// size its stale window so a slow-but-legitimate job is never reaped
    /// mid-run.
    pub fn longest_processing_timeout(&self) -> Result<u32> {
        let longest: Option<i64> = self.conn.query_row(
            "SELECT MAX(COALESCE(timeout_seconds, ?1)) FROM jobs WHERE state = 'processing'",
            params![Job::DEFAULT_TIMEOUT_SECONDS],
            |row| row.get(0),
        )?;
        Ok(longest
            .map(|t| t as u32)
            .unwrap_or(Job::DEFAULT_TIMEOUT_SECONDS))
    }

    /// Return `processing` rows whose `updated_at` predates `threshold` to
    /// `pending`, preserving `attempts`. Returns the number of reaped rows.
    pub fn reap_stale(&mut self, threshold: DateTime<Utc>) -> Result<u64> {
        let threshold_s = fmt_ts(threshold);
        let now_s = fmt_ts(Utc::now());
        self.write_tx(move |tx| {
            let changed = tx.execute(
                "UPDATE jobs SET state = 'pending', error_message = ?1, updated_at = ?2
                 WHERE state = 'processing' AND updated_at < ?3",
                params![REAPED_MESSAGE, now_s, threshold_s],
            )?;
            Ok(changed as u64)
        })
    }

    /// Give a dead job a fresh start: back to `pending` with zeroed attempts
    /// and cleared diagnostics.
    pub fn dlq_retry(&mut self, id: &str, now: DateTime<Utc>) -> Result<Job> {
        let id = id.to_string();
        let now_s = fmt_ts(now);
        self.write_tx(move |tx| {
            let state: Option<String> = tx
                .query_row(
                    "SELECT state FROM jobs WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(state) = state else {
                return Err(QueueError::JobNotFound(id.clone()));
            };
            let state: JobState = state.parse()?;
            if state != JobState::Dead {
                return Err(QueueError::NotInDlq {
                    id: id.clone(),
                    state,
                });
            }
            tx.execute(
                "UPDATE jobs SET state = 'pending', attempts = 0, error_message = NULL,
                        next_retry_at = NULL, completed_at = NULL, updated_at = ?1
                 WHERE id = ?2 AND state = 'dead'",
                params![now_s, id],
            )?;
            fetch_job(tx, &id)
        })
    }

    // -------------------- config --------------------

    pub fn config_get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM config WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Validate and persist one tuneable. Writes overwrite.
    pub fn config_set(&mut self, key: &str, value: &str) -> Result<()> {
        QueueConfig::validate(key, value)?;
        let key = key.to_string();
        let value = value.to_string();
        self.write_tx(move |tx| {
            tx.execute(
                "INSERT OR REPLACE INTO config (key, value) VALUES (?1, ?2)",
                params![key, value],
            )?;
            Ok(())
        })
    }

    /// Config snapshot with defaults applied for absent keys.
    pub fn load_config(&self) -> Result<QueueConfig> {
        let mut config = QueueConfig::default();
        for key in [KEY_MAX_RETRIES, KEY_BACKOFF_BASE, KEY_WORKER_POLL_INTERVAL] {
            if let Some(value) = self.config_get(key)? {
                config.apply(key, &value)?;
            }
        }
        Ok(config)
    }

    // -------------------- worker registry --------------------

    pub fn register_worker(&mut self, id: &str, pid: i64, now: DateTime<Utc>) -> Result<()> {
        let id = id.to_string();
        let now_s = fmt_ts(now);
        self.write_tx(move |tx| {
            tx.execute(
                "INSERT OR REPLACE INTO workers (id, pid, started_at, last_heartbeat, stopped_at)
                 VALUES (?1, ?2, ?3, ?3, NULL)",
                params![id, pid, now_s],
            )?;
            Ok(())
        })
    }

    pub fn heartbeat_worker(&mut self, id: &str, now: DateTime<Utc>) -> Result<()> {
        let id = id.to_string();
        let now_s = fmt_ts(now);
        self.write_tx(move |tx| {
            tx.execute(
                "UPDATE workers SET last_heartbeat = ?1 WHERE id = ?2",
                params![now_s, id],
            )?;
            Ok(())
        })
    }

    pub fn stop_worker(&mut self, id: &str, now: DateTime<Utc>) -> Result<()> {
        let id = id.to_string();
        let now_s = fmt_ts(now);
        self.write_tx(move |tx| {
            tx.execute(
                "UPDATE workers SET stopped_at = ?1, last_heartbeat = ?1 WHERE id = ?2",
                params![now_s, id],
            )?;
            Ok(())
        })
    }

    pub fn list_workers(&self) -> Result<Vec<WorkerRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, pid, started_at, last_heartbeat, stopped_at
             FROM workers ORDER BY started_at DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(WorkerRecord {
                id: row.get(0)?,
                pid: row.get(1)?,
                started_at: ts_column(row, 2)?,
                last_heartbeat: ts_column(row, 3)?,
                stopped_at: opt_ts_column(row, 4)?,
            })
        })?;
        let mut workers = Vec::new();
        for row in rows {
            workers.push(row?);
        }
        Ok(workers)
    }

    /// Workers with a heartbeat younger than `stale_secs` and no stop stamp.
    pub fn active_workers(&self, now: DateTime<Utc>, stale_secs: i64) -> Result<u64> {
        let floor = fmt_ts(now - chrono::Duration::seconds(stale_secs));
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM workers WHERE stopped_at IS NULL AND last_heartbeat >= ?1",
            params![floor],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // -------------------- metrics --------------------

    pub fn metrics(&self, now: DateTime<Utc>) -> Result<QueueMetrics> {
        let avg_duration_ms: Option<i64> = self.conn.query_row(
            "SELECT CAST(AVG(duration_ms) AS INTEGER) FROM (
                 SELECT duration_ms FROM jobs
                 WHERE state = 'completed' AND duration_ms IS NOT NULL
                 ORDER BY completed_at DESC LIMIT 20
             )",
            [],
            |row| row.get(0),
        )?;
        let minute_ago = fmt_ts(now - chrono::Duration::seconds(60));
        let completed_last_min: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM jobs
             WHERE state = 'completed' AND completed_at IS NOT NULL AND completed_at >= ?1",
            params![minute_ago],
            |row| row.get(0),
        )?;
        Ok(QueueMetrics {
            avg_duration_ms,
            completed_last_min: completed_last_min as u64,
        })
    }

    // -------------------- internals --------------------

    /// Run `f` inside a `BEGIN IMMEDIATE` transaction, retrying a bounded
    /// number of times when the writer lock is contended.
    fn write_tx<T>(&mut self, mut f: impl FnMut(&Transaction) -> Result<T>) -> Result<T> {
        for attempt in 1..=WRITE_ATTEMPTS {
            let tx = match self
                .conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
            {
                Ok(tx) => tx,
                Err(e) if is_busy(&e) && attempt < WRITE_ATTEMPTS => {
                    std::thread::sleep(BUSY_RETRY_PAUSE);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let value = f(&tx)?;
            match tx.commit() {
                Ok(()) => return Ok(value),
                Err(e) if is_busy(&e) && attempt < WRITE_ATTEMPTS => {
                    std::thread::sleep(BUSY_RETRY_PAUSE);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(QueueError::Busy(WRITE_ATTEMPTS))
    }
}

fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS jobs (
            id TEXT PRIMARY KEY,
            command TEXT NOT NULL,
            state TEXT NOT NULL,
            attempts INTEGER NOT NULL DEFAULT 0,
            max_retries INTEGER NOT NULL DEFAULT 3,
            priority INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            run_at TEXT,
            timeout_seconds INTEGER,
            next_retry_at TEXT,
            completed_at TEXT,
            error_message TEXT,
            last_stdout TEXT,
            last_stderr TEXT,
            duration_ms INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_jobs_state ON jobs (state);
        CREATE INDEX IF NOT EXISTS idx_jobs_next_retry ON jobs (next_retry_at);
        CREATE INDEX IF NOT EXISTS idx_jobs_run_at ON jobs (run_at);
        CREATE INDEX IF NOT EXISTS idx_jobs_priority ON jobs (priority);

        CREATE TABLE IF NOT EXISTS config (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS workers (
            id TEXT PRIMARY KEY,
            pid INTEGER NOT NULL,
            started_at TEXT NOT NULL,
            last_heartbeat TEXT NOT NULL,
            stopped_at TEXT
        );
        ",
    )?;
    Ok(())
}

fn fetch_job(tx: &Transaction, id: &str) -> Result<Job> {
    tx.query_row("SELECT * FROM jobs WHERE id = ?1", params![id], row_to_job)
        .optional()?
        .ok_or_else(|| QueueError::JobNotFound(id.to_string()))
}

fn row_to_job(row: &Row) -> rusqlite::Result<Job> {
    let state: String = row.get("state")?;
    let state = state.parse::<JobState>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Job {
        id: row.get("id")?,
        command: row.get("command")?,
        state,
        attempts: row.get("attempts")?,
        max_retries: row.get("max_retries")?,
        priority: row.get("priority")?,
        created_at: ts_named(row, "created_at")?,
        updated_at: ts_named(row, "updated_at")?,
        run_at: opt_ts_named(row, "run_at")?,
        timeout_seconds: row.get("timeout_seconds")?,
        next_retry_at: opt_ts_named(row, "next_retry_at")?,
        completed_at: opt_ts_named(row, "completed_at")?,
        error_message: row.get("error_message")?,
        last_stdout: row.get("last_stdout")?,
        last_stderr: row.get("last_stderr")?,
        duration_ms: row.get("duration_ms")?,
    })
}

/// Timestamps persist as RFC 3339 UTC with microseconds and a `Z` suffix:
/// fixed width, so lexicographic order is chronological order and the SQL
/// comparisons on them are sound.
pub(crate) fn fmt_ts(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| QueueError::InvalidTimestamp(s.to_string()))
}

fn ts_named(row: &Row, column: &str) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(column)?;
    parse_ts(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn opt_ts_named(row: &Row, column: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(column)?;
    raw.map(|s| {
        parse_ts(&s).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
    })
    .transpose()
}

fn ts_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn opt_ts_column(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        parse_ts(&s).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
    })
    .transpose()
}

fn is_busy(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.code == rusqlite::ErrorCode::DatabaseBusy
                || inner.code == rusqlite::ErrorCode::DatabaseLocked
    )
}
