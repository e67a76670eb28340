use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{QueueError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
    Dead,
}

impl JobState {
    pub const ALL: [JobState; 5] = [
        JobState::Pending,
        JobState::Processing,
        JobState::Completed,
        JobState::Failed,
        JobState::Dead,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Dead => "dead",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobState {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(JobState::Pending),
            "processing" => Ok(JobState::Processing),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            "dead" => Ok(JobState::Dead),
            other => Err(QueueError::InvalidPayload(format!(
                "unknown job state '{other}'"
            ))),
        }
    }
}

/// Submission payload accepted over the operator surface. Unknown fields are
/// rejected so that typos do not silently drop scheduling options.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobSpec {
    pub id: String,
    pub command: String,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub run_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub timeout_seconds: Option<u32>,
}

impl JobSpec {
    pub fn parse(raw: &str) -> Result<Self> {
        let spec: JobSpec =
            serde_json::from_str(raw).map_err(|e| QueueError::InvalidPayload(e.to_string()))?;
        spec.validate()?;
        Ok(spec)
    }

    fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(QueueError::InvalidPayload("'id' must not be empty".into()));
        }
        if self.command.is_empty() {
            return Err(QueueError::InvalidPayload(
                "'command' must not be empty".into(),
            ));
        }
        if self.timeout_seconds == Some(0) {
            return Err(QueueError::InvalidPayload(
                "'timeout_seconds' must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Output captured from a single execution attempt: bounded stdout/stderr
/// tails and the wall-clock duration.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunDetails {
    pub last_stdout: Option<String>,
    pub last_stderr: Option<String>,
    pub duration_ms: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: String,
    pub command: String,
    pub state: JobState,
    pub attempts: u32,
    pub max_retries: u32,
    pub priority: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub run_at: Option<DateTime<Utc>>,
    pub timeout_seconds: Option<u32>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub last_stdout: Option<String>,
    pub last_stderr: Option<String>,
    pub duration_ms: Option<i64>,
}

impl Job {
    pub const DEFAULT_TIMEOUT_SECONDS: u32 = 300;

    pub fn from_spec(spec: JobSpec, default_max_retries: u32, now: DateTime<Utc>) -> Self {
        Self {
            id: spec.id,
            command: spec.command,
            state: JobState::Pending,
            attempts: 0,
            max_retries: spec.max_retries.unwrap_or(default_max_retries),
            priority: spec.priority.unwrap_or(0),
            created_at: now,
            updated_at: now,
            run_at: spec.run_at,
            timeout_seconds: spec.timeout_seconds,
            next_retry_at: None,
            completed_at: None,
            error_message: None,
            last_stdout: None,
            last_stderr: None,
            duration_ms: None,
        }
    }

    /// Hard execution deadline for this job.
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(
            self.timeout_seconds.unwrap_or(Self::DEFAULT_TIMEOUT_SECONDS) as u64,
        )
    }
}
