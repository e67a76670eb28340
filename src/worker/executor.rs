use std::process::Stdio;
use std::time::Instant;

use tokio::process::Command;

use crate::scheduler::{Job, RunDetails};

/// Bound on the stdout/stderr tails persisted with a job.
const TAIL_BYTES: usize = 4096;

/// Classified result of one execution attempt. Anything other than a clean
/// exit 0 within the deadline is a retryable failure; the retry policy
/// decides what it costs the job.
#[derive(Debug)]
pub enum Outcome {
    Success { details: RunDetails },
    Failure { error: String, details: RunDetails },
}

/// Runs a claimed job's command via the host shell with a hard wall-clock
/// deadline. Produces no store side effects; the worker loop applies the
/// outcome.
#[derive(Debug, Clone, Default)]
pub struct JobExecutor;

impl JobExecutor {
    pub fn new() -> Self {
        Self
    }

    pub async fn execute(&self, job: &Job) -> Outcome {
        let deadline = job.timeout();
        tracing::info!(
            job_id = %job.id,
            command = %job.command,
            timeout_s = deadline.as_secs(),
            "executing job"
        );

        let started = Instant::now();
        let spawned = Command::new("sh")
            .arg("-c")
            .arg(&job.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match spawned {
            Ok(child) => child,
            Err(e) => {
                return Outcome::Failure {
                    error: format!("failed to spawn command: {e}"),
                    details: bare_details(started),
                }
            }
        };

        // On deadline the wait future is dropped, which kills the child.
        match tokio::time::timeout(deadline, child.wait_with_output()).await {
            Err(_) => Outcome::Failure {
                error: format!("execution timed out after {}s", deadline.as_secs()),
                details: bare_details(started),
            },
            Ok(Err(e)) => Outcome::Failure {
                error: format!("failed to supervise command: {e}"),
                details: bare_details(started),
            },
            Ok(Ok(output)) => {
                let details = RunDetails {
                    last_stdout: tail(&output.stdout),
                    last_stderr: tail(&output.stderr),
                    duration_ms: Some(started.elapsed().as_millis() as i64),
                };
                if output.status.success() {
                    Outcome::Success { details }
                } else {
                    let error = match output.status.code() {
                        Some(code) => match &details.last_stderr {
                            Some(stderr) => format!("exit code {code}: {}", stderr.trim_end()),
                            None => format!("command exited with code {code}"),
                        },
                        None => "command terminated by signal".to_string(),
                    };
                    Outcome::Failure { error, details }
                }
            }
        }
    }
}

fn bare_details(started: Instant) -> RunDetails {
    RunDetails {
        last_stdout: None,
        last_stderr: None,
        duration_ms: Some(started.elapsed().as_millis() as i64),
    }
}

/// Last `TAIL_BYTES` of a stream, lossily decoded; empty streams map to None.
fn tail(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }
    let start = bytes.len().saturating_sub(TAIL_BYTES);
    Some(String::from_utf8_lossy(&bytes[start..]).into_owned())
}
