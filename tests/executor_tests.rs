mod test_harness;

use chrono::Utc;

use queuectl::scheduler::{Job, JobSpec};
use queuectl::worker::{JobExecutor, Outcome};
use test_harness::spec;

fn job(command: &str) -> Job {
    Job::from_spec(spec("job", command), 3, Utc::now())
}

fn job_with_timeout(command: &str, timeout_seconds: u32) -> Job {
    let payload = JobSpec {
        timeout_seconds: Some(timeout_seconds),
        ..spec("job", command)
    };
    Job::from_spec(payload, 3, Utc::now())
}

#[tokio::test]
async fn test_execute_simple_command() {
    let outcome = JobExecutor::new().execute(&job("echo hello")).await;
    match outcome {
        Outcome::Success { details } => {
            assert_eq!(details.last_stdout.as_deref(), Some("hello\n"));
            assert!(details.last_stderr.is_none());
            assert!(details.duration_ms.is_some());
        }
        Outcome::Failure { error, .. } => panic!("expected success, got: {error}"),
    }
}

#[tokio::test]
async fn test_execute_empty_output() {
    let outcome = JobExecutor::new().execute(&job("true")).await;
    match outcome {
        Outcome::Success { details } => {
            assert!(details.last_stdout.is_none());
            assert!(details.last_stderr.is_none());
        }
        Outcome::Failure { error, .. } => panic!("expected success, got: {error}"),
    }
}

#[tokio::test]
async fn test_execute_nonzero_exit() {
    let outcome = JobExecutor::new().execute(&job("exit 3")).await;
    match outcome {
        Outcome::Failure { error, .. } => {
            assert!(error.contains('3'), "error should name the exit code: {error}");
        }
        Outcome::Success { .. } => panic!("expected failure"),
    }
}

#[tokio::test]
async fn test_execute_captures_stderr() {
    let outcome = JobExecutor::new()
        .execute(&job("echo 'boom' >&2; exit 1"))
        .await;
    match outcome {
        Outcome::Failure { error, details } => {
            assert!(error.contains("boom"), "stderr should surface: {error}");
            assert_eq!(details.last_stderr.as_deref(), Some("boom\n"));
        }
        Outcome::Success { .. } => panic!("expected failure"),
    }
}

#[tokio::test]
async fn test_execute_unknown_command() {
    let outcome = JobExecutor::new()
        .execute(&job("nonexistent_command_12345"))
        .await;
    assert!(matches!(outcome, Outcome::Failure { .. }));
}

#[tokio::test]
async fn test_execute_timeout_kills_process() {
    let started = std::time::Instant::now();
    let outcome = JobExecutor::new()
        .execute(&job_with_timeout("sleep 30", 1))
        .await;
    match outcome {
        Outcome::Failure { error, .. } => {
            assert!(error.contains("timed out"), "unexpected error: {error}");
        }
        Outcome::Success { .. } => panic!("expected timeout failure"),
    }
    // The subprocess must not be waited on to completion.
    assert!(started.elapsed() < std::time::Duration::from_secs(5));
}

#[tokio::test]
async fn test_execute_bounds_output_tail() {
    // 64 KiB of stdout collapses to the final 4 KiB.
    let outcome = JobExecutor::new()
        .execute(&job("yes x | head -c 65536"))
        .await;
    match outcome {
        Outcome::Success { details } => {
            let stdout = details.last_stdout.expect("stdout captured");
            assert!(stdout.len() <= 4096);
        }
        Outcome::Failure { error, .. } => panic!("expected success, got: {error}"),
    }
}
