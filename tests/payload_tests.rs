use chrono::{Datelike, Timelike};

use queuectl::error::QueueError;
use queuectl::scheduler::JobSpec;

#[test]
fn test_minimal_payload() {
    let spec = JobSpec::parse(r#"{"id":"job1","command":"echo hello"}"#).unwrap();
    assert_eq!(spec.id, "job1");
    assert_eq!(spec.command, "echo hello");
    assert!(spec.max_retries.is_none());
    assert!(spec.priority.is_none());
    assert!(spec.run_at.is_none());
    assert!(spec.timeout_seconds.is_none());
}

#[test]
fn test_full_payload() {
    let spec = JobSpec::parse(
        r#"{"id":"job1","command":"true","max_retries":5,"priority":-2,
            "run_at":"2026-08-02T12:30:00Z","timeout_seconds":60}"#,
    )
    .unwrap();
    assert_eq!(spec.max_retries, Some(5));
    assert_eq!(spec.priority, Some(-2));
    assert_eq!(spec.timeout_seconds, Some(60));
    let run_at = spec.run_at.unwrap();
    assert_eq!((run_at.year(), run_at.month(), run_at.day()), (2026, 8, 2));
    assert_eq!((run_at.hour(), run_at.minute()), (12, 30));
}

#[test]
fn test_unknown_field_rejected() {
    let err = JobSpec::parse(r#"{"id":"j","command":"true","retries":3}"#).unwrap_err();
    assert!(matches!(err, QueueError::InvalidPayload(_)));
}

#[test]
fn test_missing_required_fields_rejected() {
    assert!(JobSpec::parse(r#"{"command":"true"}"#).is_err());
    assert!(JobSpec::parse(r#"{"id":"j"}"#).is_err());
    assert!(JobSpec::parse("not json").is_err());
}

#[test]
fn test_empty_strings_rejected() {
    assert!(JobSpec::parse(r#"{"id":"","command":"true"}"#).is_err());
    assert!(JobSpec::parse(r#"{"id":"j","command":""}"#).is_err());
}

#[test]
fn test_zero_timeout_rejected() {
    let err =
        JobSpec::parse(r#"{"id":"j","command":"true","timeout_seconds":0}"#).unwrap_err();
    assert!(matches!(err, QueueError::InvalidPayload(_)));
}

#[test]
fn test_invalid_run_at_rejected() {
    assert!(JobSpec::parse(r#"{"id":"j","command":"true","run_at":"tomorrow"}"#).is_err());
}
