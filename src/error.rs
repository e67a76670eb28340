use thiserror::Error;

use crate::scheduler::JobState;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("job '{0}' already exists")]
    DuplicateId(String),

    #[error("job '{0}' not found")]
    JobNotFound(String),

    #[error("job '{id}' is not in the dead letter queue (state: {state})")]
    NotInDlq { id: String, state: JobState },

    #[error("job '{id}' is not in state '{expected}'")]
    InvalidTransition { id: String, expected: JobState },

    #[error("invalid job payload: {0}")]
    InvalidPayload(String),

    #[error("unknown config key '{0}'")]
    UnknownConfigKey(String),

    #[error("invalid value for config key '{key}': {reason}")]
    InvalidConfigValue { key: String, reason: String },

    #[error("invalid timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("store busy after {0} attempts")]
    Busy(u32),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, QueueError>;
