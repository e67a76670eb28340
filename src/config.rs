use crate::error::{QueueError, Result};

pub const KEY_MAX_RETRIES: &str = "max-retries";
pub const KEY_BACKOFF_BASE: &str = "backoff-base";
pub const KEY_WORKER_POLL_INTERVAL: &str = "worker-poll-interval";

/// Persisted tuneables. Workers capture a snapshot at pool start; changing a
/// value while workers are running takes effect on the next pool.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Default retry ceiling for jobs that omit `max_retries`.
    pub max_retries: u32,
    /// Base of the exponential backoff, in seconds.
    pub backoff_base: u32,
    /// Worker tick period, in seconds.
    pub worker_poll_interval: f64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: 2,
            worker_poll_interval: 1.0,
        }
    }
}

impl QueueConfig {
    /// Apply one persisted key/value pair onto this config.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            KEY_MAX_RETRIES => self.max_retries = parse_u32(key, value)?,
            KEY_BACKOFF_BASE => {
                let base = parse_u32(key, value)?;
                if base < 1 {
                    return Err(QueueError::InvalidConfigValue {
                        key: key.to_string(),
                        reason: "must be at least 1".to_string(),
                    });
                }
                self.backoff_base = base;
            }
            KEY_WORKER_POLL_INTERVAL => {
                let interval: f64 =
                    value
                        .parse()
                        .map_err(|_| QueueError::InvalidConfigValue {
                            key: key.to_string(),
                            reason: format!("'{value}' is not a number"),
                        })?;
                if !interval.is_finite() || interval <= 0.0 {
                    return Err(QueueError::InvalidConfigValue {
                        key: key.to_string(),
                        reason: "must be a positive number of seconds".to_string(),
                    });
                }
                self.worker_poll_interval = interval;
            }
            other => return Err(QueueError::UnknownConfigKey(other.to_string())),
        }
        Ok(())
    }

    /// Check an operator-supplied pair without keeping the result.
    pub fn validate(key: &str, value: &str) -> Result<()> {
        QueueConfig::default().apply(key, value)
    }

    /// Key/value pairs in display order for `config show`.
    pub fn entries(&self) -> [(&'static str, String); 3] {
        [
            (KEY_MAX_RETRIES, self.max_retries.to_string()),
            (KEY_BACKOFF_BASE, self.backoff_base.to_string()),
            (
                KEY_WORKER_POLL_INTERVAL,
                format!("{}s", self.worker_poll_interval),
            ),
        ]
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.worker_poll_interval)
    }

    /// Lower bound on the reaper's stale window: at least ten minutes,
    /// stretched for unusually slow poll intervals. The reaper raises it
    /// further to cover the longest execution deadline still in flight.
    pub fn stale_floor(&self) -> chrono::Duration {
        let secs = (self.worker_poll_interval * 120.0).ceil() as i64;
        chrono::Duration::seconds(secs.max(600))
    }
}

fn parse_u32(key: &str, value: &str) -> Result<u32> {
    value.parse().map_err(|_| QueueError::InvalidConfigValue {
        key: key.to_string(),
        reason: format!("'{value}' is not a non-negative integer"),
    })
}
