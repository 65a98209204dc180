use std::time::Duration;

use crate::Backoff;

/// How many terminal jobs are retained for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retention {
    pub completed: usize,
    pub failed: usize,
}

impl Default for Retention {
    fn default() -> Self {
        Self {
            completed: 500,
            failed: 10,
        }
    }
}

/// Queue configuration with the documented defaults.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Queue name; jobs carry it and the durable store filters by it.
    pub name: String,
    /// Attempt cap before a job moves to the failed set.
    pub max_attempts: u32,
    /// Retry delay schedule.
    pub backoff: Backoff,
    /// Terminal job retention caps.
    pub retention: Retention,
    /// An active job older than this is considered stalled and redelivered.
    pub stall_timeout: Duration,
    /// Soft cap on a single handler invocation.
    pub handler_timeout: Duration,
    /// Idle worker poll tick; the backstop for delayed-job promotion.
    pub poll_interval: Duration,
}

impl QueueConfig {
    /// Creates a configuration with defaults and the given queue name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: "orders".to_string(),
            max_attempts: 5,
            backoff: Backoff::default(),
            retention: Retention::default(),
            stall_timeout: Duration::from_secs(30),
            handler_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(100),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = QueueConfig::default();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.backoff.base, Duration::from_secs(2));
        assert_eq!(config.retention.completed, 500);
        assert_eq!(config.retention.failed, 10);
        assert_eq!(config.stall_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_named() {
        let config = QueueConfig::named("payments");
        assert_eq!(config.name, "payments");
        assert_eq!(config.max_attempts, 5);
    }
}
