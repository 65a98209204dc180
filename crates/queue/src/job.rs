use chrono::{DateTime, Utc};
use common::JobId;
use serde::{Deserialize, Serialize};

/// Priority assigned to jobs that did not ask for one.
///
/// Lower values dispatch earlier, so the default class always yields to any
/// explicitly prioritized job.
pub const DEFAULT_PRIORITY: u32 = u32::MAX;

/// The state of a job in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Eligible for dispatch.
    Waiting,
    /// Claimed by a worker; an attempt is in progress.
    Active,
    /// Parked until `available_at` for a backoff retry.
    Delayed,
    /// Handler acknowledged completion (terminal, retained for observability).
    Completed,
    /// Retries exhausted or terminally discarded (terminal, dead-letter set).
    Failed,
}

impl JobState {
    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Waiting => "waiting",
            JobState::Active => "active",
            JobState::Delayed => "delayed",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A queued unit of work.
///
/// The payload is opaque JSON; producers and handlers agree on its shape,
/// the queue does not. `attempts` counts started attempts and is incremented
/// when a worker claims the job. `enqueued_seq` totally orders jobs within a
/// priority class for FIFO dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub queue: String,
    pub payload: serde_json::Value,
    pub priority: u32,
    pub attempts: u32,
    pub max_attempts: u32,
    pub state: JobState,
    /// Reason recorded by the last failure or retry.
    pub failure_reason: Option<String>,
    pub enqueued_seq: u64,
    /// Earliest instant the job may be dispatched.
    pub available_at: DateTime<Utc>,
    /// When the current attempt was claimed; used for stall detection.
    pub started_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Returns true if the job has no attempts left after a failure.
    pub fn attempts_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}

/// Per-job overrides supplied at enqueue time.
#[derive(Debug, Clone)]
pub struct JobOptions {
    /// Dispatch priority; lower dispatches earlier.
    pub priority: u32,
    /// Overrides the queue's configured attempt cap.
    pub max_attempts: Option<u32>,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            priority: DEFAULT_PRIORITY,
            max_attempts: None,
        }
    }
}

impl JobOptions {
    /// Creates options with the given priority.
    pub fn with_priority(priority: u32) -> Self {
        Self {
            priority,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(JobState::Waiting.to_string(), "waiting");
        assert_eq!(JobState::Failed.to_string(), "failed");
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&JobState::Delayed).unwrap();
        assert_eq!(json, "\"delayed\"");
    }

    #[test]
    fn test_default_options_use_default_priority() {
        let options = JobOptions::default();
        assert_eq!(options.priority, DEFAULT_PRIORITY);
        assert!(options.max_attempts.is_none());
    }

    #[test]
    fn test_with_priority() {
        let options = JobOptions::with_priority(1);
        assert_eq!(options.priority, 1);
    }
}
