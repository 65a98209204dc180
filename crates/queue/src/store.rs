use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::JobId;

use crate::{Job, JobState, Result, Retention};

/// Per-state job counts for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobCounts {
    pub waiting: usize,
    pub active: usize,
    pub delayed: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Durable state backing a queue.
///
/// The store owns job state; the [`crate::Queue`] drives transitions and
/// emits lifecycle events around them. Implementations must make `claim_next`
/// atomic so concurrent workers never claim the same job.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Inserts a new waiting job, assigning its FIFO sequence number.
    /// Returns the stored job.
    async fn insert(&self, job: Job) -> Result<Job>;

    /// Loads a job by ID. Returns `None` if unknown or evicted.
    async fn get(&self, job_id: JobId) -> Result<Option<Job>>;

    /// Promotes delayed jobs whose `available_at` has passed to waiting.
    /// Returns the promoted jobs so lifecycle events can be emitted.
    async fn promote_due(&self, now: DateTime<Utc>) -> Result<Vec<Job>>;

    /// Atomically claims the next dispatchable job: the waiting job with the
    /// lowest `(priority, enqueued_seq)` whose `available_at` has passed.
    /// The claimed job becomes active with `attempts` incremented and
    /// `started_at` set.
    async fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<Job>>;

    /// Marks a job completed.
    async fn mark_completed(&self, job_id: JobId) -> Result<Job>;

    /// Marks a job failed with a reason (the dead-letter transition).
    async fn mark_failed(&self, job_id: JobId, reason: &str) -> Result<Job>;

    /// Parks an active job as delayed until `available_at` for a retry,
    /// recording the failure reason of the attempt.
    async fn reschedule(
        &self,
        job_id: JobId,
        available_at: DateTime<Utc>,
        reason: &str,
    ) -> Result<Job>;

    /// Returns an active job to waiting (stall recovery). The attempt that
    /// was in flight stays counted.
    async fn return_to_waiting(&self, job_id: JobId) -> Result<Job>;

    /// Lists active jobs whose attempt started before the cutoff.
    async fn stalled_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<Job>>;

    /// Returns per-state job counts.
    async fn counts(&self) -> Result<JobCounts>;

    /// Lists jobs in a state, most recently updated first.
    async fn list_state(&self, state: JobState, limit: usize) -> Result<Vec<Job>>;

    /// Evicts the oldest terminal jobs beyond the retention caps.
    async fn apply_retention(&self, retention: &Retention) -> Result<()>;
}
