use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::JobId;
use tokio::sync::RwLock;

use crate::{
    Job, JobState, QueueError, Result, Retention,
    store::{JobCounts, JobStore},
};

#[derive(Default)]
struct Inner {
    jobs: HashMap<JobId, Job>,
    next_seq: u64,
    // Terminal jobs in completion order, oldest first, for retention eviction.
    completed_log: VecDeque<JobId>,
    failed_log: VecDeque<JobId>,
}

impl Inner {
    fn get_mut(&mut self, job_id: JobId) -> Result<&mut Job> {
        self.jobs
            .get_mut(&job_id)
            .ok_or(QueueError::JobNotFound(job_id))
    }
}

/// In-memory job store implementation for testing.
///
/// Provides the same claim/transition contract as the PostgreSQL
/// implementation; all transitions happen under a single write lock so
/// concurrent workers never claim the same job.
#[derive(Clone, Default)]
pub struct InMemoryJobStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryJobStore {
    /// Creates a new empty in-memory job store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of jobs held, including terminal ones.
    pub async fn job_count(&self) -> usize {
        self.inner.read().await.jobs.len()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert(&self, mut job: Job) -> Result<Job> {
        let mut inner = self.inner.write().await;
        inner.next_seq += 1;
        job.enqueued_seq = inner.next_seq;
        inner.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get(&self, job_id: JobId) -> Result<Option<Job>> {
        let inner = self.inner.read().await;
        Ok(inner.jobs.get(&job_id).cloned())
    }

    async fn promote_due(&self, now: DateTime<Utc>) -> Result<Vec<Job>> {
        let mut inner = self.inner.write().await;
        let mut promoted = Vec::new();
        for job in inner.jobs.values_mut() {
            if job.state == JobState::Delayed && job.available_at <= now {
                job.state = JobState::Waiting;
                job.updated_at = now;
                promoted.push(job.clone());
            }
        }
        Ok(promoted)
    }

    async fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<Job>> {
        let mut inner = self.inner.write().await;
        let next_id = inner
            .jobs
            .values()
            .filter(|j| j.state == JobState::Waiting && j.available_at <= now)
            .min_by_key(|j| (j.priority, j.enqueued_seq))
            .map(|j| j.id);

        let Some(job_id) = next_id else {
            return Ok(None);
        };

        let job = inner.get_mut(job_id)?;
        job.state = JobState::Active;
        job.attempts += 1;
        job.started_at = Some(now);
        job.updated_at = now;
        Ok(Some(job.clone()))
    }

    async fn mark_completed(&self, job_id: JobId) -> Result<Job> {
        let mut inner = self.inner.write().await;
        let job = inner.get_mut(job_id)?;
        job.state = JobState::Completed;
        job.started_at = None;
        job.updated_at = Utc::now();
        let job = job.clone();
        inner.completed_log.push_back(job_id);
        Ok(job)
    }

    async fn mark_failed(&self, job_id: JobId, reason: &str) -> Result<Job> {
        let mut inner = self.inner.write().await;
        let job = inner.get_mut(job_id)?;
        job.state = JobState::Failed;
        job.failure_reason = Some(reason.to_string());
        job.started_at = None;
        job.updated_at = Utc::now();
        let job = job.clone();
        inner.failed_log.push_back(job_id);
        Ok(job)
    }

    async fn reschedule(
        &self,
        job_id: JobId,
        available_at: DateTime<Utc>,
        reason: &str,
    ) -> Result<Job> {
        let mut inner = self.inner.write().await;
        let job = inner.get_mut(job_id)?;
        job.state = JobState::Delayed;
        job.failure_reason = Some(reason.to_string());
        job.available_at = available_at;
        job.started_at = None;
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    async fn return_to_waiting(&self, job_id: JobId) -> Result<Job> {
        let mut inner = self.inner.write().await;
        let job = inner.get_mut(job_id)?;
        job.state = JobState::Waiting;
        job.started_at = None;
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    async fn stalled_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<Job>> {
        let inner = self.inner.read().await;
        Ok(inner
            .jobs
            .values()
            .filter(|j| {
                j.state == JobState::Active
                    && j.started_at.is_some_and(|started| started < cutoff)
            })
            .cloned()
            .collect())
    }

    async fn counts(&self) -> Result<JobCounts> {
        let inner = self.inner.read().await;
        let mut counts = JobCounts::default();
        for job in inner.jobs.values() {
            match job.state {
                JobState::Waiting => counts.waiting += 1,
                JobState::Active => counts.active += 1,
                JobState::Delayed => counts.delayed += 1,
                JobState::Completed => counts.completed += 1,
                JobState::Failed => counts.failed += 1,
            }
        }
        Ok(counts)
    }

    async fn list_state(&self, state: JobState, limit: usize) -> Result<Vec<Job>> {
        let inner = self.inner.read().await;
        let mut jobs: Vec<_> = inner
            .jobs
            .values()
            .filter(|j| j.state == state)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        jobs.truncate(limit);
        Ok(jobs)
    }

    async fn apply_retention(&self, retention: &Retention) -> Result<()> {
        let mut inner = self.inner.write().await;
        while inner.completed_log.len() > retention.completed {
            if let Some(evicted) = inner.completed_log.pop_front() {
                inner.jobs.remove(&evicted);
            }
        }
        while inner.failed_log.len() > retention.failed {
            if let Some(evicted) = inner.failed_log.pop_front() {
                inner.jobs.remove(&evicted);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_PRIORITY;

    fn make_job(priority: u32) -> Job {
        let now = Utc::now();
        Job {
            id: JobId::new(),
            queue: "orders".to_string(),
            payload: serde_json::json!({}),
            priority,
            attempts: 0,
            max_attempts: 5,
            state: JobState::Waiting,
            failure_reason: None,
            enqueued_seq: 0,
            available_at: now,
            started_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn insert_assigns_increasing_sequence() {
        let store = InMemoryJobStore::new();
        let a = store.insert(make_job(DEFAULT_PRIORITY)).await.unwrap();
        let b = store.insert(make_job(DEFAULT_PRIORITY)).await.unwrap();
        assert!(a.enqueued_seq < b.enqueued_seq);
    }

    #[tokio::test]
    async fn claim_is_fifo_within_a_class() {
        let store = InMemoryJobStore::new();
        let first = store.insert(make_job(DEFAULT_PRIORITY)).await.unwrap();
        let second = store.insert(make_job(DEFAULT_PRIORITY)).await.unwrap();

        let claimed = store.claim_next(Utc::now()).await.unwrap().unwrap();
        assert_eq!(claimed.id, first.id);
        let claimed = store.claim_next(Utc::now()).await.unwrap().unwrap();
        assert_eq!(claimed.id, second.id);
    }

    #[tokio::test]
    async fn claim_prefers_lower_priority_value() {
        let store = InMemoryJobStore::new();
        store.insert(make_job(DEFAULT_PRIORITY)).await.unwrap();
        let vip = store.insert(make_job(1)).await.unwrap();

        let claimed = store.claim_next(Utc::now()).await.unwrap().unwrap();
        assert_eq!(claimed.id, vip.id);
    }

    #[tokio::test]
    async fn claim_increments_attempts_and_sets_started_at() {
        let store = InMemoryJobStore::new();
        store.insert(make_job(DEFAULT_PRIORITY)).await.unwrap();

        let claimed = store.claim_next(Utc::now()).await.unwrap().unwrap();
        assert_eq!(claimed.state, JobState::Active);
        assert_eq!(claimed.attempts, 1);
        assert!(claimed.started_at.is_some());
    }

    #[tokio::test]
    async fn delayed_jobs_are_not_claimable_until_due() {
        let store = InMemoryJobStore::new();
        let job = store.insert(make_job(DEFAULT_PRIORITY)).await.unwrap();
        let claimed = store.claim_next(Utc::now()).await.unwrap().unwrap();

        let due = Utc::now() + chrono::Duration::seconds(2);
        store.reschedule(claimed.id, due, "transient").await.unwrap();

        assert!(store.claim_next(Utc::now()).await.unwrap().is_none());

        let promoted = store.promote_due(due).await.unwrap();
        assert_eq!(promoted.len(), 1);
        assert_eq!(promoted[0].id, job.id);
        let claimed = store.claim_next(due).await.unwrap().unwrap();
        assert_eq!(claimed.attempts, 2);
    }

    #[tokio::test]
    async fn stalled_since_finds_overrunning_actives() {
        let store = InMemoryJobStore::new();
        store.insert(make_job(DEFAULT_PRIORITY)).await.unwrap();
        let claimed = store.claim_next(Utc::now()).await.unwrap().unwrap();

        let cutoff = Utc::now() + chrono::Duration::seconds(1);
        let stalled = store.stalled_since(cutoff).await.unwrap();
        assert_eq!(stalled.len(), 1);
        assert_eq!(stalled[0].id, claimed.id);

        let returned = store.return_to_waiting(claimed.id).await.unwrap();
        assert_eq!(returned.state, JobState::Waiting);
        assert!(returned.started_at.is_none());
    }

    #[tokio::test]
    async fn retention_evicts_oldest_terminal_jobs() {
        let store = InMemoryJobStore::new();
        let retention = Retention {
            completed: 2,
            failed: 1,
        };

        let mut completed_ids = Vec::new();
        for _ in 0..3 {
            let job = store.insert(make_job(DEFAULT_PRIORITY)).await.unwrap();
            store.claim_next(Utc::now()).await.unwrap();
            store.mark_completed(job.id).await.unwrap();
            completed_ids.push(job.id);
        }
        let mut failed_ids = Vec::new();
        for _ in 0..2 {
            let job = store.insert(make_job(DEFAULT_PRIORITY)).await.unwrap();
            store.claim_next(Utc::now()).await.unwrap();
            store.mark_failed(job.id, "boom").await.unwrap();
            failed_ids.push(job.id);
        }

        store.apply_retention(&retention).await.unwrap();

        assert!(store.get(completed_ids[0]).await.unwrap().is_none());
        assert!(store.get(completed_ids[2]).await.unwrap().is_some());
        assert!(store.get(failed_ids[0]).await.unwrap().is_none());
        assert!(store.get(failed_ids[1]).await.unwrap().is_some());

        let counts = store.counts().await.unwrap();
        assert_eq!(counts.completed, 2);
        assert_eq!(counts.failed, 1);
    }

    #[tokio::test]
    async fn concurrent_claims_never_hand_out_the_same_job() {
        let store = InMemoryJobStore::new();
        for _ in 0..4 {
            store.insert(make_job(DEFAULT_PRIORITY)).await.unwrap();
        }

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.claim_next(Utc::now()).await })
            })
            .collect();

        let mut claimed = std::collections::HashSet::new();
        let mut handed_out = 0;
        for handle in handles {
            if let Some(job) = handle.await.unwrap().unwrap() {
                claimed.insert(job.id);
                handed_out += 1;
            }
        }

        assert_eq!(handed_out, 4);
        assert_eq!(claimed.len(), 4);
    }
}
