use std::sync::Arc;

use chrono::Utc;
use common::JobId;
use tokio::sync::Notify;

use crate::{
    Job, JobOptions, JobState, QueueConfig, QueueSubscriber, Result,
    store::{JobCounts, JobStore},
    worker::JobOutcome,
};

/// A durable priority queue.
///
/// Owns all job state transitions and emits lifecycle events to registered
/// subscribers around them. Workers interact through [`crate::WorkerPool`];
/// producers through [`Queue::enqueue`].
pub struct Queue {
    config: QueueConfig,
    store: Arc<dyn JobStore>,
    subscribers: Vec<Arc<dyn QueueSubscriber>>,
    notify: Notify,
}

impl Queue {
    /// Creates a queue over the given durable store.
    pub fn new(store: Arc<dyn JobStore>, config: QueueConfig) -> Self {
        Self {
            config,
            store,
            subscribers: Vec::new(),
            notify: Notify::new(),
        }
    }

    /// Registers a lifecycle subscriber. Subscribers are invoked in
    /// registration order.
    pub fn subscribe(&mut self, subscriber: Arc<dyn QueueSubscriber>) {
        self.subscribers.push(subscriber);
    }

    /// Returns the queue configuration.
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Returns per-state job counts.
    pub async fn counts(&self) -> Result<JobCounts> {
        self.store.counts().await
    }

    /// Loads a job by ID.
    pub async fn get_job(&self, job_id: JobId) -> Result<Option<Job>> {
        self.store.get(job_id).await
    }

    /// Lists jobs in a state, most recently updated first.
    pub async fn list_state(&self, state: JobState, limit: usize) -> Result<Vec<Job>> {
        self.store.list_state(state, limit).await
    }

    /// Enqueues a job with the given payload and options.
    ///
    /// The job starts `waiting` and becomes eligible for dispatch
    /// immediately; one idle worker is woken.
    #[tracing::instrument(skip(self, payload), fields(queue = %self.config.name))]
    pub async fn enqueue(&self, payload: serde_json::Value, options: JobOptions) -> Result<Job> {
        let now = Utc::now();
        let job = Job {
            id: JobId::new(),
            queue: self.config.name.clone(),
            payload,
            priority: options.priority,
            attempts: 0,
            max_attempts: options.max_attempts.unwrap_or(self.config.max_attempts),
            state: JobState::Waiting,
            failure_reason: None,
            enqueued_seq: 0,
            available_at: now,
            started_at: None,
            created_at: now,
            updated_at: now,
        };

        let job = self.store.insert(job).await?;
        metrics::counter!("queue_jobs_enqueued").increment(1);
        tracing::debug!(job_id = %job.id, priority = job.priority, "job enqueued");

        self.emit_waiting(&job).await;
        self.notify.notify_one();
        Ok(job)
    }

    /// Promotes due delayed jobs, then claims the next dispatchable one.
    ///
    /// Promotion re-emits `waiting` so subscribers observe the full
    /// lifecycle; a claim emits `active`.
    pub(crate) async fn next_job(&self) -> Result<Option<Job>> {
        let now = Utc::now();
        let promoted = self.store.promote_due(now).await?;
        for job in &promoted {
            self.emit_waiting(job).await;
        }
        if promoted.len() > 1 {
            // More work than the one claim below; wake another worker.
            self.notify.notify_one();
        }

        let claimed = self.store.claim_next(now).await?;
        if let Some(ref job) = claimed {
            self.emit_active(job).await;
        }
        Ok(claimed)
    }

    /// Applies a handler outcome to a claimed job.
    ///
    /// `Completed` acknowledges, `Discard` short-circuits straight to the
    /// failed set, and `Retry` parks the job with backoff until attempts
    /// are exhausted, at which point it fails.
    pub(crate) async fn finish(&self, job: &Job, outcome: JobOutcome) -> Result<()> {
        match outcome {
            JobOutcome::Completed => {
                let job = self.store.mark_completed(job.id).await?;
                self.store.apply_retention(&self.config.retention).await?;
                metrics::counter!("queue_jobs_completed").increment(1);
                self.emit_completed(&job).await;
            }
            JobOutcome::Discard(reason) => {
                let job = self.store.mark_failed(job.id, &reason).await?;
                self.store.apply_retention(&self.config.retention).await?;
                metrics::counter!("queue_jobs_failed").increment(1);
                tracing::warn!(job_id = %job.id, %reason, "job discarded to failed set");
                self.emit_failed(&job, &reason).await;
            }
            JobOutcome::Retry(error) => {
                if job.attempts_exhausted() {
                    let job = self.store.mark_failed(job.id, &error).await?;
                    self.store.apply_retention(&self.config.retention).await?;
                    metrics::counter!("queue_jobs_failed").increment(1);
                    tracing::warn!(
                        job_id = %job.id,
                        attempts = job.attempts,
                        error = %error,
                        "job failed after exhausting retries"
                    );
                    self.emit_failed(&job, &error).await;
                } else {
                    let delay = self.config.backoff.delay_for(job.attempts);
                    let available_at = Utc::now()
                        + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::MAX);
                    self.store.reschedule(job.id, available_at, &error).await?;
                    metrics::counter!("queue_jobs_retried").increment(1);
                    tracing::debug!(
                        job_id = %job.id,
                        attempt = job.attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "job rescheduled with backoff"
                    );
                }
            }
        }
        Ok(())
    }

    /// Returns a stalled active job to waiting and notifies subscribers.
    pub(crate) async fn mark_stalled(&self, job: &Job) -> Result<()> {
        let job = self.store.return_to_waiting(job.id).await?;
        metrics::counter!("queue_jobs_stalled").increment(1);
        tracing::warn!(job_id = %job.id, attempts = job.attempts, "job stalled, redelivering");
        self.emit_stalled(&job).await;
        self.notify.notify_one();
        Ok(())
    }

    /// Scans for active jobs that exceeded the stall timeout and returns
    /// them to waiting. Covers handlers that outlive their soft timeout and
    /// jobs orphaned by a crashed process.
    pub async fn recover_stalled(&self) -> Result<usize> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.config.stall_timeout)
                .unwrap_or(chrono::Duration::MAX);
        let stalled = self.store.stalled_since(cutoff).await?;
        let recovered = stalled.len();
        for job in &stalled {
            self.mark_stalled(job).await?;
        }
        Ok(recovered)
    }

    /// Parks the caller until a job is enqueued or the poll tick elapses.
    pub(crate) async fn wait_for_job(&self) {
        tokio::select! {
            () = self.notify.notified() => {}
            () = tokio::time::sleep(self.config.poll_interval) => {}
        }
    }

    async fn emit_waiting(&self, job: &Job) {
        for subscriber in &self.subscribers {
            subscriber.on_waiting(job).await;
        }
    }

    async fn emit_active(&self, job: &Job) {
        for subscriber in &self.subscribers {
            subscriber.on_active(job).await;
        }
    }

    async fn emit_completed(&self, job: &Job) {
        for subscriber in &self.subscribers {
            subscriber.on_completed(job).await;
        }
    }

    async fn emit_failed(&self, job: &Job, reason: &str) {
        for subscriber in &self.subscribers {
            subscriber.on_failed(job, reason).await;
        }
    }

    async fn emit_stalled(&self, job: &Job) {
        for subscriber in &self.subscribers {
            subscriber.on_stalled(job).await;
        }
    }
}
