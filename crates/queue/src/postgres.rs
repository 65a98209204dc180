use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::JobId;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Job, JobState, QueueError, Result, Retention,
    store::{JobCounts, JobStore},
};

/// PostgreSQL-backed job store.
///
/// Claims use `FOR UPDATE SKIP LOCKED` so concurrent workers (including
/// workers in other processes) never receive the same job. Jobs left
/// `active` by a crashed process are picked up by the stall scan once the
/// stall timeout has passed.
#[derive(Clone)]
pub struct PostgresJobStore {
    pool: PgPool,
    queue: String,
}

impl PostgresJobStore {
    /// Creates a job store bound to a queue name.
    pub fn new(pool: PgPool, queue: impl Into<String>) -> Self {
        Self {
            pool,
            queue: queue.into(),
        }
    }

    fn row_to_job(row: PgRow) -> Result<Job> {
        let state_str: String = row.try_get("state")?;
        let state = match state_str.as_str() {
            "waiting" => JobState::Waiting,
            "active" => JobState::Active,
            "delayed" => JobState::Delayed,
            "completed" => JobState::Completed,
            _ => JobState::Failed,
        };

        Ok(Job {
            id: JobId::from_uuid(row.try_get::<Uuid, _>("id")?),
            queue: row.try_get("queue")?,
            payload: row.try_get("payload")?,
            priority: row.try_get::<i64, _>("priority")? as u32,
            attempts: row.try_get::<i64, _>("attempts")? as u32,
            max_attempts: row.try_get::<i64, _>("max_attempts")? as u32,
            state,
            failure_reason: row.try_get("failure_reason")?,
            enqueued_seq: row.try_get::<i64, _>("enqueued_seq")? as u64,
            available_at: row.try_get("available_at")?,
            started_at: row.try_get("started_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn fetch_required(&self, job_id: JobId) -> Result<Job> {
        self.get(job_id)
            .await?
            .ok_or(QueueError::JobNotFound(job_id))
    }
}

const JOB_COLUMNS: &str = "id, queue, payload, priority, attempts, max_attempts, state, \
                           failure_reason, enqueued_seq, available_at, started_at, \
                           created_at, updated_at";

#[async_trait]
impl JobStore for PostgresJobStore {
    async fn insert(&self, job: Job) -> Result<Job> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO jobs (id, queue, payload, priority, attempts, max_attempts, state,
                              failure_reason, available_at, started_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(job.id.as_uuid())
        .bind(&job.queue)
        .bind(&job.payload)
        .bind(job.priority as i64)
        .bind(job.attempts as i64)
        .bind(job.max_attempts as i64)
        .bind(job.state.as_str())
        .bind(&job.failure_reason)
        .bind(job.available_at)
        .bind(job.started_at)
        .bind(job.created_at)
        .bind(job.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_job(row)
    }

    async fn get(&self, job_id: JobId) -> Result<Option<Job>> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"))
            .bind(job_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_job).transpose()
    }

    async fn promote_due(&self, now: DateTime<Utc>) -> Result<Vec<Job>> {
        let rows = sqlx::query(&format!(
            r#"
            UPDATE jobs
            SET state = 'waiting', updated_at = $2
            WHERE queue = $1 AND state = 'delayed' AND available_at <= $2
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(&self.queue)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_job).collect()
    }

    async fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<Job>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE jobs
            SET state = 'active', attempts = attempts + 1, started_at = $2, updated_at = $2
            WHERE id = (
                SELECT id FROM jobs
                WHERE queue = $1 AND state = 'waiting' AND available_at <= $2
                ORDER BY priority ASC, enqueued_seq ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(&self.queue)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_job).transpose()
    }

    async fn mark_completed(&self, job_id: JobId) -> Result<Job> {
        let updated = sqlx::query(
            "UPDATE jobs SET state = 'completed', started_at = NULL, updated_at = $2 WHERE id = $1",
        )
        .bind(job_id.as_uuid())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(QueueError::JobNotFound(job_id));
        }
        self.fetch_required(job_id).await
    }

    async fn mark_failed(&self, job_id: JobId, reason: &str) -> Result<Job> {
        let updated = sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'failed', failure_reason = $2, started_at = NULL, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(job_id.as_uuid())
        .bind(reason)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(QueueError::JobNotFound(job_id));
        }
        self.fetch_required(job_id).await
    }

    async fn reschedule(
        &self,
        job_id: JobId,
        available_at: DateTime<Utc>,
        reason: &str,
    ) -> Result<Job> {
        let updated = sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'delayed', failure_reason = $2, available_at = $3,
                started_at = NULL, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(job_id.as_uuid())
        .bind(reason)
        .bind(available_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(QueueError::JobNotFound(job_id));
        }
        self.fetch_required(job_id).await
    }

    async fn return_to_waiting(&self, job_id: JobId) -> Result<Job> {
        let updated = sqlx::query(
            "UPDATE jobs SET state = 'waiting', started_at = NULL, updated_at = $2 WHERE id = $1",
        )
        .bind(job_id.as_uuid())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(QueueError::JobNotFound(job_id));
        }
        self.fetch_required(job_id).await
    }

    async fn stalled_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<Job>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {JOB_COLUMNS} FROM jobs
            WHERE queue = $1 AND state = 'active' AND started_at < $2
            "#
        ))
        .bind(&self.queue)
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_job).collect()
    }

    async fn counts(&self) -> Result<JobCounts> {
        let rows = sqlx::query("SELECT state, COUNT(*) AS n FROM jobs WHERE queue = $1 GROUP BY state")
            .bind(&self.queue)
            .fetch_all(&self.pool)
            .await?;

        let mut counts = JobCounts::default();
        for row in rows {
            let state: String = row.try_get("state")?;
            let n: i64 = row.try_get("n")?;
            match state.as_str() {
                "waiting" => counts.waiting = n as usize,
                "active" => counts.active = n as usize,
                "delayed" => counts.delayed = n as usize,
                "completed" => counts.completed = n as usize,
                "failed" => counts.failed = n as usize,
                _ => {}
            }
        }
        Ok(counts)
    }

    async fn list_state(&self, state: JobState, limit: usize) -> Result<Vec<Job>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {JOB_COLUMNS} FROM jobs
            WHERE queue = $1 AND state = $2
            ORDER BY updated_at DESC
            LIMIT $3
            "#
        ))
        .bind(&self.queue)
        .bind(state.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_job).collect()
    }

    async fn apply_retention(&self, retention: &Retention) -> Result<()> {
        for (state, keep) in [
            ("completed", retention.completed),
            ("failed", retention.failed),
        ] {
            sqlx::query(
                r#"
                DELETE FROM jobs
                WHERE queue = $1 AND state = $2 AND id NOT IN (
                    SELECT id FROM jobs
                    WHERE queue = $1 AND state = $2
                    ORDER BY updated_at DESC
                    LIMIT $3
                )
                "#,
            )
            .bind(&self.queue)
            .bind(state)
            .bind(keep as i64)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }
}
