// crates/plinth/src/jobs/store/postgres.rs

use crate::jobs::{
    error::StoreError,
    model::{Job, JobState, NewJob, StateCounts},
    store::JobStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// Postgres-backed job table.
#[derive(Clone)]
pub struct JobsRepo {
    pool: PgPool,
}

impl JobsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl JobStore for JobsRepo {
    // ----------------------------
    // Enqueue
    // ----------------------------

    async fn insert(&self, job: NewJob) -> Result<Job, StoreError> {
        let row = sqlx::query_as::<_, Job>(
            r#"
            INSERT INTO jobs (job_type, payload, state, attempts, available_at, created_at)
            VALUES ($1, $2, $3, 0, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&job.job_type)
        .bind(&job.payload)
        .bind(JobState::Pending.as_str())
        .bind(job.available_at)
        .bind(job.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    // ----------------------------
    // Reads
    // ----------------------------

    async fn get(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        let job = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(job)
    }

    async fn next_due(&self, now: DateTime<Utc>) -> Result<Option<Job>, StoreError> {
        let job = sqlx::query_as::<_, Job>(
            r#"
            SELECT *
            FROM jobs
            WHERE state = 'pending'
              AND available_at <= $1
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            "#,
        )
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }

    async fn counts(&self) -> Result<StateCounts, StoreError> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT state, COUNT(*) FROM jobs GROUP BY state",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut counts = StateCounts::default();
        for (state, n) in rows {
            let state: JobState = state
                .parse()
                .map_err(|e| StoreError::InvalidRow(format!("{e}")))?;
            counts.add(state, n);
        }
        Ok(counts)
    }

    async fn list(&self, state: Option<JobState>, limit: i64) -> Result<Vec<Job>, StoreError> {
        let limit = limit.clamp(1, 500);

        let rows = sqlx::query_as::<_, Job>(
            r#"
            SELECT *
            FROM jobs
            WHERE ($1::text IS NULL OR state = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(state.map(|s| s.as_str()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    // ----------------------------
    // State transitions
    // ----------------------------

    /// The `state = 'pending'` guard makes this the single point where two
    /// workers racing for one row are separated: only one UPDATE matches.
    async fn claim(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<Job>, StoreError> {
        let job = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET state = 'started',
                started_at = $2,
                attempts = attempts + 1
            WHERE id = $1
              AND state = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }

    async fn mark_finished(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let res = sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'finished',
                finished_at = $2
            WHERE id = $1
              AND state = 'started'
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected() == 1)
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        from: JobState,
        error_message: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let res = sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'failed',
                error_message = $3,
                finished_at = $4
            WHERE id = $1
              AND state = $2
            "#,
        )
        .bind(id)
        .bind(from.as_str())
        .bind(error_message)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected() == 1)
    }

    async fn release_for_retry(
        &self,
        id: Uuid,
        error_message: &str,
        available_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let res = sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'pending',
                error_message = $2,
                available_at = $3
            WHERE id = $1
              AND state = 'started'
            "#,
        )
        .bind(id)
        .bind(error_message)
        .bind(available_at)
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected() == 1)
    }

    // ----------------------------
    // Maintenance
    // ----------------------------

    async fn recover_stale(
        &self,
        started_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let res = sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'pending',
                available_at = $2
            WHERE state = 'started'
              AND started_at IS NOT NULL
              AND started_at < $1
            "#,
        )
        .bind(started_before)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected())
    }
}
