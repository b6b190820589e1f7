//! PostgreSQL-backed implementation of the crawl queue store.
//!
//! Claiming uses `FOR UPDATE SKIP LOCKED` so concurrent workers never
//! double-claim a job; holder-only writes are guarded in SQL by matching
//! both `state = 'active'` and `locked_by`.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::job::{CrawlJob, CrawlPayload, CrawlProgress, Document, JobError, JobResult, JobState};
use super::store::{JobStore, RecoveryStore};

const JOB_COLUMNS: &str =
    "id, payload, state, locked_by, progress, result, created_at, finished_at";

pub struct PostgresJobStore {
    pool: PgPool,
}

impl PostgresJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl JobStore for PostgresJobStore {
    async fn enqueue(&self, id: Uuid, payload: CrawlPayload) -> Result<Uuid> {
        let payload = serde_json::to_value(&payload)?;

        sqlx::query(
            r#"
            INSERT INTO crawl_jobs (id, payload, state, created_at)
            VALUES ($1, $2, 'waiting', NOW())
            "#,
        )
        .bind(id)
        .bind(payload)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn claim(&self, worker_id: &str, limit: i64) -> Result<Vec<CrawlJob>> {
        let jobs = sqlx::query_as::<_, CrawlJob>(&format!(
            r#"
            WITH next_jobs AS (
                SELECT id
                FROM crawl_jobs
                WHERE state = 'waiting'
                ORDER BY created_at
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE crawl_jobs
            SET state = 'active',
                locked_by = $2
            WHERE id IN (SELECT id FROM next_jobs)
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(limit)
        .bind(worker_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(jobs)
    }

    async fn find(&self, job_id: Uuid) -> Result<Option<CrawlJob>> {
        let job = sqlx::query_as::<_, CrawlJob>(&format!(
            "SELECT {JOB_COLUMNS} FROM crawl_jobs WHERE id = $1"
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }

    async fn update_progress(
        &self,
        job_id: Uuid,
        worker_id: &str,
        progress: &CrawlProgress,
    ) -> Result<()> {
        let progress = serde_json::to_value(progress)?;

        let result = sqlx::query(
            r#"
            UPDATE crawl_jobs
            SET progress = $3
            WHERE id = $1 AND state = 'active' AND locked_by = $2
            "#,
        )
        .bind(job_id)
        .bind(worker_id)
        .bind(progress)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            bail!("progress write refused for job {job_id}: not the lock holder");
        }
        Ok(())
    }

    async fn complete(&self, job_id: Uuid, worker_id: &str, documents: &[Document]) -> Result<()> {
        let result = serde_json::to_value(JobResult::Documents {
            documents: documents.to_vec(),
        })?;

        let updated = sqlx::query(
            r#"
            UPDATE crawl_jobs
            SET state = 'completed',
                locked_by = NULL,
                progress = NULL,
                result = $3,
                finished_at = NOW()
            WHERE id = $1 AND state = 'active' AND locked_by = $2
            "#,
        )
        .bind(job_id)
        .bind(worker_id)
        .bind(result)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            bail!("terminal transition refused for job {job_id}: not the lock holder");
        }
        Ok(())
    }

    async fn fail(&self, job_id: Uuid, worker_id: &str, error: &JobError) -> Result<()> {
        let result = serde_json::to_value(JobResult::Error {
            error: error.clone(),
        })?;

        let updated = sqlx::query(
            r#"
            UPDATE crawl_jobs
            SET state = 'failed',
                locked_by = NULL,
                progress = NULL,
                result = $3,
                finished_at = NOW()
            WHERE id = $1 AND state = 'active' AND locked_by = $2
            "#,
        )
        .bind(job_id)
        .bind(worker_id)
        .bind(result)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            bail!("terminal transition refused for job {job_id}: not the lock holder");
        }
        Ok(())
    }

    async fn list_by_state(&self, state: JobState, limit: i64) -> Result<Vec<CrawlJob>> {
        let jobs = sqlx::query_as::<_, CrawlJob>(&format!(
            r#"
            SELECT {JOB_COLUMNS}
            FROM crawl_jobs
            WHERE state = $1
            ORDER BY created_at
            LIMIT $2
            "#
        ))
        .bind(state)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(jobs)
    }

    async fn count_by_state(&self, state: JobState) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM crawl_jobs WHERE state = $1",
        )
        .bind(state)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn delete_completed_before(
        &self,
        cutoff: DateTime<Utc>,
        batch_size: i64,
        max_batches: u32,
    ) -> Result<u64> {
        let mut removed = 0u64;

        for _ in 0..max_batches {
            let batch = sqlx::query(
                r#"
                DELETE FROM crawl_jobs
                WHERE id IN (
                    SELECT id
                    FROM crawl_jobs
                    WHERE state = 'completed' AND finished_at < $1
                    ORDER BY finished_at
                    LIMIT $2
                )
                "#,
            )
            .bind(cutoff)
            .bind(batch_size)
            .execute(&self.pool)
            .await?
            .rows_affected();

            removed += batch;
            if batch < batch_size as u64 {
                break;
            }
        }

        Ok(removed)
    }
}

#[async_trait]
impl RecoveryStore for PostgresJobStore {
    async fn force_release(&self, job_id: Uuid, error: &JobError) -> Result<()> {
        let result = serde_json::to_value(JobResult::Error {
            error: error.clone(),
        })?;

        // Bypasses the locked_by guard: only the recovery controller calls
        // this, and only while workers are paused.
        let updated = sqlx::query(
            r#"
            UPDATE crawl_jobs
            SET state = 'failed',
                locked_by = NULL,
                progress = NULL,
                result = $2,
                finished_at = NOW()
            WHERE id = $1 AND state = 'active'
            "#,
        )
        .bind(job_id)
        .bind(result)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            bail!("job {job_id} is no longer active");
        }
        Ok(())
    }

    async fn remove(&self, job_id: Uuid) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM crawl_jobs WHERE id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }
}
