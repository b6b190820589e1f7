//! Store traits for the shared crawl queue.
//!
//! The backing store is the single source of truth: all coordination between
//! worker processes (mutual exclusion over a job, visibility of progress and
//! results) goes through it. Implementations must make `claim` atomic so
//! that at most one worker ever holds a given job's lock.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::job::{CrawlJob, CrawlPayload, CrawlProgress, Document, JobError, JobState};

/// General job access, shared by the executor, the queue consumer, and the
/// HTTP surface.
///
/// Mutating operations that take a `worker_id` are holder-only: they must
/// refuse to touch a job unless the caller currently holds its lock.
/// Terminal transitions (`complete`, `fail`) are write-once — re-attempting
/// one is rejected.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Atomically insert a fresh waiting job.
    async fn enqueue(&self, id: Uuid, payload: CrawlPayload) -> Result<Uuid>;

    /// Atomically move up to `limit` waiting jobs to active under
    /// `worker_id`'s lock. Jobs another worker claimed concurrently are
    /// skipped, never double-claimed.
    async fn claim(&self, worker_id: &str, limit: i64) -> Result<Vec<CrawlJob>>;

    async fn find(&self, job_id: Uuid) -> Result<Option<CrawlJob>>;

    /// Overwrite the job's progress snapshot. Holder-only.
    async fn update_progress(
        &self,
        job_id: Uuid,
        worker_id: &str,
        progress: &CrawlProgress,
    ) -> Result<()>;

    /// Transition active → completed with the final document set.
    /// Holder-only, write-once.
    async fn complete(&self, job_id: Uuid, worker_id: &str, documents: &[Document]) -> Result<()>;

    /// Transition active → failed with an error descriptor.
    /// Holder-only, write-once.
    async fn fail(&self, job_id: Uuid, worker_id: &str, error: &JobError) -> Result<()>;

    async fn list_by_state(&self, state: JobState, limit: i64) -> Result<Vec<CrawlJob>>;

    async fn count_by_state(&self, state: JobState) -> Result<i64>;

    /// Retention sweep: scan up to `max_batches` batches of completed jobs
    /// and delete those finished strictly before `cutoff`. Returns the
    /// number removed.
    async fn delete_completed_before(
        &self,
        cutoff: DateTime<Utc>,
        batch_size: i64,
        max_batches: u32,
    ) -> Result<u64>;
}

/// Privileged operations reserved for the recovery controller.
///
/// `force_release` bypasses the holder-only check. It is only safe while no
/// executor is believed to be running, so it is kept off [`JobStore`] — code
/// holding a `dyn JobStore` cannot reach it.
#[async_trait]
pub trait RecoveryStore: Send + Sync {
    /// Forcibly clear the job's lock and mark it failed with `error`.
    async fn force_release(&self, job_id: Uuid, error: &JobError) -> Result<()>;

    /// Delete the job record outright. Returns false if it was already gone.
    async fn remove(&self, job_id: Uuid) -> Result<bool>;
}
