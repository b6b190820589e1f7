//! In-memory implementation of the crawl queue store.
//!
//! Used by the test harness and by local runs without a database. Semantics
//! match [`PostgresJobStore`]: FIFO claiming with exactly one claimer per
//! job, holder-only writes, write-once terminal transitions. A single mutex
//! over the whole map makes every operation atomic.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::job::{
    CrawlJob, CrawlPayload, CrawlProgress, Document, JobError, JobResult, JobState,
};
use super::store::{JobStore, RecoveryStore};

#[derive(Default)]
struct Inner {
    jobs: HashMap<Uuid, CrawlJob>,
    /// Enqueue order; ids of removed jobs are skipped during claims.
    order: Vec<Uuid>,
}

#[derive(Clone, Default)]
pub struct InMemoryJobStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: total number of records, any state.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.jobs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Test hook: backdate a completed job's `finished_at` for retention
    /// sweep scenarios.
    pub async fn set_finished_at(&self, job_id: Uuid, finished_at: DateTime<Utc>) {
        if let Some(job) = self.inner.lock().await.jobs.get_mut(&job_id) {
            job.finished_at = Some(finished_at);
        }
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn enqueue(&self, id: Uuid, payload: CrawlPayload) -> Result<Uuid> {
        let mut inner = self.inner.lock().await;
        if inner.jobs.contains_key(&id) {
            bail!("job {id} already exists");
        }
        inner.jobs.insert(id, CrawlJob::waiting(id, payload));
        inner.order.push(id);
        Ok(id)
    }

    async fn claim(&self, worker_id: &str, limit: i64) -> Result<Vec<CrawlJob>> {
        let mut inner = self.inner.lock().await;
        let mut claimed = Vec::new();

        let waiting: Vec<Uuid> = inner
            .order
            .iter()
            .filter(|id| {
                inner
                    .jobs
                    .get(*id)
                    .is_some_and(|j| j.state == JobState::Waiting)
            })
            .take(limit.max(0) as usize)
            .copied()
            .collect();

        for id in waiting {
            let job = inner.jobs.get_mut(&id).expect("listed above");
            job.state = JobState::Active;
            job.locked_by = Some(worker_id.to_string());
            claimed.push(job.clone());
        }

        Ok(claimed)
    }

    async fn find(&self, job_id: Uuid) -> Result<Option<CrawlJob>> {
        Ok(self.inner.lock().await.jobs.get(&job_id).cloned())
    }

    async fn update_progress(
        &self,
        job_id: Uuid,
        worker_id: &str,
        progress: &CrawlProgress,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        match inner.jobs.get_mut(&job_id) {
            Some(job) if job.locked_by_worker(worker_id) => {
                job.progress = Some(progress.clone());
                Ok(())
            }
            _ => bail!("progress write refused for job {job_id}: not the lock holder"),
        }
    }

    async fn complete(&self, job_id: Uuid, worker_id: &str, documents: &[Document]) -> Result<()> {
        let mut inner = self.inner.lock().await;
        match inner.jobs.get_mut(&job_id) {
            Some(job) if job.locked_by_worker(worker_id) => {
                job.state = JobState::Completed;
                job.locked_by = None;
                job.progress = None;
                job.result = Some(JobResult::Documents {
                    documents: documents.to_vec(),
                });
                job.finished_at = Some(Utc::now());
                Ok(())
            }
            _ => bail!("terminal transition refused for job {job_id}: not the lock holder"),
        }
    }

    async fn fail(&self, job_id: Uuid, worker_id: &str, error: &JobError) -> Result<()> {
        let mut inner = self.inner.lock().await;
        match inner.jobs.get_mut(&job_id) {
            Some(job) if job.locked_by_worker(worker_id) => {
                job.state = JobState::Failed;
                job.locked_by = None;
                job.progress = None;
                job.result = Some(JobResult::Error {
                    error: error.clone(),
                });
                job.finished_at = Some(Utc::now());
                Ok(())
            }
            _ => bail!("terminal transition refused for job {job_id}: not the lock holder"),
        }
    }

    async fn list_by_state(&self, state: JobState, limit: i64) -> Result<Vec<CrawlJob>> {
        let inner = self.inner.lock().await;
        let jobs = inner
            .order
            .iter()
            .filter_map(|id| inner.jobs.get(id))
            .filter(|j| j.state == state)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();
        Ok(jobs)
    }

    async fn count_by_state(&self, state: JobState) -> Result<i64> {
        let inner = self.inner.lock().await;
        Ok(inner.jobs.values().filter(|j| j.state == state).count() as i64)
    }

    async fn delete_completed_before(
        &self,
        cutoff: DateTime<Utc>,
        batch_size: i64,
        max_batches: u32,
    ) -> Result<u64> {
        let mut inner = self.inner.lock().await;
        let budget = (batch_size.max(0) as u64) * u64::from(max_batches);

        let expired: Vec<Uuid> = inner
            .jobs
            .values()
            .filter(|j| {
                j.state == JobState::Completed
                    && j.finished_at.is_some_and(|finished| finished < cutoff)
            })
            .take(budget as usize)
            .map(|j| j.id)
            .collect();

        for id in &expired {
            inner.jobs.remove(id);
            inner.order.retain(|existing| existing != id);
        }

        Ok(expired.len() as u64)
    }
}

#[async_trait]
impl RecoveryStore for InMemoryJobStore {
    async fn force_release(&self, job_id: Uuid, error: &JobError) -> Result<()> {
        let mut inner = self.inner.lock().await;
        match inner.jobs.get_mut(&job_id) {
            Some(job) if job.state == JobState::Active => {
                job.state = JobState::Failed;
                job.locked_by = None;
                job.progress = None;
                job.result = Some(JobResult::Error {
                    error: error.clone(),
                });
                job.finished_at = Some(Utc::now());
                Ok(())
            }
            Some(_) => bail!("job {job_id} is no longer active"),
            None => bail!("job {job_id} is no longer active"),
        }
    }

    async fn remove(&self, job_id: Uuid) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        inner.order.retain(|existing| *existing != job_id);
        Ok(inner.jobs.remove(&job_id).is_some())
    }
}
