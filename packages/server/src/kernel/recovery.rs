//! Recovery controller: repairs jobs orphaned by a dead worker.
//!
//! Jobs stuck in `active` after a crash are not auto-detected; an operator
//! (or `/unpause`) invokes reclaim-and-requeue explicitly, after ensuring
//! no live worker is still processing them. For each orphan: force-release
//! the lock, fail it as interrupted, delete the record, and enqueue a fresh
//! waiting job with the same payload under the same external id — callers
//! polling by id observe continuity.

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use super::queue::{CrawlJob, JobError, JobState, JobStore, RecoveryStore};

/// Upper bound on active jobs scanned per invocation.
const RECLAIM_SCAN_LIMIT: i64 = 1000;

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ReclaimSummary {
    /// Jobs force-released and requeued.
    pub requeued: u64,
    /// Jobs skipped because their reclamation failed (e.g. the record
    /// disappeared concurrently).
    pub skipped: u64,
}

pub struct RecoveryController {
    jobs: Arc<dyn JobStore>,
    admin: Arc<dyn RecoveryStore>,
}

impl RecoveryController {
    pub fn new(jobs: Arc<dyn JobStore>, admin: Arc<dyn RecoveryStore>) -> Self {
        Self { jobs, admin }
    }

    /// Reclaim every active job and requeue an equivalent fresh one.
    ///
    /// Per-job errors are logged and skipped; they never abort the rest of
    /// the batch. Not safe to run concurrently with live workers — pause
    /// them first.
    pub async fn reclaim_and_requeue(&self) -> Result<ReclaimSummary> {
        let active = self
            .jobs
            .list_by_state(JobState::Active, RECLAIM_SCAN_LIMIT)
            .await?;

        let mut summary = ReclaimSummary::default();
        for job in active {
            let job_id = job.id;
            match self.reclaim_one(job).await {
                Ok(()) => summary.requeued += 1,
                Err(e) => {
                    warn!(job_id = %job_id, error = %e, "failed to reclaim job, skipping");
                    summary.skipped += 1;
                }
            }
        }

        info!(
            requeued = summary.requeued,
            skipped = summary.skipped,
            "reclaim-and-requeue finished"
        );
        Ok(summary)
    }

    async fn reclaim_one(&self, job: CrawlJob) -> Result<()> {
        let CrawlJob { id, payload, .. } = job;

        self.admin.force_release(id, &JobError::interrupted()).await?;
        // Remove before re-inserting so the external id is never duplicated.
        self.admin.remove(id).await?;
        self.jobs.enqueue(id, payload).await?;

        info!(job_id = %id, "reclaimed interrupted job");
        Ok(())
    }
}
