//! Crawl executor: runs one claimed job from pipeline start to terminal state.
//!
//! ```text
//! CrawlExecutor
//!     │
//!     ├─► normalize payload (crawl seed vs comma-separated targets)
//!     ├─► spawn pipeline, consume its event stream
//!     │       └─► per event: update progress buffer, persist, publish
//!     ├─► filter documents (URLs-only or drop empty content)
//!     ├─► billing gate (rejection overrides crawl success)
//!     └─► terminal transition (completed / failed)
//! ```
//!
//! Job-level failures never crash the worker: pipeline errors, billing
//! rejections, and store refusals all end as the job's `result`.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::progress_hub::{ProgressEvent, ProgressHub};
use super::queue::{CrawlJob, CrawlProgress, CrawlerOptions, Document, JobError, JobStore};
use super::traits::{BaseBillingService, BaseCrawlPipeline, CrawlRequest};

/// Capacity of the per-job pipeline event channel. Backpressure comes from
/// this bound rather than unbounded queuing.
const PROGRESS_CHANNEL_CAPACITY: usize = 50;

pub struct CrawlExecutor {
    store: Arc<dyn JobStore>,
    pipeline: Arc<dyn BaseCrawlPipeline>,
    billing: Arc<dyn BaseBillingService>,
    hub: ProgressHub,
    worker_id: String,
}

impl CrawlExecutor {
    pub fn new(
        store: Arc<dyn JobStore>,
        pipeline: Arc<dyn BaseCrawlPipeline>,
        billing: Arc<dyn BaseBillingService>,
        hub: ProgressHub,
        worker_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            pipeline,
            billing,
            hub,
            worker_id: worker_id.into(),
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Run a claimed job to a terminal state.
    ///
    /// The caller must hold the job's lock (i.e. the job came from this
    /// worker's `claim`).
    pub async fn execute(&self, job: CrawlJob) {
        let job_id = job.id;
        info!(job_id = %job_id, url = %job.payload.url, "executing crawl job");

        match self.drive_pipeline(&job).await {
            Ok(documents) => self.settle(job_id, &job, documents).await,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "crawl pipeline failed");
                self.fail_job(job_id, JobError::crawl_failed(e.to_string()))
                    .await;
            }
        }
    }

    /// Run the pipeline, forwarding each progress event into the job's
    /// persisted progress buffer and the live hub.
    async fn drive_pipeline(&self, job: &CrawlJob) -> Result<Vec<Document>> {
        let request = CrawlRequest::from_payload(&job.payload);
        let (tx, mut rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);

        let pipeline = Arc::clone(&self.pipeline);
        let handle = tokio::spawn(async move { pipeline.run(request, tx).await });

        let mut progress = CrawlProgress::default();
        while let Some(event) = rx.recv().await {
            progress.current_step = event.step;
            progress.total_steps = event.total;
            progress.current_document = event.document.clone();
            if let Some(document) = event.document {
                progress.push_document(document);
            }

            self.store
                .update_progress(job.id, &self.worker_id, &progress)
                .await?;
            self.hub
                .publish(ProgressEvent::snapshot(job.id, &progress))
                .await;
        }

        // The channel drained before this resolves, so the terminal
        // transition always lands after the last progress commit.
        handle.await.context("crawl pipeline task panicked")?
    }

    /// Post-crawl settlement: filtering, billing, terminal transition.
    async fn settle(&self, job_id: Uuid, job: &CrawlJob, documents: Vec<Document>) {
        // An empty crawl is not a failure.
        if documents.is_empty() {
            self.complete_job(job_id, Vec::new()).await;
            return;
        }

        let filtered = filter_documents(&job.payload.crawler_options, documents);

        match self
            .billing
            .charge(&job.payload.team_id, filtered.len())
            .await
        {
            Ok(outcome) if outcome.success => self.complete_job(job_id, filtered).await,
            Ok(outcome) => {
                let reason = outcome
                    .reason
                    .unwrap_or_else(|| "billing rejected".to_string());
                warn!(job_id = %job_id, reason = %reason, "billing rejected crawl");
                self.fail_job(job_id, JobError::billing_rejected(reason))
                    .await;
            }
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "billing charge failed");
                self.fail_job(job_id, JobError::billing_rejected(e.to_string()))
                    .await;
            }
        }
    }

    async fn complete_job(&self, job_id: Uuid, documents: Vec<Document>) {
        info!(job_id = %job_id, documents = documents.len(), "job completed");
        if let Err(e) = self.store.complete(job_id, &self.worker_id, &documents).await {
            error!(job_id = %job_id, error = %e, "failed to mark job as completed");
        }
    }

    async fn fail_job(&self, job_id: Uuid, error: JobError) {
        if let Err(e) = self.store.fail(job_id, &self.worker_id, &error).await {
            error!(job_id = %job_id, error = %e, "failed to mark job as failed");
        }
    }
}

/// Apply result filtering: URLs-only strips content; otherwise documents
/// with empty or whitespace-only content are dropped.
fn filter_documents(options: &CrawlerOptions, documents: Vec<Document>) -> Vec<Document> {
    if options.return_only_urls {
        documents.iter().map(Document::url_only).collect()
    } else {
        documents.into_iter().filter(Document::has_content).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_content_documents_are_dropped() {
        let docs = vec![
            Document::new("https://a.com", "text"),
            Document::new("https://b.com", "  \n"),
            Document::new("https://c.com", ""),
        ];
        let filtered = filter_documents(&CrawlerOptions::default(), docs);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].metadata.source_url, "https://a.com");
    }

    #[test]
    fn urls_only_keeps_every_document_without_content() {
        let options = CrawlerOptions {
            return_only_urls: true,
            limit: None,
        };
        let docs = vec![
            Document::new("https://a.com", "text"),
            Document::new("https://b.com", ""),
        ];
        let filtered = filter_documents(&options, docs);
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|d| d.content.is_empty()));
    }
}
