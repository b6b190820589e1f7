// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only — the orchestrator consumes its
// external collaborators (crawl pipeline, billing, alerting) through them.
//
// Naming convention: Base* for trait names (e.g. BaseCrawlPipeline)

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use super::queue::{CrawlPayload, Document};

// =============================================================================
// Crawl Pipeline Trait (Infrastructure - black-box document producer)
// =============================================================================

/// Normalized pipeline input, derived from a job payload.
#[derive(Debug, Clone)]
pub struct CrawlRequest {
    /// Fetch targets. A crawl request carries the single seed URL; a
    /// single-page request carries one entry per target.
    pub targets: Vec<String>,
    /// Multi-page traversal from the first target.
    pub crawl: bool,
    /// Page budget for traversal.
    pub limit: u32,
    /// Opaque per-page options, forwarded untouched.
    pub page_options: serde_json::Value,
}

/// Default page budget when the payload does not set one.
pub const DEFAULT_CRAWL_LIMIT: u32 = 10;

impl CrawlRequest {
    pub fn from_payload(payload: &CrawlPayload) -> Self {
        Self {
            targets: payload.targets(),
            crawl: payload.is_crawl(),
            limit: payload
                .crawler_options
                .limit
                .unwrap_or(DEFAULT_CRAWL_LIMIT),
            page_options: payload.page_options.clone(),
        }
    }
}

/// One progress event emitted by the pipeline while a job is in flight.
#[derive(Debug, Clone)]
pub struct CrawlEvent {
    /// Pages handled so far.
    pub current: u32,
    /// Best-known total (may grow during link discovery).
    pub total: u32,
    /// Human-readable phase, e.g. "SCRAPING".
    pub step: String,
    /// Set when this event corresponds to a newly produced document.
    pub document: Option<Document>,
}

#[async_trait]
pub trait BaseCrawlPipeline: Send + Sync {
    /// Run one crawl to completion.
    ///
    /// Emits a [`CrawlEvent`] per page on `events` (dropped events are
    /// acceptable — the returned set is authoritative) and returns the
    /// full, unfiltered document stream.
    async fn run(
        &self,
        request: CrawlRequest,
        events: mpsc::Sender<CrawlEvent>,
    ) -> Result<Vec<Document>>;
}

// =============================================================================
// Billing Gate Trait (Infrastructure)
// =============================================================================

/// Outcome of a billing charge attempt. A non-success outcome flips an
/// otherwise-successful crawl into a failed job.
#[derive(Debug, Clone)]
pub struct ChargeOutcome {
    pub success: bool,
    pub reason: Option<String>,
}

impl ChargeOutcome {
    pub fn accepted() -> Self {
        Self {
            success: true,
            reason: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            reason: Some(reason.into()),
        }
    }
}

#[async_trait]
pub trait BaseBillingService: Send + Sync {
    /// Charge a team for the documents a job produced. Invoked exactly once
    /// per job, after filtering; never retried.
    async fn charge(&self, team_id: &str, document_count: usize) -> Result<ChargeOutcome>;
}

// =============================================================================
// Alert Service Trait (Infrastructure)
// =============================================================================

#[async_trait]
pub trait BaseAlertService: Send + Sync {
    /// Deliver an operator-facing alert message.
    async fn notify(&self, message: &str) -> Result<()>;
}
