//! Crawl job model: payload, lifecycle state, progress, and result types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Most recent documents retained in the progress buffer.
pub const PARTIAL_DOCS_CAP: usize = 50;

// ============================================================================
// Enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "job_state", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    #[default]
    Waiting,
    Active,
    Completed,
    Failed,
}

impl JobState {
    /// Terminal states admit no further mutation of `result` or `progress`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// How the `url` field of a payload is interpreted.
///
/// `"crawl"` treats the URL as a single seed for multi-page traversal.
/// Every other mode string (`"single"`, `"scrape"`, ...) means a list of
/// independent single-page targets, comma-separated in `url`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CrawlMode {
    Crawl,
    #[default]
    #[serde(other)]
    Single,
}

// ============================================================================
// Payload
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CrawlerOptions {
    /// Map each produced document to just its source URL.
    #[serde(default)]
    pub return_only_urls: bool,
    /// Page budget for multi-page traversal.
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Immutable job payload, fixed at enqueue time.
///
/// `page_options` is passed through to the crawl pipeline untouched — the
/// orchestrator has no opinion on its contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlPayload {
    pub url: String,
    #[serde(default)]
    pub mode: CrawlMode,
    #[serde(default)]
    pub crawler_options: CrawlerOptions,
    #[serde(default)]
    pub page_options: serde_json::Value,
    pub team_id: String,
}

impl CrawlPayload {
    /// Fetch targets after mode normalization.
    ///
    /// Crawl mode yields the single seed URL; any other mode splits the
    /// comma-separated `url` field into independent targets.
    pub fn targets(&self) -> Vec<String> {
        match self.mode {
            CrawlMode::Crawl => vec![self.url.trim().to_string()],
            CrawlMode::Single => self
                .url
                .split(',')
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn is_crawl(&self) -> bool {
        self.mode == CrawlMode::Crawl
    }
}

// ============================================================================
// Documents and progress
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(rename = "sourceURL")]
    pub source_url: String,
}

/// One extracted page. `content` may be empty; `metadata.sourceURL` is
/// always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn new(source_url: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: DocumentMetadata {
                source_url: source_url.into(),
            },
        }
    }

    /// A copy stripped down to its source URL (for `returnOnlyUrls`).
    pub fn url_only(&self) -> Self {
        Self::new(self.metadata.source_url.clone(), "")
    }

    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }
}

/// Executor-owned progress snapshot, overwritten on each update.
///
/// `partial_docs` holds the most recent documents only; the final result
/// set is computed from the full document stream, not from this buffer.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CrawlProgress {
    pub current_step: String,
    pub total_steps: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_document: Option<Document>,
    #[serde(default)]
    pub partial_docs: Vec<Document>,
}

impl CrawlProgress {
    /// Append a document, evicting the oldest entry past the cap.
    pub fn push_document(&mut self, document: Document) {
        self.partial_docs.push(document);
        if self.partial_docs.len() > PARTIAL_DOCS_CAP {
            self.partial_docs.remove(0);
        }
    }
}

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobErrorCode {
    /// The crawl pipeline reported an unrecoverable error.
    CrawlFailed,
    /// The crawl succeeded but the billing gate rejected the charge.
    BillingRejected,
    /// The job was reclaimed after its executor was presumed dead.
    Interrupted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    pub code: JobErrorCode,
    pub message: String,
}

impl JobError {
    pub fn crawl_failed(message: impl Into<String>) -> Self {
        Self {
            code: JobErrorCode::CrawlFailed,
            message: message.into(),
        }
    }

    pub fn billing_rejected(reason: impl Into<String>) -> Self {
        Self {
            code: JobErrorCode::BillingRejected,
            message: reason.into(),
        }
    }

    pub fn interrupted() -> Self {
        Self {
            code: JobErrorCode::Interrupted,
            message: "interrupted".to_string(),
        }
    }
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Terminal outcome, written once on entering a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobResult {
    Documents { documents: Vec<Document> },
    Error { error: JobError },
}

// ============================================================================
// Job record
// ============================================================================

/// One crawl request with its lifecycle state, progress, and eventual result.
///
/// Invariant: `locked_by` is set if and only if `state` is `active`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CrawlJob {
    pub id: Uuid,
    #[sqlx(json)]
    pub payload: CrawlPayload,
    pub state: JobState,
    pub locked_by: Option<String>,
    #[sqlx(json(nullable))]
    pub progress: Option<CrawlProgress>,
    #[sqlx(json(nullable))]
    pub result: Option<JobResult>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl CrawlJob {
    /// Create a fresh waiting job. `id` is normally generated; recovery
    /// passes the removed job's id to preserve client-visible identity.
    pub fn waiting(id: Uuid, payload: CrawlPayload) -> Self {
        Self {
            id,
            payload,
            state: JobState::Waiting,
            locked_by: None,
            progress: None,
            result: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Whether the given worker currently holds this job's lock.
    pub fn locked_by_worker(&self, worker_id: &str) -> bool {
        self.state == JobState::Active && self.locked_by.as_deref() == Some(worker_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(url: &str, mode: &str) -> CrawlPayload {
        serde_json::from_value(serde_json::json!({
            "url": url,
            "mode": mode,
            "teamId": "team-1",
        }))
        .unwrap()
    }

    #[test]
    fn crawl_mode_uses_url_as_single_seed() {
        let p = payload("https://example.com", "crawl");
        assert!(p.is_crawl());
        assert_eq!(p.targets(), vec!["https://example.com"]);
    }

    #[test]
    fn single_mode_splits_comma_separated_urls() {
        let p = payload("https://a.com, https://b.com", "single");
        assert_eq!(p.targets(), vec!["https://a.com", "https://b.com"]);
    }

    #[test]
    fn unknown_mode_is_treated_as_single() {
        let p = payload("https://a.com,https://b.com", "scrape");
        assert_eq!(p.mode, CrawlMode::Single);
        assert_eq!(p.targets().len(), 2);
    }

    #[test]
    fn missing_options_take_defaults() {
        let p = payload("https://example.com", "single");
        assert!(!p.crawler_options.return_only_urls);
        assert_eq!(p.crawler_options.limit, None);
    }

    #[test]
    fn progress_buffer_never_exceeds_cap() {
        let mut progress = CrawlProgress::default();
        for i in 0..(PARTIAL_DOCS_CAP + 1) {
            progress.push_document(Document::new(format!("https://example.com/{i}"), "x"));
        }
        assert_eq!(progress.partial_docs.len(), PARTIAL_DOCS_CAP);
        // The oldest entry was evicted first.
        assert_eq!(
            progress.partial_docs[0].metadata.source_url,
            "https://example.com/1"
        );
    }

    #[test]
    fn empty_content_documents_are_detected() {
        assert!(!Document::new("https://a.com", "   \n\t").has_content());
        assert!(Document::new("https://a.com", "text").has_content());
    }

    #[test]
    fn waiting_job_holds_no_lock() {
        let job = CrawlJob::waiting(Uuid::new_v4(), payload("https://example.com", "single"));
        assert_eq!(job.state, JobState::Waiting);
        assert!(job.locked_by.is_none());
        assert!(!job.locked_by_worker("worker-1"));
    }

    #[test]
    fn source_url_serializes_with_wire_name() {
        let doc = Document::new("https://a.com", "hello");
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["metadata"]["sourceURL"], "https://a.com");
    }
}
