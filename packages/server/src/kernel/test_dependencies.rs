// TestDependencies - stub implementations for testing
//
// Stub collaborators that can be injected in place of the real pipeline,
// billing, and alert services. Lives in the lib (not behind cfg(test)) so
// integration tests under tests/ can use them too.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use super::queue::Document;
use super::traits::{
    BaseAlertService, BaseBillingService, BaseCrawlPipeline, ChargeOutcome, CrawlEvent,
    CrawlRequest,
};

// =============================================================================
// Stub Crawl Pipeline
// =============================================================================

/// Pipeline stand-in that replays canned documents (or fails), emitting one
/// progress event per document like the real pipeline.
pub struct StubCrawlPipeline {
    documents: Vec<Document>,
    error: Option<String>,
    requests: Arc<Mutex<Vec<CrawlRequest>>>,
}

impl StubCrawlPipeline {
    pub fn new() -> Self {
        Self {
            documents: Vec::new(),
            error: None,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add a document from a (url, content) pair.
    pub fn with_page(mut self, url: &str, content: &str) -> Self {
        self.documents.push(Document::new(url, content));
        self
    }

    pub fn with_documents(mut self, documents: Vec<Document>) -> Self {
        self.documents = documents;
        self
    }

    /// Make every run fail with the given message.
    pub fn failing_with(mut self, message: &str) -> Self {
        self.error = Some(message.to_string());
        self
    }

    /// Requests captured from run calls.
    pub fn requests(&self) -> Vec<CrawlRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Shared handle to the captured requests, usable after the stub has
    /// been moved into an executor.
    pub fn requests_handle(&self) -> Arc<Mutex<Vec<CrawlRequest>>> {
        self.requests.clone()
    }
}

impl Default for StubCrawlPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseCrawlPipeline for StubCrawlPipeline {
    async fn run(
        &self,
        request: CrawlRequest,
        events: mpsc::Sender<CrawlEvent>,
    ) -> Result<Vec<Document>> {
        self.requests.lock().unwrap().push(request);

        if let Some(message) = &self.error {
            anyhow::bail!("{message}");
        }

        let total = self.documents.len() as u32;
        for (i, document) in self.documents.iter().enumerate() {
            let _ = events
                .send(CrawlEvent {
                    current: i as u32 + 1,
                    total,
                    step: "SCRAPING".to_string(),
                    document: Some(document.clone()),
                })
                .await;
        }

        Ok(self.documents.clone())
    }
}

// =============================================================================
// Stub Billing Service
// =============================================================================

/// Billing gate stand-in with a fixed outcome and captured charge calls.
pub struct StubBillingService {
    outcome: ChargeOutcome,
    charges: Arc<Mutex<Vec<(String, usize)>>>,
}

impl StubBillingService {
    pub fn accepting() -> Self {
        Self {
            outcome: ChargeOutcome::accepted(),
            charges: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn rejecting(reason: &str) -> Self {
        Self {
            outcome: ChargeOutcome::rejected(reason),
            charges: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// (team_id, document_count) pairs captured from charge calls.
    pub fn charges(&self) -> Vec<(String, usize)> {
        self.charges.lock().unwrap().clone()
    }
}

#[async_trait]
impl BaseBillingService for StubBillingService {
    async fn charge(&self, team_id: &str, document_count: usize) -> Result<ChargeOutcome> {
        self.charges
            .lock()
            .unwrap()
            .push((team_id.to_string(), document_count));
        Ok(self.outcome.clone())
    }
}

// =============================================================================
// Collecting Alert Service
// =============================================================================

/// Alert sink that records every message instead of delivering it.
#[derive(Default)]
pub struct CollectingAlertService {
    messages: Arc<Mutex<Vec<String>>>,
}

impl CollectingAlertService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl BaseAlertService for CollectingAlertService {
    async fn notify(&self, message: &str) -> Result<()> {
        self.messages.lock().unwrap().push(message.to_string());
        Ok(())
    }
}
