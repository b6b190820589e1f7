//! In-process pub/sub for live job progress.
//!
//! The persisted `progress` column is the source of truth for polling; this
//! hub is a fire-and-forget side channel feeding the SSE endpoint. One
//! broadcast channel per in-flight job, dropped once nobody listens.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use super::queue::{CrawlProgress, Document};

/// Snapshot of a job's progress, pushed on every pipeline event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub job_id: Uuid,
    pub current_step: String,
    pub total_steps: u32,
    pub document_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_document: Option<Document>,
}

impl ProgressEvent {
    pub fn snapshot(job_id: Uuid, progress: &CrawlProgress) -> Self {
        Self {
            job_id,
            current_step: progress.current_step.clone(),
            total_steps: progress.total_steps,
            document_count: progress.partial_docs.len(),
            current_document: progress.current_document.clone(),
        }
    }
}

#[derive(Clone)]
pub struct ProgressHub {
    channels: Arc<RwLock<HashMap<Uuid, broadcast::Sender<ProgressEvent>>>>,
    capacity: usize,
}

impl ProgressHub {
    /// Default capacity of 64 buffered events per job.
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity,
        }
    }

    /// Publish a progress snapshot. No-op if the job has no subscribers.
    pub async fn publish(&self, event: ProgressEvent) {
        let channels = self.channels.read().await;
        if let Some(tx) = channels.get(&event.job_id) {
            let _ = tx.send(event);
        }
    }

    /// Subscribe to a job's progress stream, creating the channel if needed.
    pub async fn subscribe(&self, job_id: Uuid) -> broadcast::Receiver<ProgressEvent> {
        let mut channels = self.channels.write().await;
        let tx = channels
            .entry(job_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        tx.subscribe()
    }

    /// Drop channels with zero subscribers (housekeeping).
    pub async fn cleanup(&self) {
        let mut channels = self.channels.write().await;
        channels.retain(|_, tx| tx.receiver_count() > 0);
    }
}

impl Default for ProgressHub {
    fn default() -> Self {
        Self::new()
    }
}
