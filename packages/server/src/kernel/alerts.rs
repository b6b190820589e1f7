//! Operator alerting: Slack webhook delivery and queue-depth rules.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use super::queue::{JobState, JobStore};
use super::traits::BaseAlertService;

/// Delivers alerts to a Slack incoming webhook.
pub struct SlackAlertService {
    client: reqwest::Client,
    webhook_url: String,
}

impl SlackAlertService {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url: webhook_url.into(),
        }
    }
}

#[async_trait]
impl BaseAlertService for SlackAlertService {
    async fn notify(&self, message: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&serde_json::json!({ "text": message }))
            .send()
            .await
            .context("slack webhook request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("slack webhook returned {}", response.status());
        }
        Ok(())
    }
}

/// Fallback alerter for deployments without a webhook configured: logs the
/// message and drops it.
pub struct LogAlertService;

#[async_trait]
impl BaseAlertService for LogAlertService {
    async fn notify(&self, message: &str) -> Result<()> {
        warn!(alert = %message, "alert (no webhook configured)");
        Ok(())
    }
}

/// Queue-depth thresholds evaluated by `/check-queues`.
#[derive(Debug, Clone, Copy)]
pub struct AlertRules {
    pub max_waiting: i64,
    pub max_active: i64,
}

impl Default for AlertRules {
    fn default() -> Self {
        Self {
            max_waiting: 100,
            max_active: 50,
        }
    }
}

impl AlertRules {
    /// Compare current queue depths against the thresholds and alert on
    /// every breach. Delivery failures are surfaced to the caller.
    pub async fn evaluate(
        &self,
        store: &Arc<dyn JobStore>,
        alerts: &Arc<dyn BaseAlertService>,
    ) -> Result<()> {
        let waiting = store.count_by_state(JobState::Waiting).await?;
        let active = store.count_by_state(JobState::Active).await?;

        info!(waiting, active, "queue depth check");

        if waiting > self.max_waiting {
            alerts
                .notify(&format!(
                    "Queue alert: {waiting} jobs waiting (threshold {})",
                    self.max_waiting
                ))
                .await?;
        }

        if active > self.max_active {
            alerts
                .notify(&format!(
                    "Queue alert: {active} jobs active (threshold {})",
                    self.max_active
                ))
                .await?;
        }

        Ok(())
    }
}
