//! Billing gate clients.
//!
//! The ledger itself is an external service; this module only converts
//! "documents produced" into a charge call and reports the outcome. A
//! rejected charge is not an error — it is a business outcome the executor
//! turns into a failed job.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::traits::{BaseBillingService, ChargeOutcome};

#[derive(Serialize)]
struct ChargeRequest<'a> {
    team_id: &'a str,
    document_count: usize,
}

#[derive(Deserialize)]
struct ChargeResponse {
    success: bool,
    #[serde(default)]
    reason: Option<String>,
}

/// HTTP client for the billing API.
pub struct HttpBillingService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBillingService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl BaseBillingService for HttpBillingService {
    async fn charge(&self, team_id: &str, document_count: usize) -> Result<ChargeOutcome> {
        let url = format!("{}/charges", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .json(&ChargeRequest {
                team_id,
                document_count,
            })
            .send()
            .await
            .context("billing request failed")?;

        let body: ChargeResponse = response
            .json()
            .await
            .context("billing response was not valid JSON")?;

        if body.success {
            Ok(ChargeOutcome::accepted())
        } else {
            Ok(ChargeOutcome::rejected(
                body.reason
                    .unwrap_or_else(|| "billing rejected".to_string()),
            ))
        }
    }
}

/// Billing gate for deployments without a billing API configured: accepts
/// every charge.
pub struct NoopBillingService;

#[async_trait]
impl BaseBillingService for NoopBillingService {
    async fn charge(&self, team_id: &str, document_count: usize) -> Result<ChargeOutcome> {
        tracing::debug!(team_id = %team_id, document_count, "billing disabled, accepting charge");
        Ok(ChargeOutcome::accepted())
    }
}
