use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Absent selects the in-memory store (local/dev runs without Postgres)
    pub database_url: Option<String>,
    pub port: u16,
    /// Deployment environment name; "production" flips `is_production`
    pub environment: String,
    /// Secret path segment guarding the admin routes
    pub admin_key: String,
    /// Worker pool size override
    pub workers: Option<usize>,
    /// Absent selects the allow-all billing stub
    pub billing_api_url: Option<String>,
    /// Absent selects the log-only alerter
    pub slack_webhook_url: Option<String>,
    /// Queue-depth alert threshold for waiting jobs
    pub max_waiting_jobs: i64,
    /// Queue-depth alert threshold for active jobs
    pub max_active_jobs: i64,
    /// Waiting-job count that arms the deferred health alert
    pub notify_threshold: i64,
    /// Delay before the deferred health alert re-checks
    pub notify_delay_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").ok(),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            environment: env::var("ENV").unwrap_or_else(|_| "local".to_string()),
            admin_key: env::var("ADMIN_KEY").context("ADMIN_KEY must be set")?,
            workers: env::var("WORKERS")
                .ok()
                .map(|raw| raw.parse().context("WORKERS must be a valid number"))
                .transpose()?,
            billing_api_url: env::var("BILLING_API_URL").ok(),
            slack_webhook_url: env::var("SLACK_WEBHOOK_URL").ok(),
            max_waiting_jobs: env::var("MAX_WAITING_JOBS")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .context("MAX_WAITING_JOBS must be a valid number")?,
            max_active_jobs: env::var("MAX_ACTIVE_JOBS")
                .unwrap_or_else(|_| "50".to_string())
                .parse()
                .context("MAX_ACTIVE_JOBS must be a valid number")?,
            notify_threshold: env::var("NOTIFY_THRESHOLD")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .context("NOTIFY_THRESHOLD must be a valid number")?,
            notify_delay_secs: env::var("NOTIFY_DELAY_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .context("NOTIFY_DELAY_SECS must be a valid number")?,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Worker pool size: explicit override, else one per CPU core in
    /// production, else a small fixed number for local runs.
    pub fn worker_count(&self) -> usize {
        if let Some(workers) = self.workers {
            return workers.max(1);
        }
        if self.is_production() {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            2
        }
    }
}
