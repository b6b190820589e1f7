//! Queue consumer: the per-process loop that pulls jobs off the shared
//! store and runs them.
//!
//! Each worker process runs exactly one consumer. Claimed jobs are executed
//! sequentially; parallelism comes from the worker pool, not from within a
//! process. Pausing stops new lock acquisitions without touching in-flight
//! jobs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::executor::CrawlExecutor;
use super::queue::JobStore;

/// Shared dispatch switch. `/shutdown` pauses this process's consumer;
/// `/unpause` resumes it after recovery has run.
#[derive(Clone, Default)]
pub struct PauseSwitch(Arc<AtomicBool>);

impl PauseSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Configuration for the queue consumer.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Maximum number of jobs to claim at once
    pub batch_size: i64,
    /// How long to wait when no jobs are available (or while paused)
    pub poll_interval: Duration,
    /// Worker ID for this instance; doubles as the job lock token
    pub worker_id: String,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            poll_interval: Duration::from_secs(5),
            worker_id: format!("worker-{}", Uuid::new_v4()),
        }
    }
}

impl ConsumerConfig {
    pub fn with_worker_id(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            ..Default::default()
        }
    }
}

pub struct QueueConsumer {
    store: Arc<dyn JobStore>,
    executor: Arc<CrawlExecutor>,
    pause: PauseSwitch,
    config: ConsumerConfig,
    shutdown: Arc<AtomicBool>,
}

impl QueueConsumer {
    pub fn new(
        store: Arc<dyn JobStore>,
        executor: Arc<CrawlExecutor>,
        pause: PauseSwitch,
        config: ConsumerConfig,
    ) -> Self {
        Self {
            store,
            executor,
            pause,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle for graceful shutdown.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Poll-and-execute until shutdown is requested.
    pub async fn run(self) -> Result<()> {
        info!(
            worker_id = %self.config.worker_id,
            batch_size = self.config.batch_size,
            "queue consumer starting"
        );

        loop {
            if self.is_shutdown_requested() {
                break;
            }

            if self.pause.is_paused() {
                tokio::time::sleep(self.config.poll_interval).await;
                continue;
            }

            let jobs = match self
                .store
                .claim(&self.config.worker_id, self.config.batch_size)
                .await
            {
                Ok(jobs) => jobs,
                Err(e) => {
                    error!(error = %e, "failed to claim jobs");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            if jobs.is_empty() {
                tokio::time::sleep(self.config.poll_interval).await;
                continue;
            }

            debug!(count = jobs.len(), "claimed jobs");

            for job in jobs {
                if self.is_shutdown_requested() {
                    break;
                }
                self.executor.execute(job).await;
            }
        }

        info!(worker_id = %self.config.worker_id, "queue consumer stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = ConsumerConfig::default();
        assert_eq!(config.batch_size, 5);
        assert!(config.worker_id.starts_with("worker-"));
    }

    #[test]
    fn config_with_worker_id() {
        let config = ConsumerConfig::with_worker_id("worker-3");
        assert_eq!(config.worker_id, "worker-3");
    }

    #[test]
    fn pause_switch_round_trip() {
        let pause = PauseSwitch::new();
        assert!(!pause.is_paused());
        pause.pause();
        assert!(pause.is_paused());
        pause.resume();
        assert!(!pause.is_paused());
    }
}
