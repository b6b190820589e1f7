//! Kernel module - orchestrator infrastructure and dependencies.

pub mod alerts;
pub mod billing;
pub mod consumer;
pub mod executor;
pub mod pipeline;
pub mod progress_hub;
pub mod queue;
pub mod recovery;
pub mod supervisor;
pub mod test_dependencies;
pub mod traits;

pub use alerts::{AlertRules, LogAlertService, SlackAlertService};
pub use billing::{HttpBillingService, NoopBillingService};
pub use consumer::{ConsumerConfig, PauseSwitch, QueueConsumer};
pub use executor::CrawlExecutor;
pub use pipeline::HttpCrawlPipeline;
pub use progress_hub::{ProgressEvent, ProgressHub};
pub use recovery::{ReclaimSummary, RecoveryController};
pub use test_dependencies::{CollectingAlertService, StubBillingService, StubCrawlPipeline};
pub use traits::*;
