//! Shared test harness: in-memory store plus stub collaborators.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use serde_json::json;
use uuid::Uuid;

use server_core::kernel::consumer::PauseSwitch;
use server_core::kernel::executor::CrawlExecutor;
use server_core::kernel::progress_hub::ProgressHub;
use server_core::kernel::queue::{CrawlJob, CrawlPayload, InMemoryJobStore, JobStore};
use server_core::kernel::recovery::RecoveryController;
use server_core::kernel::test_dependencies::{
    CollectingAlertService, StubBillingService, StubCrawlPipeline,
};
use server_core::server::app::{AppSettings, AppState};

/// Lock token used by every test executor.
pub const WORKER: &str = "worker-test";

pub fn payload(url: &str, mode: &str) -> CrawlPayload {
    serde_json::from_value(json!({
        "url": url,
        "mode": mode,
        "teamId": "team-1",
    }))
    .unwrap()
}

pub fn payload_with_options(
    url: &str,
    mode: &str,
    crawler_options: serde_json::Value,
) -> CrawlPayload {
    serde_json::from_value(json!({
        "url": url,
        "mode": mode,
        "crawlerOptions": crawler_options,
        "teamId": "team-1",
    }))
    .unwrap()
}

/// Enqueue a payload and claim it under the test worker's lock.
pub async fn enqueue_and_claim(store: &InMemoryJobStore, payload: CrawlPayload) -> CrawlJob {
    store.enqueue(Uuid::new_v4(), payload).await.unwrap();
    let mut claimed = store.claim(WORKER, 1).await.unwrap();
    claimed.pop().expect("job should be claimable")
}

/// Executor wired to the given stubs, sharing the returned hub.
pub fn executor(
    store: &Arc<InMemoryJobStore>,
    pipeline: StubCrawlPipeline,
    billing: &Arc<StubBillingService>,
) -> (CrawlExecutor, ProgressHub) {
    let hub = ProgressHub::new();
    let executor = CrawlExecutor::new(
        store.clone(),
        Arc::new(pipeline),
        billing.clone(),
        hub.clone(),
        WORKER,
    );
    (executor, hub)
}

/// Full application state over an in-memory store, for router tests.
pub fn app_state(
    store: &Arc<InMemoryJobStore>,
    alerts: &Arc<CollectingAlertService>,
) -> AppState {
    AppState {
        store: store.clone(),
        recovery: Arc::new(RecoveryController::new(store.clone(), store.clone())),
        pause: PauseSwitch::new(),
        alerts: alerts.clone(),
        hub: ProgressHub::new(),
        settings: AppSettings {
            is_production: false,
            alert_rules: Default::default(),
            notify_threshold: 1,
            notify_delay: std::time::Duration::from_millis(50),
        },
        notify_timer: Arc::new(Mutex::new(None)),
    }
}
