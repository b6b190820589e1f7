//! Application setup and server configuration.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tokio::task::AbortHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::kernel::alerts::AlertRules;
use crate::kernel::consumer::PauseSwitch;
use crate::kernel::progress_hub::ProgressHub;
use crate::kernel::queue::JobStore;
use crate::kernel::recovery::RecoveryController;
use crate::kernel::traits::BaseAlertService;
use crate::server::routes::{admin, jobs};

/// Process-wide values fixed at startup.
#[derive(Clone)]
pub struct AppSettings {
    pub is_production: bool,
    pub alert_rules: AlertRules,
    /// Waiting-job count that arms the deferred health alert.
    pub notify_threshold: i64,
    /// Delay before the deferred health alert re-checks.
    pub notify_delay: Duration,
}

impl AppSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            is_production: config.is_production(),
            alert_rules: AlertRules {
                max_waiting: config.max_waiting_jobs,
                max_active: config.max_active_jobs,
            },
            notify_threshold: config.notify_threshold,
            notify_delay: Duration::from_secs(config.notify_delay_secs),
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn JobStore>,
    pub recovery: Arc<RecoveryController>,
    pub pause: PauseSwitch,
    pub alerts: Arc<dyn BaseAlertService>,
    pub hub: ProgressHub,
    pub settings: AppSettings,
    /// One-shot deferred health check; re-arming aborts the previous timer.
    pub notify_timer: Arc<Mutex<Option<AbortHandle>>>,
}

/// Build the Axum application router.
///
/// Admin routes live under `/admin/{admin_key}` — the shared secret path
/// segment is the only guard on them.
pub fn build_app(state: AppState, admin_key: &str) -> Router {
    let admin_routes = Router::new()
        .route("/queues", get(admin::queues_health))
        .route("/shutdown", post(admin::shutdown))
        .route("/unpause", post(admin::unpause))
        .route("/serverHealthCheck", get(admin::server_health_check))
        .route("/serverHealthCheck/notify", get(admin::arm_health_notify))
        .route("/check-queues", get(admin::check_queues))
        .route(
            "/clean-before-24h-complete-jobs",
            get(admin::clean_completed_jobs),
        )
        .route("/is-production", get(admin::is_production));

    Router::new()
        .route("/jobs", post(jobs::enqueue_job))
        .route("/jobs/{id}", get(jobs::job_status))
        .route("/jobs/{id}/stream", get(jobs::job_progress_stream))
        .nest(&format!("/admin/{admin_key}"), admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
