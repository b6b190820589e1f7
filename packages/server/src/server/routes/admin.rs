//! Operator/admin endpoints, guarded by the secret path segment.
//!
//! Health-style endpoints deliberately answer non-200 to mean "busy", not
//! "bug" — external monitors depend on that reading. Unexpected errors
//! surface as `500 {"error": ...}` via [`AppError`].

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::common::AppError;
use crate::kernel::queue::JobState;
use crate::kernel::recovery::ReclaimSummary;
use crate::server::app::AppState;

/// Completed jobs are swept once they are older than this.
const RETENTION_HOURS: i64 = 24;
/// Batch shape of one retention sweep.
const CLEAN_BATCH_SIZE: i64 = 100;
const CLEAN_MAX_BATCHES: u32 = 10;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueDepthResponse {
    active_jobs: i64,
}

/// Health check over active jobs: 200 only when nothing is active.
pub async fn queues_health(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<QueueDepthResponse>), AppError> {
    let active_jobs = state.store.count_by_state(JobState::Active).await?;

    let status = if active_jobs == 0 {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    Ok((status, Json(QueueDepthResponse { active_jobs })))
}

/// Pause dispatching without touching in-flight jobs.
pub async fn shutdown(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.pause.pause();
    info!("queue paused");
    Json(serde_json::json!({ "message": "queue paused" }))
}

/// Reclaim-and-requeue everything active, then resume dispatching.
pub async fn unpause(
    State(state): State<AppState>,
) -> Result<Json<ReclaimSummary>, AppError> {
    let summary = state.recovery.reclaim_and_requeue().await?;
    state.pause.resume();
    info!(requeued = summary.requeued, "queue resumed");
    Ok(Json(summary))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitingDepthResponse {
    waiting_jobs: i64,
}

/// Uptime-monitor health check: 200 only when nothing is waiting.
pub async fn server_health_check(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<WaitingDepthResponse>), AppError> {
    let waiting_jobs = state.store.count_by_state(JobState::Waiting).await?;

    let status = if waiting_jobs == 0 {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    Ok((status, Json(WaitingDepthResponse { waiting_jobs })))
}

/// Arm a one-shot deferred check: if the waiting count is at/above the
/// threshold now and still is after the delay, deliver an alert. Responds
/// immediately; re-arming aborts the previous timer.
pub async fn arm_health_notify(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let task_state = state.clone();
    let handle = tokio::spawn(async move {
        let threshold = task_state.settings.notify_threshold;

        match task_state.store.count_by_state(JobState::Waiting).await {
            Ok(waiting) if waiting >= threshold => {
                tokio::time::sleep(task_state.settings.notify_delay).await;
            }
            Ok(_) => return,
            Err(e) => {
                warn!(error = %e, "deferred health check failed");
                return;
            }
        }

        match task_state.store.count_by_state(JobState::Waiting).await {
            Ok(waiting) if waiting >= threshold => {
                let message = format!(
                    "Server health check: {waiting} jobs still waiting after deferred re-check"
                );
                if let Err(e) = task_state.alerts.notify(&message).await {
                    warn!(error = %e, "failed to deliver health alert");
                }
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "deferred health re-check failed"),
        }
    });

    let mut timer = state
        .notify_timer
        .lock()
        .expect("notify timer lock poisoned");
    if let Some(previous) = timer.replace(handle.abort_handle()) {
        previous.abort();
    }

    Ok(Json(serde_json::json!({ "message": "check initiated" })))
}

/// Run the alerting collaborator's rule evaluation on demand.
pub async fn check_queues(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state
        .settings
        .alert_rules
        .evaluate(&state.store, &state.alerts)
        .await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResponse {
    removed_jobs: u64,
}

/// Delete completed jobs finished more than 24 hours ago, in bounded
/// batches.
pub async fn clean_completed_jobs(
    State(state): State<AppState>,
) -> Result<Json<CleanupResponse>, AppError> {
    let cutoff = Utc::now() - Duration::hours(RETENTION_HOURS);
    let removed_jobs = state
        .store
        .delete_completed_before(cutoff, CLEAN_BATCH_SIZE, CLEAN_MAX_BATCHES)
        .await?;

    info!(removed_jobs, "completed-job cleanup finished");
    Ok(Json(CleanupResponse { removed_jobs }))
}

/// Report the process-wide production flag set at startup.
pub async fn is_production(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "isProduction": state.settings.is_production }))
}
