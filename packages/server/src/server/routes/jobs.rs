//! Job submission, status polling, and live progress streaming.

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::info;
use uuid::Uuid;

use crate::common::AppError;
use crate::kernel::queue::{CrawlPayload, CrawlProgress, JobResult, JobState};
use crate::server::app::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueResponse {
    job_id: Uuid,
}

/// Enqueue a crawl job. The payload is immutable from here on.
pub async fn enqueue_job(
    State(state): State<AppState>,
    Json(payload): Json<CrawlPayload>,
) -> Result<Json<EnqueueResponse>, AppError> {
    let job_id = state.store.enqueue(Uuid::new_v4(), payload).await?;
    info!(job_id = %job_id, "job enqueued");
    Ok(Json(EnqueueResponse { job_id }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    progress: Option<CrawlProgress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<JobResult>,
}

/// Status poll: state plus whatever progress/result has been committed.
pub async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let Some(job) = state.store.find(job_id).await? else {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "job not found" })),
        )
            .into_response());
    };

    let response = JobStatusResponse {
        state: job.state,
        progress: job.progress,
        result: job.result,
    };
    Ok(Json(response).into_response())
}

/// SSE stream of live progress events for one job.
///
/// Fire-and-forget: the persisted progress field remains the source of
/// truth, this stream just saves pollers the round-trips.
pub async fn job_progress_stream(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> impl IntoResponse {
    let rx = state.hub.subscribe(job_id).await;

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => {
            let data = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
            Some(Ok::<_, Infallible>(
                Event::default().event("progress").data(data),
            ))
        }
        Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(_)) => {
            Some(Ok(Event::default().event("lagged").data("{}")))
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
