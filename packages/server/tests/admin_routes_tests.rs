//! Admin and job route semantics over the in-memory store.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use server_core::kernel::queue::{InMemoryJobStore, JobState, JobStore};
use server_core::kernel::test_dependencies::CollectingAlertService;
use server_core::server::app::build_app;

use common::{app_state, enqueue_and_claim, payload, WORKER};

const ADMIN: &str = "/admin/test-key";

async fn send(app: &Router, method: &str, path: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(value) => Request::builder()
            .method(method)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn get(app: &Router, path: &str) -> (StatusCode, Value) {
    send(app, "GET", path, None).await
}

async fn post(app: &Router, path: &str, body: Option<Value>) -> (StatusCode, Value) {
    send(app, "POST", path, body).await
}

#[tokio::test]
async fn is_production_reports_startup_flag() {
    let store = Arc::new(InMemoryJobStore::new());
    let alerts = Arc::new(CollectingAlertService::new());
    let app = build_app(app_state(&store, &alerts), "test-key");

    let (status, body) = get(&app, &format!("{ADMIN}/is-production")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isProduction"], json!(false));
}

#[tokio::test]
async fn wrong_admin_key_is_not_found() {
    let store = Arc::new(InMemoryJobStore::new());
    let alerts = Arc::new(CollectingAlertService::new());
    let app = build_app(app_state(&store, &alerts), "test-key");

    let (status, _) = get(&app, "/admin/wrong-key/is-production").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn queues_health_alerts_while_jobs_are_active() {
    let store = Arc::new(InMemoryJobStore::new());
    let alerts = Arc::new(CollectingAlertService::new());
    let app = build_app(app_state(&store, &alerts), "test-key");

    let (status, body) = get(&app, &format!("{ADMIN}/queues")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["activeJobs"], json!(0));

    enqueue_and_claim(&store, payload("https://example.com", "single")).await;

    let (status, body) = get(&app, &format!("{ADMIN}/queues")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["activeJobs"], json!(1));
}

#[tokio::test]
async fn server_health_check_alerts_while_jobs_are_waiting() {
    let store = Arc::new(InMemoryJobStore::new());
    let alerts = Arc::new(CollectingAlertService::new());
    let app = build_app(app_state(&store, &alerts), "test-key");

    let (status, _) = get(&app, &format!("{ADMIN}/serverHealthCheck")).await;
    assert_eq!(status, StatusCode::OK);

    store
        .enqueue(Uuid::new_v4(), payload("https://example.com", "single"))
        .await
        .unwrap();

    let (status, body) = get(&app, &format!("{ADMIN}/serverHealthCheck")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["waitingJobs"], json!(1));
}

#[tokio::test]
async fn shutdown_pauses_and_unpause_reclaims_then_resumes() {
    let store = Arc::new(InMemoryJobStore::new());
    let alerts = Arc::new(CollectingAlertService::new());
    let state = app_state(&store, &alerts);
    let pause = state.pause.clone();
    let app = build_app(state, "test-key");

    // A worker died holding this job's lock.
    let orphan = enqueue_and_claim(&store, payload("https://example.com", "single")).await;

    let (status, _) = post(&app, &format!("{ADMIN}/shutdown"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(pause.is_paused());

    let (status, body) = post(&app, &format!("{ADMIN}/unpause"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["requeued"], json!(1));
    assert!(!pause.is_paused());

    let requeued = store.find(orphan.id).await.unwrap().unwrap();
    assert_eq!(requeued.state, JobState::Waiting);
}

#[tokio::test]
async fn cleanup_endpoint_sweeps_only_expired_completed_jobs() {
    let store = Arc::new(InMemoryJobStore::new());
    let alerts = Arc::new(CollectingAlertService::new());
    let app = build_app(app_state(&store, &alerts), "test-key");

    let old = enqueue_and_claim(&store, payload("https://old.example.com", "single")).await;
    store.complete(old.id, WORKER, &[]).await.unwrap();
    store
        .set_finished_at(old.id, Utc::now() - Duration::hours(30))
        .await;

    let recent = enqueue_and_claim(&store, payload("https://recent.example.com", "single")).await;
    store.complete(recent.id, WORKER, &[]).await.unwrap();

    let (status, body) = get(&app, &format!("{ADMIN}/clean-before-24h-complete-jobs")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removedJobs"], json!(1));
    assert!(store.find(recent.id).await.unwrap().is_some());
}

#[tokio::test]
async fn check_queues_runs_rule_evaluation() {
    let store = Arc::new(InMemoryJobStore::new());
    let alerts = Arc::new(CollectingAlertService::new());
    let mut state = app_state(&store, &alerts);
    state.settings.alert_rules.max_waiting = 0;
    let app = build_app(state, "test-key");

    let (status, body) = get(&app, &format!("{ADMIN}/check-queues")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], json!(true));
    assert!(alerts.messages().is_empty());

    store
        .enqueue(Uuid::new_v4(), payload("https://example.com", "single"))
        .await
        .unwrap();

    let (status, _) = get(&app, &format!("{ADMIN}/check-queues")).await;
    assert_eq!(status, StatusCode::OK);
    let messages = alerts.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("waiting"));
}

#[tokio::test]
async fn deferred_notify_alerts_when_queue_stays_backed_up() {
    let store = Arc::new(InMemoryJobStore::new());
    let alerts = Arc::new(CollectingAlertService::new());
    let app = build_app(app_state(&store, &alerts), "test-key");

    store
        .enqueue(Uuid::new_v4(), payload("https://example.com", "single"))
        .await
        .unwrap();

    let (status, body) = get(&app, &format!("{ADMIN}/serverHealthCheck/notify")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("check initiated"));
    // Responds before the deferred re-check has run.
    assert!(alerts.messages().is_empty());

    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    let messages = alerts.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("still waiting"));
}

#[tokio::test]
async fn rearming_the_notify_timer_aborts_the_previous_one() {
    let store = Arc::new(InMemoryJobStore::new());
    let alerts = Arc::new(CollectingAlertService::new());
    let app = build_app(app_state(&store, &alerts), "test-key");

    store
        .enqueue(Uuid::new_v4(), payload("https://example.com", "single"))
        .await
        .unwrap();

    get(&app, &format!("{ADMIN}/serverHealthCheck/notify")).await;
    get(&app, &format!("{ADMIN}/serverHealthCheck/notify")).await;

    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert_eq!(alerts.messages().len(), 1);
}

#[tokio::test]
async fn enqueue_then_poll_round_trip() {
    let store = Arc::new(InMemoryJobStore::new());
    let alerts = Arc::new(CollectingAlertService::new());
    let app = build_app(app_state(&store, &alerts), "test-key");

    let (status, body) = post(
        &app,
        "/jobs",
        Some(json!({
            "url": "https://example.com",
            "mode": "single",
            "teamId": "team-1",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let job_id = body["jobId"].as_str().unwrap().to_string();

    let (status, body) = get(&app, &format!("/jobs/{job_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], json!("waiting"));
    assert!(body.get("result").is_none());
}

#[tokio::test]
async fn polling_an_unknown_job_is_not_found() {
    let store = Arc::new(InMemoryJobStore::new());
    let alerts = Arc::new(CollectingAlertService::new());
    let app = build_app(app_state(&store, &alerts), "test-key");

    let (status, body) = get(&app, &format!("/jobs/{}", Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], json!("job not found"));
}
