//! Reclaim-and-requeue scenarios: repairing jobs orphaned by a dead worker.

mod common;

use std::sync::Arc;

use uuid::Uuid;

use server_core::kernel::queue::{
    InMemoryJobStore, JobState, JobStore, RecoveryStore,
};
use server_core::kernel::recovery::RecoveryController;
use server_core::kernel::test_dependencies::{StubBillingService, StubCrawlPipeline};

use common::{enqueue_and_claim, executor, payload, WORKER};

fn controller(store: &Arc<InMemoryJobStore>) -> RecoveryController {
    RecoveryController::new(store.clone(), store.clone())
}

#[tokio::test]
async fn reclaim_requeues_active_job_under_same_id() {
    let store = Arc::new(InMemoryJobStore::new());
    let job = enqueue_and_claim(&store, payload("https://example.com", "single")).await;
    let job_id = job.id;

    let summary = controller(&store).reclaim_and_requeue().await.unwrap();
    assert_eq!(summary.requeued, 1);
    assert_eq!(summary.skipped, 0);

    // Same external id, fresh waiting record, no lock, identical payload.
    let requeued = store.find(job_id).await.unwrap().unwrap();
    assert_eq!(requeued.state, JobState::Waiting);
    assert!(requeued.locked_by.is_none());
    assert!(requeued.result.is_none());
    assert_eq!(requeued.payload.url, "https://example.com");
    assert_eq!(requeued.payload.team_id, "team-1");

    // Exactly one record for that id.
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn reclaim_leaves_waiting_and_terminal_jobs_alone() {
    let store = Arc::new(InMemoryJobStore::new());

    let completed = enqueue_and_claim(&store, payload("https://done.example.com", "single")).await;
    store.complete(completed.id, WORKER, &[]).await.unwrap();

    let waiting_id = store
        .enqueue(Uuid::new_v4(), payload("https://waiting.example.com", "single"))
        .await
        .unwrap();

    let summary = controller(&store).reclaim_and_requeue().await.unwrap();
    assert_eq!(summary.requeued, 0);

    let waiting = store.find(waiting_id).await.unwrap().unwrap();
    assert_eq!(waiting.state, JobState::Waiting);
    let completed = store.find(completed.id).await.unwrap().unwrap();
    assert_eq!(completed.state, JobState::Completed);
}

#[tokio::test]
async fn reclaim_handles_several_orphans() {
    let store = Arc::new(InMemoryJobStore::new());
    for i in 0..3 {
        store
            .enqueue(Uuid::new_v4(), payload(&format!("https://example.com/{i}"), "single"))
            .await
            .unwrap();
    }
    let claimed = store.claim("worker-dead", 3).await.unwrap();
    assert_eq!(claimed.len(), 3);

    let summary = controller(&store).reclaim_and_requeue().await.unwrap();
    assert_eq!(summary.requeued, 3);
    assert_eq!(store.count_by_state(JobState::Waiting).await.unwrap(), 3);
    assert_eq!(store.count_by_state(JobState::Active).await.unwrap(), 0);
}

#[tokio::test]
async fn force_release_refuses_non_active_jobs() {
    let store = InMemoryJobStore::new();
    let id = store
        .enqueue(Uuid::new_v4(), payload("https://example.com", "single"))
        .await
        .unwrap();

    let result = store
        .force_release(id, &server_core::kernel::queue::JobError::interrupted())
        .await;
    assert!(result.is_err());
}

/// Full circle: worker dies mid-job, operator reclaims, a healthy worker
/// picks the requeued job up and finishes it.
#[tokio::test]
async fn requeued_job_can_be_claimed_and_completed() {
    let store = Arc::new(InMemoryJobStore::new());

    // A worker claims the job and dies without transitioning it.
    let orphan = enqueue_and_claim(&store, payload("https://example.com", "single")).await;
    let job_id = orphan.id;

    controller(&store).reclaim_and_requeue().await.unwrap();

    // Status pollers see the fresh waiting job, not the stale active one.
    let requeued = store.find(job_id).await.unwrap().unwrap();
    assert_eq!(requeued.state, JobState::Waiting);

    // A healthy worker picks it up and completes it.
    let billing = Arc::new(StubBillingService::accepting());
    let pipeline = StubCrawlPipeline::new().with_page("https://example.com", "recovered");
    let (executor, _hub) = executor(&store, pipeline, &billing);

    let mut claimed = store.claim(WORKER, 1).await.unwrap();
    let job = claimed.pop().unwrap();
    assert_eq!(job.id, job_id);
    executor.execute(job).await;

    let finished = store.find(job_id).await.unwrap().unwrap();
    assert_eq!(finished.state, JobState::Completed);
}
