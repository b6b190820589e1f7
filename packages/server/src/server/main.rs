// Main entry point for the crawl orchestrator
//
// Role dispatch: the bare process supervises a pool of worker processes;
// a process forked with WORKER_INDEX set runs one full HTTP-facing
// instance (transport + queue consumer) against the shared store.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use server_core::kernel::consumer::{ConsumerConfig, PauseSwitch, QueueConsumer};
use server_core::kernel::executor::CrawlExecutor;
use server_core::kernel::progress_hub::ProgressHub;
use server_core::kernel::queue::{
    InMemoryJobStore, JobStore, PostgresJobStore, RecoveryStore,
};
use server_core::kernel::recovery::RecoveryController;
use server_core::kernel::supervisor;
use server_core::kernel::traits::{BaseAlertService, BaseBillingService};
use server_core::kernel::{
    HttpBillingService, HttpCrawlPipeline, LogAlertService, NoopBillingService,
    SlackAlertService,
};
use server_core::server::app::{build_app, AppSettings, AppState};
use server_core::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;

    match supervisor::worker_index() {
        Some(index) => run_worker(config, index).await,
        None => supervisor::run(&config).await,
    }
}

/// Run one worker instance: HTTP transport plus queue consumer.
async fn run_worker(config: Config, index: usize) -> Result<()> {
    tracing::info!(index, "starting worker instance");

    let (store, recovery_store) = build_store(&config).await?;

    let pipeline = Arc::new(HttpCrawlPipeline::new()?);
    let billing: Arc<dyn BaseBillingService> = match &config.billing_api_url {
        Some(url) => Arc::new(HttpBillingService::new(url.clone())),
        None => {
            tracing::warn!("BILLING_API_URL not set, billing gate accepts everything");
            Arc::new(NoopBillingService)
        }
    };
    let alerts: Arc<dyn BaseAlertService> = match &config.slack_webhook_url {
        Some(url) => Arc::new(SlackAlertService::new(url.clone())),
        None => Arc::new(LogAlertService),
    };

    let hub = ProgressHub::new();
    let pause = PauseSwitch::new();
    let recovery = Arc::new(RecoveryController::new(store.clone(), recovery_store));

    let worker_id = format!("worker-{index}-{}", Uuid::new_v4());
    let executor = Arc::new(CrawlExecutor::new(
        store.clone(),
        pipeline,
        billing,
        hub.clone(),
        worker_id.clone(),
    ));
    let consumer = QueueConsumer::new(
        store.clone(),
        executor,
        pause.clone(),
        ConsumerConfig::with_worker_id(worker_id),
    );
    tokio::spawn(consumer.run());

    let state = AppState {
        store,
        recovery,
        pause,
        alerts,
        hub,
        settings: AppSettings::from_config(&config),
        notify_timer: Arc::new(Mutex::new(None)),
    };
    let app = build_app(state, &config.admin_key);

    // Siblings share the port via SO_REUSEPORT.
    let addr = format!("0.0.0.0:{}", config.port)
        .parse()
        .context("invalid listen address")?;
    let listener = supervisor::bind_shared(addr)?;
    let listener = tokio::net::TcpListener::from_std(listener)
        .context("failed to register listener with the runtime")?;

    tracing::info!(index, %addr, "worker serving");
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// Select the backing store: Postgres when configured, in-memory otherwise.
async fn build_store(config: &Config) -> Result<(Arc<dyn JobStore>, Arc<dyn RecoveryStore>)> {
    match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to database...");
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await
                .context("Failed to connect to database")?;

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("Failed to run migrations")?;

            let store = Arc::new(PostgresJobStore::new(pool));
            Ok((store.clone(), store))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory job store");
            let store = Arc::new(InMemoryJobStore::new());
            Ok((store.clone(), store))
        }
    }
}
