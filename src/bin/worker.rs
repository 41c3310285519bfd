//! Animation job worker: polls every processing video task until it
//! completes, fails, or times out.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use mymeme::config::WorkerConfig;
use mymeme::routes;
use mymeme::services::{
    job_queue::{JobQueue, RedisJobStore},
    poller::{JobPoller, LogNotifier},
    runware::RunwareClient,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting animation job worker");

    let config = WorkerConfig::from_env().expect("Failed to load worker configuration");
    routes::metrics::describe();

    tracing::info!("Connecting to Redis job store");
    let store = RedisJobStore::new(&config.redis_url).expect("Failed to initialize job store");
    if let Err(e) = store.health_check().await {
        // The poller retries every tick, so start anyway.
        tracing::warn!(error = %e, "Job store not reachable yet");
    }

    let queue = Arc::new(JobQueue::new(Arc::new(store)));
    let runware = RunwareClient::new(config.runware_api_url.clone(), config.runware_api_key.clone());

    let poller = JobPoller::new(queue, Arc::new(runware), Arc::new(LogNotifier))
        .with_interval(Duration::from_secs(config.poll_interval_secs.max(1)))
        .with_timeout(Duration::from_secs(config.job_timeout_secs));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    poller.run(shutdown_rx).await;
}
