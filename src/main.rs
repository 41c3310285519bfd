use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use mymeme::app_state::AppState;
use mymeme::config::AppConfig;
use mymeme::db;
use mymeme::routes;
use mymeme::services::{
    credits::{CreditsLedger, PgCreditStore, RedisCreditCache},
    job_queue::{JobQueue, RedisJobStore},
    runware::RunwareClient,
    stripe::StripeClient,
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing mymeme server");

    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);
    routes::metrics::describe();

    tracing::info!("Connecting to PostgreSQL database");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Connecting to Redis");
    let job_store = RedisJobStore::new(&config.redis_url).expect("Failed to initialize job store");
    let credit_cache =
        RedisCreditCache::new(&config.redis_url).expect("Failed to initialize credit cache");

    let jobs = JobQueue::new(Arc::new(job_store));
    let credits = CreditsLedger::new(
        Arc::new(PgCreditStore::new(db_pool.clone())),
        Arc::new(credit_cache),
        config.initial_credits,
    );

    let runware = RunwareClient::new(
        config.runware_api_url.clone(),
        config.runware_api_key.clone(),
    );
    let stripe = StripeClient::new(config.stripe_secret_key.clone());

    if config.stripe_webhook_secret.is_none() {
        tracing::warn!("STRIPE_WEBHOOK_SECRET is not set; webhook signatures will not be checked");
    }

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config, db_pool, runware, stripe, jobs, credits);
    let app = routes::router(state, prometheus_handle);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await
        .expect("Server error");
}
