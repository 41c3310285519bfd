pub mod credits;
pub mod gallery;
pub mod generation;
pub mod health;
pub mod jobs;
pub mod metrics;
pub mod payments;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;

/// Request body cap. A 10 MB photo grows to roughly 13.4 MB as base64.
pub const MAX_BODY_BYTES: usize = 15 * 1024 * 1024;

/// API routes without the scrape endpoint or middleware.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/upload", post(generation::upload_image))
        .route("/api/generate", post(generation::generate_image))
        .route("/api/animate", post(generation::animate))
        .route("/api/animate/poll", post(generation::poll_animation))
        .route("/api/checkout", post(payments::create_checkout))
        .route("/api/webhooks/stripe", post(payments::stripe_webhook))
        .route("/api/credits", get(credits::get_credits))
        .route("/api/credits/init", post(credits::init_credits))
        .route("/api/credits/deduct", post(credits::deduct_credits))
        .route("/api/jobs", get(jobs::list_jobs).post(jobs::add_job))
        .route("/api/jobs/completed", delete(jobs::clear_completed))
        .route("/api/jobs/{id}", delete(jobs::remove_job))
        .route("/api/gallery", get(gallery::list_gallery))
        .with_state(state)
}

/// Full application: API, Prometheus scrape endpoint, and HTTP layers.
pub fn router(state: AppState, prometheus: Arc<PrometheusHandle>) -> Router {
    api_router(state)
        .route(
            "/metrics",
            get(metrics::prometheus_metrics).with_state(prometheus),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
}
