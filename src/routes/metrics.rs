use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Describe every metric the server and worker record.
pub fn describe() {
    metrics::describe_counter!(
        "generation_requests_total",
        "Image and video generation requests accepted, by kind"
    );
    metrics::describe_counter!("credits_deducted_total", "Credits spent on generations");
    metrics::describe_counter!("credits_added_total", "Credits granted by purchases");
    metrics::describe_counter!(
        "credits_fallback_total",
        "Ledger operations served by the local credit cache"
    );
    metrics::describe_counter!(
        "animation_jobs_completed",
        "Animation jobs that finished with a video"
    );
    metrics::describe_counter!(
        "animation_jobs_failed",
        "Animation jobs that failed or timed out"
    );
    metrics::describe_counter!(
        "animation_jobs_timed_out",
        "Animation jobs abandoned after the timeout"
    );
    metrics::describe_counter!(
        "animation_notifications_total",
        "Completion notifications delivered"
    );
    metrics::describe_gauge!(
        "animation_jobs_processing",
        "Processing jobs seen on the last poller tick"
    );
}

/// Prometheus scrape endpoint, text exposition format.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}
