use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub database: ComponentHealth,
    pub job_store: ComponentHealth,
}

#[derive(Serialize)]
pub struct ComponentHealth {
    pub status: String,
    pub latency_ms: Option<u64>,
}

impl ComponentHealth {
    fn from_probe<E>(result: Result<(), E>, started: std::time::Instant) -> Self {
        match result {
            Ok(()) => Self {
                status: "ok".to_string(),
                latency_ms: Some(started.elapsed().as_millis() as u64),
            },
            Err(_) => Self {
                status: "error".to_string(),
                latency_ms: None,
            },
        }
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// GET /health: dependency status. 503 when any dependency is down.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let db_start = std::time::Instant::now();
    let db_probe = sqlx::query("SELECT 1").execute(&state.db).await.map(|_| ());
    let database = ComponentHealth::from_probe(db_probe, db_start);

    // Listing owners is a round trip to the job store.
    let store_start = std::time::Instant::now();
    let store_probe = state.jobs.owners().await.map(|_| ());
    let job_store = ComponentHealth::from_probe(store_probe, store_start);

    let all_healthy = database.is_ok() && job_store.is_ok();
    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if all_healthy { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            database,
            job_store,
        },
    };

    (status_code, Json(response))
}
