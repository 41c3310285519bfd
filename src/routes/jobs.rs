use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;
use serde::Deserialize;

use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::models::job::{AnimationJob, JobStatus};

#[derive(Debug, Deserialize)]
pub struct JobsQuery {
    pub status: Option<JobStatus>,
}

/// Body for POST /api/jobs. The task UUID doubles as the job id.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewJobRequest {
    #[garde(length(min = 1))]
    #[serde(rename = "taskUUID")]
    pub task_uuid: String,

    #[garde(length(min = 1))]
    pub source_image_url: String,

    #[garde(skip)]
    #[serde(default)]
    pub thumbnail_url: Option<String>,

    #[garde(length(min = 1, max = 50))]
    #[serde(default = "default_style")]
    pub style: String,
}

fn default_style() -> String {
    "original".to_string()
}

/// GET /api/jobs?status=processing|complete|error
pub async fn list_jobs(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<JobsQuery>,
) -> AppResult<Json<Vec<AnimationJob>>> {
    let owner = user.user_id.as_str();
    let jobs = match query.status {
        None => state.jobs.get_jobs(owner).await?,
        Some(JobStatus::Processing) => state.jobs.get_processing_jobs(owner).await?,
        Some(JobStatus::Complete) => state.jobs.get_completed_jobs(owner).await?,
        Some(JobStatus::Error) => state
            .jobs
            .get_jobs(owner)
            .await?
            .into_iter()
            .filter(|j| j.status == JobStatus::Error)
            .collect(),
    };
    Ok(Json(jobs))
}

/// POST /api/jobs: track a video task submitted elsewhere.
pub async fn add_job(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<NewJobRequest>,
) -> AppResult<(StatusCode, Json<AnimationJob>)> {
    req.validate()?;

    let thumbnail = req
        .thumbnail_url
        .unwrap_or_else(|| req.source_image_url.clone());
    let job = AnimationJob::submitted(
        req.task_uuid,
        req.source_image_url,
        thumbnail,
        req.style,
        chrono::Utc::now().timestamp_millis(),
    );

    state.jobs.add_job(&user.user_id, job.clone()).await?;
    tracing::info!(user_id = %user.user_id, job_id = %job.id, "Job added");

    Ok((StatusCode::CREATED, Json(job)))
}

/// DELETE /api/jobs/{id}
pub async fn remove_job(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.jobs.remove_job(&user.user_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/jobs/completed: drop every finished job.
pub async fn clear_completed(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<StatusCode> {
    state.jobs.clear_completed_jobs(&user.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
