use axum::extract::State;
use axum::Json;
use garde::Validate;

use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::db::queries;
use crate::error::{AppError, AppResult};
use crate::models::credits::NewCreation;
use crate::models::generation::{
    AnimateRequest, AnimateResponse, GenerateRequest, GenerateResponse, PollRequest, PollResponse,
    UploadRequest, UploadResponse,
};
use crate::models::job::{AnimationJob, JobStatus};
use crate::services::runware::{RunwareError, TaskStatus};
use crate::services::styles;
use crate::services::validation::validate_image_data_uri;

/// Credits spent per image or video generation.
pub const GENERATION_COST: i64 = 1;

/// Spend credits for a signed-in user. Anonymous requests are not charged.
///
/// There is no refund if the provider call that follows fails.
async fn charge(state: &AppState, user: Option<&AuthUser>) -> AppResult<()> {
    let Some(user) = user else {
        return Ok(());
    };

    let outcome = state
        .credits
        .deduct_credits(&user.user_id, GENERATION_COST)
        .await?;
    if outcome.is_degraded() {
        tracing::warn!(user_id = %user.user_id, "Generation charged against local credit cache");
    }
    if !outcome.value {
        return Err(AppError::InsufficientCredits);
    }
    Ok(())
}

fn provider_error(public: &str, err: RunwareError) -> AppError {
    match err {
        RunwareError::Provider(_) => err.into(),
        other => AppError::upstream(public, other),
    }
}

/// POST /api/upload: store a photo with the provider and return its URL.
pub async fn upload_image(
    State(state): State<AppState>,
    Json(req): Json<UploadRequest>,
) -> AppResult<Json<UploadResponse>> {
    req.validate()
        .map_err(|_| AppError::BadRequest("No image provided".into()))?;
    validate_image_data_uri(&req.image).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let uploaded = state
        .runware
        .upload_image(&req.image)
        .await
        .map_err(|e| AppError::upstream("Image upload failed", e))?;

    tracing::info!(image_url = %uploaded.image_url, "Image uploaded");

    Ok(Json(UploadResponse {
        image_url: uploaded.image_url,
        image_uuid: uploaded.image_uuid,
    }))
}

/// POST /api/generate: caricature of the user at work, in a chosen style.
pub async fn generate_image(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Json(req): Json<GenerateRequest>,
) -> AppResult<Json<GenerateResponse>> {
    req.validate()?;
    validate_image_data_uri(&req.image).map_err(|e| AppError::BadRequest(e.to_string()))?;

    charge(&state, user.as_ref()).await?;
    metrics::counter!("generation_requests_total", "kind" => "image").increment(1);

    let prompt = styles::image_prompt(&req.job_title, &req.gender, &req.style);

    let uploaded = state
        .runware
        .upload_image(&req.image)
        .await
        .map_err(|e| AppError::upstream("Failed to generate image", e))?;
    let seed = uploaded
        .image_uuid
        .as_deref()
        .unwrap_or(&uploaded.image_url);

    let image_url = state
        .runware
        .generate_image(seed, &prompt)
        .await
        .map_err(|e| provider_error("Failed to generate image", e))?;

    tracing::info!(style = %req.style, image_url = %image_url, "Image generated");

    if let Some(user) = &user {
        let creation = NewCreation {
            user_id: user.user_id.clone(),
            original_image_url: uploaded.image_url.clone(),
            generated_image_url: image_url.clone(),
            style: req.style.clone(),
            prompt: Some(prompt.clone()),
            job_title: Some(req.job_title.clone()),
            cost: GENERATION_COST as i32,
        };
        // The user already has the image; a gallery write failure is not fatal.
        if let Err(e) = queries::insert_creation(&state.db, &creation).await {
            tracing::warn!(user_id = %user.user_id, error = %e, "Failed to save creation");
        }
    }

    Ok(Json(GenerateResponse { image_url, prompt }))
}

/// POST /api/animate: submit an image-to-video task and return its task UUID.
///
/// Signed-in users also get an `AnimationJob` in their queue for the poller.
pub async fn animate(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Json(req): Json<AnimateRequest>,
) -> AppResult<Json<AnimateResponse>> {
    req.validate()
        .map_err(|_| AppError::BadRequest("Image URL is required".into()))?;

    charge(&state, user.as_ref()).await?;
    metrics::counter!("generation_requests_total", "kind" => "video").increment(1);

    let duration = styles::video_duration(req.duration);
    let prompt = styles::animate_prompt(&req.style);

    let task_uuid = state
        .runware
        .submit_video(&req.image_url, duration, prompt)
        .await
        .map_err(|e| provider_error("Failed to start video generation", e))?;

    tracing::info!(task_uuid = %task_uuid, duration, style = %req.style, "Video task submitted");

    if let Some(user) = &user {
        let thumbnail = req
            .thumbnail_url
            .clone()
            .unwrap_or_else(|| req.image_url.clone());
        let job = AnimationJob::submitted(
            task_uuid.clone(),
            req.image_url.clone(),
            thumbnail,
            req.style.clone(),
            chrono::Utc::now().timestamp_millis(),
        );
        state.jobs.add_job(&user.user_id, job).await?;
    }

    Ok(Json(AnimateResponse { task_uuid }))
}

/// POST /api/animate/poll: one status check for a video task.
pub async fn poll_animation(
    State(state): State<AppState>,
    Json(req): Json<PollRequest>,
) -> AppResult<Json<PollResponse>> {
    req.validate()
        .map_err(|_| AppError::BadRequest("taskUUID is required".into()))?;

    let response = match state.runware.poll_task(&req.task_uuid).await {
        Ok(status) => poll_response(status),
        Err(e) => {
            tracing::error!(task_uuid = %req.task_uuid, error = %e, "Animate poll error");
            PollResponse {
                status: JobStatus::Error,
                video_url: None,
                error: Some("Poll failed".to_string()),
                cost: None,
            }
        }
    };

    Ok(Json(response))
}

fn poll_response(status: TaskStatus) -> PollResponse {
    match status {
        TaskStatus::Processing => PollResponse {
            status: JobStatus::Processing,
            video_url: None,
            error: None,
            cost: None,
        },
        TaskStatus::Complete { video_url, cost } => PollResponse {
            status: JobStatus::Complete,
            video_url: Some(video_url),
            error: None,
            cost: cost.map(|c| format!("${c:.4}")),
        },
        TaskStatus::Error { message } => PollResponse {
            status: JobStatus::Error,
            video_url: None,
            error: Some(message),
            cost: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_response_shapes() {
        let done = poll_response(TaskStatus::Complete {
            video_url: "https://x/y.mp4".into(),
            cost: Some(0.25),
        });
        assert_eq!(
            serde_json::to_value(&done).unwrap(),
            serde_json::json!({"status": "complete", "videoUrl": "https://x/y.mp4", "cost": "$0.2500"})
        );

        let pending = poll_response(TaskStatus::Processing);
        assert_eq!(
            serde_json::to_value(&pending).unwrap(),
            serde_json::json!({"status": "processing"})
        );

        let failed = poll_response(TaskStatus::Error {
            message: "NSFW".into(),
        });
        assert_eq!(failed.error.as_deref(), Some("NSFW"));
    }
}
