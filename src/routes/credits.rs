use axum::extract::State;
use axum::Json;
use garde::Validate;

use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::models::credits::{CreditsResponse, DeductRequest, DeductResponse};

/// GET /api/credits
pub async fn get_credits(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<CreditsResponse>> {
    let balance = state.credits.get_user_credits(&user.user_id).await;
    Ok(Json(CreditsResponse {
        credits: balance.value,
        source: balance.source,
    }))
}

/// POST /api/credits/init: store the free starting credits unless a balance exists.
pub async fn init_credits(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<CreditsResponse>> {
    let granted = state.credits.initialize_user_credits(&user.user_id).await?;
    tracing::info!(user_id = %user.user_id, credits = granted.value, "Credits initialized");
    Ok(Json(CreditsResponse {
        credits: granted.value,
        source: granted.source,
    }))
}

/// POST /api/credits/deduct
pub async fn deduct_credits(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<DeductRequest>,
) -> AppResult<Json<DeductResponse>> {
    req.validate()?;

    let outcome = state
        .credits
        .deduct_credits(&user.user_id, req.amount)
        .await?;
    let balance = state.credits.get_user_credits(&user.user_id).await;

    Ok(Json(DeductResponse {
        success: outcome.value,
        credits: balance.value,
        source: outcome.source,
    }))
}
