use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::db::queries;
use crate::error::AppResult;
use crate::models::credits::Creation;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct GalleryQuery {
    pub limit: Option<i64>,
}

/// GET /api/gallery: the caller's saved creations, newest first.
pub async fn list_gallery(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<GalleryQuery>,
) -> AppResult<Json<Vec<Creation>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let creations = queries::list_creations(&state.db, &user.user_id, limit).await?;
    Ok(Json(creations))
}
