//! Supabase session authentication.
//!
//! Supabase signs session access tokens as HS256 JWTs with the project's JWT
//! secret and audience `authenticated`. The subject is the user id that keys
//! credits, jobs and the gallery.

use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::request::Parts;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::error::AppError;

const AUDIENCE: &str = "authenticated";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    #[serde(default)]
    pub aud: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

pub fn validate_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[AUDIENCE]);
    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)?;
    Ok(data.claims)
}

/// Signed-in user, from `Authorization: Bearer <jwt>`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: Option<String>,
}

fn bearer_token(parts: &Parts) -> Option<Result<&str, AppError>> {
    let header = parts.headers.get("authorization")?;
    let value = match header.to_str() {
        Ok(v) => v,
        Err(_) => return Some(Err(AppError::Unauthorized("Invalid Authorization header".into()))),
    };
    Some(value.strip_prefix("Bearer ").ok_or_else(|| {
        AppError::Unauthorized("Invalid Authorization format. Expected: Bearer <token>".into())
    }))
}

fn authenticate(token: &str, state: &AppState) -> Result<AuthUser, AppError> {
    let claims = validate_token(token, &state.config.supabase_jwt_secret).map_err(|e| {
        tracing::debug!(error = %e, "Rejected session token");
        AppError::Unauthorized("Invalid or expired token".into())
    })?;

    if claims.sub.is_empty() {
        return Err(AppError::Unauthorized("Token has no subject".into()));
    }

    Ok(AuthUser {
        user_id: claims.sub,
        email: claims.email,
    })
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))??;
        authenticate(token, state)
    }
}

/// `Option<AuthUser>`: anonymous when no header is sent, rejected when a
/// header is sent but invalid.
impl OptionalFromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        match bearer_token(parts) {
            None => Ok(None),
            Some(token) => authenticate(token?, state).map(Some),
        }
    }
}
