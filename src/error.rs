use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::services::credits::LedgerError;
use crate::services::job_queue::QueueError;
use crate::services::runware::RunwareError;
use crate::services::stripe::StripeError;

/// Error type for HTTP handlers.
///
/// Renders as `{"error": "<message>"}`. Upstream and internal failures are
/// logged in full and reported to the caller with a short generic message.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Insufficient credits")]
    InsufficientCredits,

    /// A provider call failed; the message is what the caller sees.
    #[error("Upstream error: {public}")]
    Upstream { public: String, detail: String },

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// A provider failure reported to the caller as `public`.
    pub fn upstream(public: impl Into<String>, source: impl std::fmt::Display) -> Self {
        AppError::Upstream {
            public: public.into(),
            detail: source.to_string(),
        }
    }
}

impl From<RunwareError> for AppError {
    fn from(err: RunwareError) -> Self {
        let public = match &err {
            RunwareError::Provider(msg) => msg.clone(),
            _ => "Generation provider request failed".to_string(),
        };
        AppError::upstream(public, err)
    }
}

impl From<StripeError> for AppError {
    fn from(err: StripeError) -> Self {
        match err {
            StripeError::MalformedSignature
            | StripeError::StaleSignature
            | StripeError::SignatureMismatch => AppError::BadRequest(err.to_string()),
            other => AppError::upstream("Failed to create checkout session", other),
        }
    }
}

impl From<garde::Report> for AppError {
    fn from(report: garde::Report) -> Self {
        AppError::BadRequest(report.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::InsufficientCredits => {
                (StatusCode::PAYMENT_REQUIRED, "Insufficient credits".to_string())
            }
            AppError::Upstream { public, detail } => {
                tracing::error!(error = %detail, "Upstream provider error");
                (StatusCode::BAD_GATEWAY, public.clone())
            }
            AppError::Ledger(LedgerError::InvalidAmount(amount)) => (
                StatusCode::BAD_REQUEST,
                format!("Invalid credit amount: {amount}"),
            ),
            AppError::Queue(err) => {
                tracing::error!(error = %err, "Job queue error");
                internal()
            }
            AppError::Ledger(err) => {
                tracing::error!(error = %err, "Credits ledger error");
                internal()
            }
            AppError::Database(err) => {
                tracing::error!(error = %err, "Database error");
                internal()
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        };

        (status, axum::Json(json!({ "error": message }))).into_response()
    }
}

fn internal() -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "An internal error occurred".to_string(),
    )
}
