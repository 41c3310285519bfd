use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};
use std::str::FromStr;

use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::pricing::{CheckoutRequest, CheckoutResponse, CreditPlan};
use crate::services::stripe::{self, WebhookEvent};

/// POST /api/checkout: start a Stripe checkout for a credit pack.
pub async fn create_checkout(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CheckoutRequest>,
) -> AppResult<Json<CheckoutResponse>> {
    let plan = CreditPlan::from_str(req.price_id.trim())
        .map_err(|_| AppError::BadRequest(format!("Unknown plan: {}", req.price_id)))?;

    let checkout_url = state
        .stripe
        .create_checkout_session(plan, &user.user_id, &state.config.site_url)
        .await?;

    Ok(Json(CheckoutResponse { checkout_url }))
}

/// POST /api/webhooks/stripe: credit the ledger after a completed checkout.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<Value>> {
    match state.config.stripe_webhook_secret.as_deref() {
        Some(secret) => {
            let signature = headers
                .get("stripe-signature")
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| AppError::BadRequest("Missing Stripe-Signature header".into()))?;
            let now = chrono::Utc::now().timestamp();
            stripe::verify_signature(&body, signature, secret, now).map_err(|e| {
                tracing::warn!(error = %e, "Rejected webhook signature");
                AppError::from(e)
            })?;
        }
        None => {
            tracing::warn!("STRIPE_WEBHOOK_SECRET unset, accepting unverified webhook");
        }
    }

    let event: WebhookEvent = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!(error = %e, "Unparseable webhook payload");
        AppError::BadRequest("Webhook error".into())
    })?;

    if let Some(grant) = event.credit_grant() {
        tracing::info!(
            user_id = %grant.user_id,
            credits = grant.credits,
            "Webhook: processing payment"
        );

        let outcome = state
            .credits
            .add_credits(&grant.user_id, grant.credits)
            .await?;

        if outcome.is_degraded() {
            tracing::error!(
                user_id = %grant.user_id,
                credits = grant.credits,
                "Purchased credits recorded in local cache only"
            );
        } else {
            tracing::info!(user_id = %grant.user_id, credits = grant.credits, "Credits added");
        }
    } else {
        tracing::debug!(event_type = %event.event_type, "Ignoring webhook event");
    }

    Ok(Json(json!({ "received": true })))
}
