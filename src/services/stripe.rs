use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;

use crate::models::pricing::{CreditPlan, CHECKOUT_CURRENCY};

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Maximum age of a signed webhook, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

type HmacSha256 = Hmac<Sha256>;

/// Minimal Stripe REST client: hosted checkout sessions only.
pub struct StripeClient {
    http: Client,
    secret_key: String,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct CheckoutSession {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

impl StripeClient {
    pub fn new(secret_key: String) -> Self {
        Self {
            http: Client::new(),
            secret_key,
            api_base: STRIPE_API_BASE.to_string(),
        }
    }

    /// Create a one-off payment session for `plan` and return its hosted URL.
    ///
    /// The user id and credit amount ride along in the session metadata and
    /// come back in the `checkout.session.completed` webhook.
    pub async fn create_checkout_session(
        &self,
        plan: CreditPlan,
        user_id: &str,
        site_url: &str,
    ) -> Result<String, StripeError> {
        let site = site_url.trim_end_matches('/');
        let form = checkout_form(plan, user_id, site);

        let response = self
            .http
            .post(format!("{}/checkout/sessions", self.api_base))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<StripeErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or_else(|| format!("status {status}"));
            return Err(StripeError::Api(message));
        }

        let session: CheckoutSession = response.json().await?;
        tracing::info!(session_id = %session.id, user_id, plan = %plan, "Checkout session created");
        session.url.ok_or(StripeError::MissingUrl)
    }
}

fn checkout_form(plan: CreditPlan, user_id: &str, site: &str) -> Vec<(&'static str, String)> {
    vec![
        ("mode", "payment".to_string()),
        ("payment_method_types[0]", "card".to_string()),
        ("line_items[0][price_data][currency]", CHECKOUT_CURRENCY.to_string()),
        (
            "line_items[0][price_data][product_data][name]",
            plan.product_name().to_string(),
        ),
        (
            "line_items[0][price_data][unit_amount]",
            plan.unit_amount().to_string(),
        ),
        ("line_items[0][quantity]", "1".to_string()),
        (
            "success_url",
            format!("{site}/payment/success?session_id={{CHECKOUT_SESSION_ID}}"),
        ),
        ("cancel_url", format!("{site}/pricing")),
        ("metadata[userId]", user_id.to_string()),
        ("metadata[credits]", plan.credits().to_string()),
    ]
}

/// Check a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=...]`) against
/// the raw request body.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now_secs: i64,
) -> Result<(), StripeError> {
    let mut timestamp: Option<i64> = None;
    let mut candidates = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", v)) => timestamp = v.parse().ok(),
            Some(("v1", v)) => candidates.push(v),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(StripeError::MalformedSignature)?;
    if candidates.is_empty() {
        return Err(StripeError::MalformedSignature);
    }

    if (now_secs - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(StripeError::StaleSignature);
    }

    for candidate in candidates {
        let Some(expected) = hex::decode(candidate) else {
            continue;
        };
        // constant-time comparison
        if signing_mac(secret, timestamp, payload)
            .verify_slice(&expected)
            .is_ok()
        {
            return Ok(());
        }
    }

    Err(StripeError::SignatureMismatch)
}

/// Build a `Stripe-Signature` header value for `payload`.
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mac = signing_mac(secret, timestamp, payload);
    format!("t={timestamp},v1={}", hex::encode(&mac.finalize().into_bytes()))
}

fn signing_mac(secret: &str, timestamp: i64, payload: &[u8]) -> HmacSha256 {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac
}

/// The parts of a webhook event this service reads.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEventData {
    pub object: serde_json::Value,
}

/// Credits purchased in a completed checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditGrant {
    pub user_id: String,
    pub credits: i64,
}

impl WebhookEvent {
    /// The credit grant carried by a `checkout.session.completed` event, if
    /// it names a user and a positive amount.
    pub fn credit_grant(&self) -> Option<CreditGrant> {
        if self.event_type != "checkout.session.completed" {
            return None;
        }

        let metadata = self.data.object.get("metadata")?;
        let user_id = metadata.get("userId")?.as_str()?.trim();
        let credits = match metadata.get("credits")? {
            serde_json::Value::String(s) => s.trim().parse().ok()?,
            serde_json::Value::Number(n) => n.as_i64()?,
            _ => return None,
        };

        if user_id.is_empty() || credits <= 0 {
            return None;
        }

        Some(CreditGrant {
            user_id: user_id.to_string(),
            credits,
        })
    }
}

// hex encoding helpers
mod hex {
    pub fn encode(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    pub fn decode(s: &str) -> Option<Vec<u8>> {
        if s.len() % 2 != 0 {
            return None;
        }
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
            .collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StripeError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Stripe API error: {0}")]
    Api(String),

    #[error("Checkout session has no URL")]
    MissingUrl,

    #[error("Malformed Stripe-Signature header")]
    MalformedSignature,

    #[error("Webhook timestamp outside tolerance")]
    StaleSignature,

    #[error("No matching webhook signature")]
    SignatureMismatch,
}
