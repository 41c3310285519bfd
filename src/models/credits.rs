use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

/// Where a ledger answer came from.
///
/// `LocalFallback` means the remote store was unreachable and the value was
/// read from or written to the non-durable local cache.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CreditSource {
    Remote,
    LocalFallback,
}

/// A ledger result tagged with its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ledgered<T> {
    pub value: T,
    pub source: CreditSource,
}

impl<T> Ledgered<T> {
    pub fn remote(value: T) -> Self {
        Self {
            value,
            source: CreditSource::Remote,
        }
    }

    pub fn local(value: T) -> Self {
        Self {
            value,
            source: CreditSource::LocalFallback,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.source == CreditSource::LocalFallback
    }
}

/// A saved generation in the user's gallery (`creations` table).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Creation {
    pub id: Uuid,
    pub user_id: String,
    pub original_image_url: String,
    pub generated_image_url: String,
    pub style: String,
    pub prompt: Option<String>,
    pub job_title: Option<String>,
    pub cost: i32,
    pub created_at: DateTime<Utc>,
}

/// Helper for inserting creations
#[derive(Debug, Clone)]
pub struct NewCreation {
    pub user_id: String,
    pub original_image_url: String,
    pub generated_image_url: String,
    pub style: String,
    pub prompt: Option<String>,
    pub job_title: Option<String>,
    pub cost: i32,
}

#[derive(Debug, Serialize)]
pub struct CreditsResponse {
    pub credits: i64,
    pub source: CreditSource,
}

#[derive(Debug, Deserialize, garde::Validate)]
pub struct DeductRequest {
    #[garde(range(min = 1, max = 1000))]
    pub amount: i64,
}

#[derive(Debug, Serialize)]
pub struct DeductResponse {
    pub success: bool,
    pub credits: i64,
    pub source: CreditSource,
}
