use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000"). Optional for worker processes.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Supabase Postgres connection string
    pub database_url: String,

    /// Redis connection string for job lists and the credit cache
    pub redis_url: String,

    /// Runware API key
    pub runware_api_key: String,

    /// Runware task endpoint
    #[serde(default = "default_runware_api_url")]
    pub runware_api_url: String,

    /// Stripe secret key for checkout session creation
    pub stripe_secret_key: String,

    /// Stripe webhook signing secret. Webhooks are accepted unverified when unset.
    #[serde(default)]
    pub stripe_webhook_secret: Option<String>,

    /// Public site URL used for checkout redirects
    #[serde(default = "default_site_url")]
    pub site_url: String,

    /// HS256 secret used by Supabase to sign session JWTs
    pub supabase_jwt_secret: String,

    /// Credits granted to a new user
    #[serde(default = "default_initial_credits")]
    pub initial_credits: i64,

    /// Seconds between poller ticks
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Seconds before a processing job is failed as timed out
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_runware_api_url() -> String {
    "https://api.runware.ai/v1".to_string()
}

fn default_site_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_initial_credits() -> i64 {
    3
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_job_timeout_secs() -> u64 {
    600
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }
}

/// Settings for the `worker` binary, which only talks to Redis and Runware.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// Redis connection string for job lists
    pub redis_url: String,

    /// Runware API key
    pub runware_api_key: String,

    /// Runware task endpoint
    #[serde(default = "default_runware_api_url")]
    pub runware_api_url: String,

    /// Seconds between poller ticks
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Seconds before a processing job is failed as timed out
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }
}
