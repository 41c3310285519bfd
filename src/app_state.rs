use sqlx::PgPool;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::{
    credits::CreditsLedger, job_queue::JobQueue, runware::RunwareClient, stripe::StripeClient,
};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: PgPool,
    pub runware: Arc<RunwareClient>,
    pub stripe: Arc<StripeClient>,
    pub jobs: Arc<JobQueue>,
    pub credits: Arc<CreditsLedger>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        db: PgPool,
        runware: RunwareClient,
        stripe: StripeClient,
        jobs: JobQueue,
        credits: CreditsLedger,
    ) -> Self {
        Self {
            config: Arc::new(config),
            db,
            runware: Arc::new(runware),
            stripe: Arc::new(stripe),
            jobs: Arc::new(jobs),
            credits: Arc::new(credits),
        }
    }
}
