//! Postgres access for the credit ledger and the creations gallery.
//!
//! `migrations/` creates the `user_credits` and `creations` tables plus the
//! `deduct_credits` and `add_credits` SQL functions the web client calls.
//! Both treat a missing `user_credits` row as the starting grant.

use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

/// Connect the pool shared by the ledger store and gallery queries.
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
}

/// Apply `migrations/` so `user_credits` and `creations` exist before serving.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| sqlx::Error::Migrate(Box::new(e)))
}

pub mod queries;
