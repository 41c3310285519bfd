//! MyMeme backend
//!
//! Turns a selfie and a job title into a styled caricature, animates
//! caricatures into short videos, and sells the credits that pay for both.
//! Image and video generation go through the Runware API, purchases through
//! Stripe Checkout. Balances live in Postgres with a Redis fallback, and
//! video tasks are tracked in a per-user job queue that the `worker` binary
//! polls to completion.

pub mod app_state;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
