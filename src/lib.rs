//! Library loans server
//!
//! REST JSON API for users, books, copies and loans, plus the expiry
//! pipeline: a scanner that publishes loan events to a Redis Stream and a
//! notifier that turns them into borrower emails.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod ports;
pub mod repository;
pub mod services;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<services::Services>,
}
