//! TechSprint API - REST layer, Postgres store and background jobs
//!
//! Exposes the consistency core from `sprint-lifecycle` over Axum. The
//! production collaborators live here: [`PgStore`] for records,
//! [`HttpObjectStore`] for file bytes and [`HttpMailer`] for confirmation
//! mail. The Redis cache backend comes from `sprint-storage`.

pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod jobs;
pub mod mail;
pub mod object_store;
#[cfg(feature = "openapi")]
pub mod openapi;
pub mod routes;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use config::{ApiConfig, CacheSettings, CollaboratorConfig, ConfigError};
pub use db::{DbConfig, PgStore};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use jobs::{file_sweep_task, FileSweepConfig};
pub use mail::HttpMailer;
pub use object_store::HttpObjectStore;
#[cfg(feature = "openapi")]
pub use openapi::ApiDoc;
pub use routes::create_api_router;
pub use state::AppState;
