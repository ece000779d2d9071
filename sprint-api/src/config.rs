//! API Configuration Module
//!
//! Server, cache and collaborator settings. Everything is read from
//! `SPRINT_*` environment variables and falls back to development defaults.
//! Database settings live in [`crate::db::DbConfig`] and sweep settings in
//! [`crate::jobs::FileSweepConfig`].

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::constants::{
    DEFAULT_BIND_ADDR, DEFAULT_CACHE_KEY_PREFIX, DEFAULT_CACHE_TTL_SECS,
    DEFAULT_CORS_MAX_AGE_SECS, DEFAULT_HTTP_CLIENT_TIMEOUT_SECS, DEFAULT_MAIL_FROM,
};

/// Invalid configuration detected at startup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has an invalid value '{value}': {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
}

fn env_string(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(var: &str, default: T) -> T {
    std::env::var(var)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Split a comma-separated origin list, dropping blanks.
fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect()
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Address the server binds to.
    pub bind_addr: String,

    /// Allowed CORS origins. Empty means allow all origins (dev mode).
    /// Example: "https://techsprint.in,https://admin.techsprint.in"
    pub cors_origins: Vec<String>,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            cors_origins: Vec::new(),
            cors_max_age_secs: DEFAULT_CORS_MAX_AGE_SECS,
        }
    }
}

impl ApiConfig {
    /// Environment variables:
    /// - `SPRINT_BIND_ADDR`: bind address (default: 0.0.0.0:3000)
    /// - `SPRINT_CORS_ORIGINS`: comma-separated allowed origins (empty = allow all)
    /// - `SPRINT_CORS_MAX_AGE_SECS`: preflight cache duration (default: 86400)
    pub fn from_env() -> Self {
        Self {
            bind_addr: env_string("SPRINT_BIND_ADDR")
                .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            cors_origins: env_string("SPRINT_CORS_ORIGINS")
                .map(|s| parse_origins(&s))
                .unwrap_or_default(),
            cors_max_age_secs: env_parse("SPRINT_CORS_MAX_AGE_SECS", DEFAULT_CORS_MAX_AGE_SECS),
        }
    }

    /// Check if running in production mode (strict CORS).
    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }

    /// Check if a given origin is allowed.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            return true;
        }
        self.cors_origins.iter().any(|allowed| allowed == origin)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind_addr
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::InvalidValue {
                var: "SPRINT_BIND_ADDR",
                value: self.bind_addr.clone(),
                reason: e.to_string(),
            })
    }
}

// ============================================================================
// CACHE CONFIGURATION
// ============================================================================

/// Which cache backend to run and how long entries live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Redis URL. The in-process cache is used when unset.
    pub redis_url: Option<String>,
    pub entry_ttl: Duration,
    /// Namespace prepended by the Redis backend.
    pub key_prefix: Option<String>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            redis_url: None,
            entry_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            key_prefix: Some(DEFAULT_CACHE_KEY_PREFIX.to_string()),
        }
    }
}

impl CacheSettings {
    /// Environment variables:
    /// - `SPRINT_REDIS_URL`: Redis connection URL (default: unset)
    /// - `SPRINT_CACHE_TTL_SECS`: entry TTL (default: 3600)
    /// - `SPRINT_CACHE_KEY_PREFIX`: Redis key namespace (default: sprint)
    pub fn from_env() -> Self {
        Self {
            redis_url: env_string("SPRINT_REDIS_URL"),
            entry_ttl: Duration::from_secs(env_parse(
                "SPRINT_CACHE_TTL_SECS",
                DEFAULT_CACHE_TTL_SECS,
            )),
            key_prefix: match std::env::var("SPRINT_CACHE_KEY_PREFIX") {
                // An explicitly empty prefix disables namespacing.
                Ok(s) if s.trim().is_empty() => None,
                Ok(s) => Some(s.trim().to_string()),
                Err(_) => Some(DEFAULT_CACHE_KEY_PREFIX.to_string()),
            },
        }
    }
}

// ============================================================================
// COLLABORATOR CONFIGURATION
// ============================================================================

/// Object storage and mail relay endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollaboratorConfig {
    pub object_store_url: Option<String>,
    pub object_store_token: Option<String>,
    pub mail_url: Option<String>,
    pub mail_token: Option<String>,
    pub mail_from: String,
    pub http_timeout: Duration,
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self {
            object_store_url: None,
            object_store_token: None,
            mail_url: None,
            mail_token: None,
            mail_from: DEFAULT_MAIL_FROM.to_string(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_CLIENT_TIMEOUT_SECS),
        }
    }
}

impl CollaboratorConfig {
    /// Environment variables:
    /// - `SPRINT_OBJECT_STORE_URL` / `SPRINT_OBJECT_STORE_TOKEN`
    /// - `SPRINT_MAIL_URL` / `SPRINT_MAIL_TOKEN` / `SPRINT_MAIL_FROM`
    pub fn from_env() -> Self {
        Self {
            object_store_url: env_string("SPRINT_OBJECT_STORE_URL"),
            object_store_token: env_string("SPRINT_OBJECT_STORE_TOKEN"),
            mail_url: env_string("SPRINT_MAIL_URL"),
            mail_token: env_string("SPRINT_MAIL_TOKEN"),
            mail_from: env_string("SPRINT_MAIL_FROM")
                .unwrap_or_else(|| DEFAULT_MAIL_FROM.to_string()),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_CLIENT_TIMEOUT_SECS),
        }
    }
}
