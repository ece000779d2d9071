//! Constants for the TechSprint API
//!
//! Defaults for every environment-driven setting live here so the config
//! structs and their tests agree on them.

// ============================================================================
// SERVER
// ============================================================================

/// Default HTTP bind address
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Default CORS max age in seconds (24 hours)
pub const DEFAULT_CORS_MAX_AGE_SECS: u64 = 86400;

/// Largest accepted upload body (25 MiB)
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Header carrying the client-side file name on uploads
pub const FILE_NAME_HEADER: &str = "x-file-name";

/// Header carrying the uploading principal on uploads
pub const USER_ID_HEADER: &str = "x-user-id";

// ============================================================================
// DATABASE
// ============================================================================

pub const DEFAULT_DB_HOST: &str = "localhost";
pub const DEFAULT_DB_PORT: u16 = 5432;
pub const DEFAULT_DB_NAME: &str = "sprint";
pub const DEFAULT_DB_USER: &str = "postgres";
pub const DEFAULT_DB_POOL_SIZE: usize = 16;
pub const DEFAULT_DB_TIMEOUT_SECS: u64 = 5;

// ============================================================================
// CACHE
// ============================================================================

/// TTL applied to every populated cache entry (1 hour)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

/// Namespace prepended to Redis keys
pub const DEFAULT_CACHE_KEY_PREFIX: &str = "sprint";

// ============================================================================
// COLLABORATORS
// ============================================================================

/// Sender address for outgoing mail
pub const DEFAULT_MAIL_FROM: &str = "noreply@techsprint.local";

/// Timeout for object storage and mail relay requests
pub const DEFAULT_HTTP_CLIENT_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// FILE SWEEP
// ============================================================================

/// How often the background sweep runs (1 hour)
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;

/// Age past which a `Temporary` file is reclaimable (24 hours)
pub const DEFAULT_SWEEP_RETENTION_SECS: u64 = 86400;

/// Maximum candidates per sweep pass
pub const DEFAULT_SWEEP_BATCH_SIZE: usize = 100;
