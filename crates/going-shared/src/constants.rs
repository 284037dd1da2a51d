//! Application-wide constants

pub const ENV_VAR: &str = "GOING_ENV";
pub const ENV_PREFIX: &str = "GOING";
pub const DEFAULT_ENV: &str = "development";
pub const DEFAULT_APP_NAME: &str = "going";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

pub const DEFAULT_SESSION_COOKIE_NAME: &str = "going_session";
pub const DEFAULT_SESSION_SECRET: &str = "change-this-secret-key";
pub const DEFAULT_SESSION_LIFETIME_MINUTES: i64 = 120;
/// One year.
pub const MAX_SESSION_LIFETIME_MINUTES: i64 = 60 * 24 * 365;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Argon2id defaults: 64 MiB, 3 passes, 4 lanes.
pub const DEFAULT_HASH_MEMORY_KIB: u32 = 64 * 1024;
pub const DEFAULT_HASH_TIME_COST: u32 = 3;
pub const DEFAULT_HASH_PARALLELISM: u32 = 4;
pub const DEFAULT_HASH_KEY_LENGTH: usize = 32;
pub const DEFAULT_HASH_SALT_LENGTH: usize = 16;

/// Ceilings on costs read back out of stored hashes. Anything above these is
/// treated as a malformed hash rather than derived.
pub const MAX_HASH_MEMORY_KIB: u32 = 1024 * 1024;
pub const MAX_HASH_TIME_COST: u32 = 32;
pub const MAX_HASH_PARALLELISM: u32 = 255;

pub const DEFAULT_LOG_FILTER: &str = "info";
/// `json` (default) or `pretty`.
pub const LOG_FORMAT_VAR: &str = "GOING_LOG_FORMAT";
