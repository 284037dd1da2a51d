//! Error types for session store operations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    /// Absent, expired or deleted. Callers treat the user as unauthenticated.
    #[error("session not found or expired")]
    NotFound,

    /// No secure randomness and the insecure id fallback is disabled.
    #[error("secure random source unavailable: {0}")]
    RandomSourceFailure(String),

    /// `now + lifetime` does not fit in a timestamp.
    #[error("session lifetime {0} overflows the expiry timestamp")]
    LifetimeOverflow(chrono::Duration),

    /// A stored value could not be encoded or decoded as the key's type.
    #[error("session value error: {0}")]
    Value(#[from] serde_json::Error),
}
