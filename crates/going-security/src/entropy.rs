//! Secure random bytes

use rand::{rngs::OsRng, TryRngCore};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntropyError {
    #[error("secure random source unavailable: {0}")]
    Unavailable(String),
}

/// Source of cryptographically secure bytes.
#[cfg_attr(test, mockall::automock)]
pub trait EntropySource: Send + Sync {
    fn try_fill(&self, dest: &mut [u8]) -> Result<(), EntropyError>;
}

/// The operating system CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn try_fill(&self, dest: &mut [u8]) -> Result<(), EntropyError> {
        OsRng
            .try_fill_bytes(dest)
            .map_err(|e| EntropyError::Unavailable(e.to_string()))
    }
}
