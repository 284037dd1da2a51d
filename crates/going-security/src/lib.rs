//! # going security
//!
//! Password hashing, server-side sessions and the session cookie contract.

pub mod cookie;
pub mod entropy;
pub mod password;
pub mod session;

pub use cookie::SessionCookie;
pub use entropy::{EntropyError, EntropySource, OsEntropy};
pub use password::{HashParams, PasswordError, PasswordService};
pub use session::{
    Clock, ManualClock, ReapStrategy, Reaper, Session, SessionError, SessionKey, SessionStore,
    SessionStoreConfig, StoreStats, SystemClock,
};
