//! Server-side sessions with sliding expiration.
//!
//! [`SessionStore`] is the single owner of session state. It is meant to be
//! constructed once by the process and shared (usually behind an `Arc`) with
//! whatever serves requests. Expired sessions are evicted according to a
//! [`ReapStrategy`]; a [`Reaper`] drives the periodic variant.

mod clock;
mod error;
mod reaper;
mod store;
mod values;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::SessionError;
pub use reaper::{ReapStrategy, Reaper};
pub use store::{Session, SessionStore, SessionStoreConfig, StoreStats, SESSION_ID_BYTES};
pub use values::{SessionKey, SessionValues};
