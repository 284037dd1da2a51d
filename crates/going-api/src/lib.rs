//! # going API
//!
//! HTTP handlers, the session extractor, and the router that ties the
//! session store and password service to the cookie contract.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod response;
pub mod router;
pub mod state;
pub mod users;

pub use error::ApiError;
pub use router::build_router;
pub use state::AppState;
