//! # going shared
//!
//! Configuration, constants, error and telemetry shared by the going crates.

pub mod config;
pub mod constants;
pub mod error;
pub mod telemetry;

pub use error::AppError;
