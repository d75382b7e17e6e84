//! Shared utilities and common types for the Veriflow OTP services
//!
//! This crate provides common functionality used across the workspace:
//! - Configuration types (OTP policy, record store, counter store, logging)
//! - Error response structure and public error codes
//! - Identity utilities (normalization, validation, masking)

pub mod config;
pub mod errors;
pub mod utils;

// Re-export commonly used items at crate root
pub use config::{
    AppConfig, CacheConfig, DatabaseConfig, Environment, LogFormat, LoggingConfig, OtpConfig,
};
pub use errors::{error_codes, ErrorResponse, IntoErrorResponse};
pub use utils::identity;
