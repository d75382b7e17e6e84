//! Passcode-specific error types
//!
//! Messages here are operator-facing. The caller-facing shape, including the
//! collapsing of unknown, expired and superseded codes into one public code,
//! lives in the `IntoErrorResponse` implementation.

use thiserror::Error;

/// Outcomes of issuance and validation that are not a plain success
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OtpError {
    #[error("Too many codes requested, retry in {retry_after_seconds} seconds")]
    RateLimited { retry_after_seconds: u64 },

    #[error("A code was issued recently, retry in {retry_after_seconds} seconds")]
    ResendCooldown { retry_after_seconds: u64 },

    #[error("Verification code not found")]
    NotFound,

    #[error("Verification code expired")]
    Expired,

    #[error("Verification code already used")]
    AlreadyUsed,

    #[error("Maximum attempts exceeded")]
    AttemptsExceeded,

    #[error("Verification code replaced by a newer one")]
    Superseded,

    #[error("Temporary failure during {operation}: {message}")]
    Transient { operation: String, message: String },
}

impl OtpError {
    pub fn transient(operation: impl Into<String>, message: impl Into<String>) -> Self {
        OtpError::Transient {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Only store and transport failures are worth retrying unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, OtpError::Transient { .. })
    }
}

/// Input that is rejected before any record is touched
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Identity is neither an E.164 phone number nor an email address")]
    InvalidIdentity,

    #[error("Code must be exactly {expected_length} digits")]
    InvalidCodeFormat { expected_length: usize },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}
