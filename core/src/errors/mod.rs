//! Domain-specific error types and error handling.

mod types;

#[cfg(test)]
mod tests;

pub use types::{OtpError, ValidationError};

use thiserror::Error;
use vf_shared::errors::{error_codes, ErrorResponse, IntoErrorResponse};

/// Core domain errors
#[derive(Error, Debug)]
pub enum DomainError {
    /// Raised by store adapters; the engine reports it as a transient failure
    #[error("Internal error: {message}")]
    Internal { message: String },

    // Bridge to specific error types
    #[error(transparent)]
    Otp(#[from] OtpError),

    #[error(transparent)]
    ValidationErr(#[from] ValidationError),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    pub fn internal(message: impl Into<String>) -> Self {
        DomainError::Internal {
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            DomainError::Internal { .. } => true,
            DomainError::Otp(e) => e.is_retryable(),
            DomainError::ValidationErr(_) => false,
        }
    }

    pub fn as_otp(&self) -> Option<&OtpError> {
        match self {
            DomainError::Otp(e) => Some(e),
            _ => None,
        }
    }
}

impl IntoErrorResponse for OtpError {
    fn to_error_response(&self) -> ErrorResponse {
        match self {
            OtpError::RateLimited { retry_after_seconds } => ErrorResponse::new(
                error_codes::RATE_LIMIT_EXCEEDED,
                "Too many verification codes requested",
            )
            .add_detail("retry_after_seconds", retry_after_seconds),
            OtpError::ResendCooldown { retry_after_seconds } => ErrorResponse::new(
                error_codes::RESEND_COOLDOWN,
                "Please wait before requesting another code",
            )
            .add_detail("retry_after_seconds", retry_after_seconds),
            // Callers must not learn whether a code ever existed
            OtpError::NotFound | OtpError::Expired | OtpError::Superseded => ErrorResponse::new(
                error_codes::VERIFICATION_CODE_EXPIRED,
                "Verification code is invalid or has expired",
            ),
            OtpError::AlreadyUsed => ErrorResponse::new(
                error_codes::VERIFICATION_CODE_USED,
                "Verification code has already been used",
            ),
            OtpError::AttemptsExceeded => ErrorResponse::new(
                error_codes::ATTEMPTS_EXCEEDED,
                "Too many failed attempts, request a new code",
            ),
            OtpError::Transient { .. } => ErrorResponse::new(
                error_codes::SERVICE_UNAVAILABLE,
                "Service temporarily unavailable, please retry",
            ),
        }
    }
}

impl IntoErrorResponse for ValidationError {
    fn to_error_response(&self) -> ErrorResponse {
        match self {
            ValidationError::InvalidIdentity => ErrorResponse::new(
                error_codes::IDENTITY_INVALID,
                "Enter a valid phone number or email address",
            ),
            ValidationError::InvalidCodeFormat { expected_length } => ErrorResponse::new(
                error_codes::VERIFICATION_CODE_INVALID,
                format!("Verification code must be {} digits", expected_length),
            ),
            ValidationError::InvalidConfig { .. } => {
                ErrorResponse::new(error_codes::INTERNAL_ERROR, "Internal server error")
            }
        }
    }
}

impl IntoErrorResponse for DomainError {
    fn to_error_response(&self) -> ErrorResponse {
        match self {
            DomainError::Internal { .. } => {
                ErrorResponse::new(error_codes::INTERNAL_ERROR, "Internal server error")
            }
            DomainError::Otp(e) => e.to_error_response(),
            DomainError::ValidationErr(e) => e.to_error_response(),
        }
    }
}
