//! Unit tests for domain error types

use crate::errors::{DomainError, OtpError, ValidationError};
use vf_shared::errors::{error_codes, IntoErrorResponse};

#[test]
fn test_otp_error_messages() {
    let error = OtpError::RateLimited {
        retry_after_seconds: 120,
    };
    assert!(error.to_string().contains("120 seconds"));

    let error = OtpError::transient("find_by_id", "connection reset");
    assert_eq!(
        error.to_string(),
        "Temporary failure during find_by_id: connection reset"
    );
}

#[test]
fn test_only_transient_is_retryable() {
    assert!(OtpError::transient("insert", "timeout").is_retryable());
    assert!(!OtpError::NotFound.is_retryable());
    assert!(!OtpError::AttemptsExceeded.is_retryable());
    assert!(!OtpError::ResendCooldown { retry_after_seconds: 5 }.is_retryable());

    let error: DomainError = ValidationError::InvalidIdentity.into();
    assert!(!error.is_retryable());
    assert!(DomainError::internal("pool closed").is_retryable());
}

#[test]
fn test_unknown_expired_and_superseded_share_public_code() {
    for error in [OtpError::NotFound, OtpError::Expired, OtpError::Superseded] {
        let response = error.to_error_response();
        assert_eq!(response.error, error_codes::VERIFICATION_CODE_EXPIRED);
        assert_eq!(response.message, "Verification code is invalid or has expired");
        assert!(response.details.is_none());
    }
}

#[test]
fn test_rate_limit_response_carries_retry_hint() {
    let response = OtpError::ResendCooldown {
        retry_after_seconds: 42,
    }
    .to_error_response();

    assert_eq!(response.error, error_codes::RESEND_COOLDOWN);
    assert_eq!(
        response.detail("retry_after_seconds"),
        Some(&serde_json::json!(42))
    );
}

#[test]
fn test_domain_error_bridges() {
    let error: DomainError = OtpError::AlreadyUsed.into();
    assert_eq!(error.as_otp(), Some(&OtpError::AlreadyUsed));
    assert_eq!(
        error.to_error_response().error,
        error_codes::VERIFICATION_CODE_USED
    );

    let error: DomainError = ValidationError::InvalidCodeFormat { expected_length: 6 }.into();
    assert!(error.as_otp().is_none());
    assert_eq!(
        error.to_error_response().error,
        error_codes::VERIFICATION_CODE_INVALID
    );

    let error = DomainError::internal("secret connection string");
    let response = error.to_error_response();
    assert_eq!(response.error, error_codes::INTERNAL_ERROR);
    assert!(!response.message.contains("secret"));
}
