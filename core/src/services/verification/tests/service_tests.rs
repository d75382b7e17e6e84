//! Unit tests for the verification engine

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;
use vf_shared::config::OtpConfig;

use crate::domain::entities::{IssueMetadata, OtpPurpose, OtpStatus, RateKind};
use crate::errors::{DomainError, OtpError, ValidationError};
use crate::repositories::{InMemoryCounterStore, InMemoryRecordStore, RecordStore};
use crate::services::verification::VerificationEngine;

use super::mocks::{
    harness, harness_with_notifier, record_with_code, relaxed_config, wrong_code, MockNotifier,
    NotifierMode,
};

const PHONE: &str = "+15551234567";

fn otp_error(error: DomainError) -> OtpError {
    match error {
        DomainError::Otp(e) => e,
        other => panic!("Expected OTP error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_generate_with_defaults() {
    let h = harness(OtpConfig::default());
    let before = Utc::now();

    let issued = h
        .engine
        .generate(PHONE, OtpPurpose::Login, IssueMetadata::default())
        .await
        .unwrap();

    assert_eq!(issued.identity, PHONE);
    assert_eq!(issued.attempts_remaining, 5);
    assert!(issued.notification_accepted);
    assert!(issued.expires_at >= before + chrono::Duration::minutes(10));
    assert!(issued.expires_at <= Utc::now() + chrono::Duration::minutes(10));
    assert!(issued.next_resend_at >= before + chrono::Duration::seconds(60));

    let code = h.notifier.last_code(PHONE).unwrap();
    assert_eq!(code.len(), 6);
    assert!(code.chars().all(|c| c.is_ascii_digit()));

    let stored = h.records.find_by_id(issued.otp_id).await.unwrap().unwrap();
    assert_eq!(stored.status, OtpStatus::Active);
    assert_eq!(stored.attempts, 0);
    assert_ne!(stored.code_hash, code);
}

#[tokio::test]
async fn test_generate_normalizes_identity() {
    let h = harness(OtpConfig::default());

    let issued = h
        .engine
        .generate("  Jane.Doe@Example.COM ", OtpPurpose::Registration, IssueMetadata::default())
        .await
        .unwrap();

    assert_eq!(issued.identity, "jane.doe@example.com");
    assert!(h.notifier.last_code("jane.doe@example.com").is_some());
}

#[tokio::test]
async fn test_generate_rejects_invalid_identity() {
    let h = harness(OtpConfig::default());

    for identity in ["", "15551234567", "+1555", "not-an-email@", "@example.com"] {
        let result = h
            .engine
            .generate(identity, OtpPurpose::Login, IssueMetadata::default())
            .await;
        assert!(matches!(
            result,
            Err(DomainError::ValidationErr(ValidationError::InvalidIdentity))
        ));
    }
    assert!(h.records.is_empty().await);
}

#[tokio::test]
async fn test_generate_stores_metadata() {
    let h = harness(OtpConfig::default());
    let metadata = IssueMetadata::new()
        .with_ip_address("198.51.100.4")
        .with_user_agent("ios/17.2");

    let issued = h
        .engine
        .generate(PHONE, OtpPurpose::Login, metadata.clone())
        .await
        .unwrap();

    let stored = h.records.find_by_id(issued.otp_id).await.unwrap().unwrap();
    assert_eq!(stored.metadata, metadata);
}

#[tokio::test]
async fn test_validate_correct_code() {
    let h = harness(OtpConfig::default());
    let issued = h
        .engine
        .generate(PHONE, OtpPurpose::Login, IssueMetadata::default())
        .await
        .unwrap();
    let code = h.notifier.last_code(PHONE).unwrap();

    let outcome = h.engine.validate(issued.otp_id, &code).await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.otp_id, issued.otp_id);

    let stored = h.records.find_by_id(issued.otp_id).await.unwrap().unwrap();
    assert_eq!(stored.status, OtpStatus::Used);
}

#[tokio::test]
async fn test_validate_twice_reports_already_used() {
    let h = harness(OtpConfig::default());
    let issued = h
        .engine
        .generate(PHONE, OtpPurpose::Login, IssueMetadata::default())
        .await
        .unwrap();
    let code = h.notifier.last_code(PHONE).unwrap();

    assert!(h.engine.validate(issued.otp_id, &code).await.unwrap().success);

    let error = h.engine.validate(issued.otp_id, &code).await.unwrap_err();
    assert_eq!(otp_error(error), OtpError::AlreadyUsed);
}

#[tokio::test]
async fn test_wrong_codes_lock_the_record() {
    let h = harness(OtpConfig::default());
    let issued = h
        .engine
        .generate(PHONE, OtpPurpose::Login, IssueMetadata::default())
        .await
        .unwrap();
    let code = h.notifier.last_code(PHONE).unwrap();
    let wrong = wrong_code(6);

    for expected_remaining in [4, 3, 2, 1] {
        let outcome = h.engine.validate(issued.otp_id, &wrong).await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.attempts_remaining, expected_remaining);
    }

    let error = h.engine.validate(issued.otp_id, &wrong).await.unwrap_err();
    assert_eq!(otp_error(error), OtpError::AttemptsExceeded);

    let stored = h.records.find_by_id(issued.otp_id).await.unwrap().unwrap();
    assert_eq!(stored.status, OtpStatus::Locked);
    assert_eq!(stored.attempts, 5);

    // The correct code no longer helps
    let error = h.engine.validate(issued.otp_id, &code).await.unwrap_err();
    assert_eq!(otp_error(error), OtpError::AttemptsExceeded);
    let stored = h.records.find_by_id(issued.otp_id).await.unwrap().unwrap();
    assert_eq!(stored.attempts, 5);
}

#[tokio::test]
async fn test_malformed_code_does_not_consume_attempt() {
    let h = harness(OtpConfig::default());
    let issued = h
        .engine
        .generate(PHONE, OtpPurpose::Login, IssueMetadata::default())
        .await
        .unwrap();

    for code in ["12345", "1234567", "12a456", ""] {
        let result = h.engine.validate(issued.otp_id, code).await;
        assert!(matches!(
            result,
            Err(DomainError::ValidationErr(ValidationError::InvalidCodeFormat {
                expected_length: 6
            }))
        ));
    }

    let stored = h.records.find_by_id(issued.otp_id).await.unwrap().unwrap();
    assert_eq!(stored.attempts, 0);
    assert_eq!(stored.status, OtpStatus::Active);
}

#[tokio::test]
async fn test_validate_unknown_id() {
    let h = harness(OtpConfig::default());

    let error = h.engine.validate(Uuid::new_v4(), "123456").await.unwrap_err();
    assert_eq!(otp_error(error), OtpError::NotFound);
}

#[tokio::test]
async fn test_validate_expired_record() {
    let config = OtpConfig::default();
    let h = harness(config.clone());
    let mut record = record_with_code(PHONE, "123456", &config);
    record.created_at = Utc::now() - chrono::Duration::minutes(20);
    record.expires_at = Utc::now() - chrono::Duration::minutes(10);
    h.records.insert_raw(record.clone()).await;

    let error = h.engine.validate(record.id, "123456").await.unwrap_err();
    assert_eq!(otp_error(error), OtpError::Expired);

    let error = h.engine.validate(record.id, "654321").await.unwrap_err();
    assert_eq!(otp_error(error), OtpError::Expired);

    let stored = h.records.find_by_id(record.id).await.unwrap().unwrap();
    assert_eq!(stored.attempts, 0);
    assert_eq!(stored.status, OtpStatus::Active);
}

#[tokio::test]
async fn test_new_code_supersedes_old_one() {
    let h = harness(relaxed_config());

    let first = h
        .engine
        .generate(PHONE, OtpPurpose::Login, IssueMetadata::default())
        .await
        .unwrap();
    let first_code = h.notifier.last_code(PHONE).unwrap();

    let second = h
        .engine
        .generate(PHONE, OtpPurpose::Login, IssueMetadata::default())
        .await
        .unwrap();
    let second_code = h.notifier.last_code(PHONE).unwrap();

    let error = h.engine.validate(first.otp_id, &first_code).await.unwrap_err();
    assert_eq!(otp_error(error), OtpError::Superseded);

    assert!(h.engine.validate(second.otp_id, &second_code).await.unwrap().success);

    let records = h.records.records_for(PHONE, OtpPurpose::Login).await;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].status, OtpStatus::Superseded);
    assert_eq!(records[1].status, OtpStatus::Used);
}

#[tokio::test]
async fn test_purposes_are_isolated() {
    let h = harness(OtpConfig::default());

    let login = h
        .engine
        .generate(PHONE, OtpPurpose::Login, IssueMetadata::default())
        .await
        .unwrap();
    let login_code = h.notifier.last_code(PHONE).unwrap();

    // No cooldown or supersession across purposes
    h.engine
        .generate(PHONE, OtpPurpose::PasswordReset, IssueMetadata::default())
        .await
        .unwrap();

    assert!(h.engine.validate(login.otp_id, &login_code).await.unwrap().success);
}

#[tokio::test]
async fn test_resend_cooldown() {
    let h = harness(OtpConfig::default());

    h.engine
        .generate(PHONE, OtpPurpose::Login, IssueMetadata::default())
        .await
        .unwrap();

    let error = h
        .engine
        .generate(PHONE, OtpPurpose::Login, IssueMetadata::default())
        .await
        .unwrap_err();
    match otp_error(error) {
        OtpError::ResendCooldown {
            retry_after_seconds,
        } => assert!(retry_after_seconds > 0 && retry_after_seconds <= 60),
        other => panic!("Expected cooldown, got {:?}", other),
    }

    assert_eq!(h.records.len().await, 1);
}

#[tokio::test]
async fn test_cooldown_elapsed_allows_new_code() {
    let config = OtpConfig::default();
    let h = harness(config.clone());
    let mut old = record_with_code(PHONE, "123456", &config);
    old.created_at = Utc::now() - chrono::Duration::seconds(61);
    h.records.insert_raw(old.clone()).await;

    h.engine
        .generate(PHONE, OtpPurpose::Login, IssueMetadata::default())
        .await
        .unwrap();

    let old = h.records.find_by_id(old.id).await.unwrap().unwrap();
    assert_eq!(old.status, OtpStatus::Superseded);
}

#[tokio::test]
async fn test_rate_window_exhausted() {
    let config = OtpConfig {
        resend_cooldown_seconds: 0,
        ..Default::default()
    };
    let h = harness(config);

    for _ in 0..3 {
        h.engine
            .generate(PHONE, OtpPurpose::Login, IssueMetadata::default())
            .await
            .unwrap();
    }

    let error = h
        .engine
        .generate(PHONE, OtpPurpose::Login, IssueMetadata::default())
        .await
        .unwrap_err();
    match otp_error(error) {
        OtpError::RateLimited {
            retry_after_seconds,
        } => assert!(retry_after_seconds > 3500 && retry_after_seconds <= 3600),
        other => panic!("Expected rate limit, got {:?}", other),
    }

    assert_eq!(h.records.len().await, 3);
    assert_eq!(h.notifier.sent_count(PHONE), 3);

    let window = h
        .engine
        .rate_window(PHONE, OtpPurpose::Login, RateKind::OtpIssue)
        .await
        .unwrap();
    assert_eq!(window.count, 3);
    assert!(window.is_exhausted(3));
}

#[tokio::test]
async fn test_lost_counters_relax_limit_only() {
    let config = OtpConfig {
        resend_cooldown_seconds: 0,
        ..Default::default()
    };
    let h = harness(config);

    for _ in 0..3 {
        h.engine
            .generate(PHONE, OtpPurpose::Login, IssueMetadata::default())
            .await
            .unwrap();
    }
    h.counters.clear().await;

    let issued = h
        .engine
        .generate(PHONE, OtpPurpose::Login, IssueMetadata::default())
        .await
        .unwrap();
    let code = h.notifier.last_code(PHONE).unwrap();
    assert!(h.engine.validate(issued.otp_id, &code).await.unwrap().success);
}

#[tokio::test]
async fn test_resend_requires_prior_code() {
    let h = harness(relaxed_config());

    let error = h.engine.resend(PHONE, OtpPurpose::Login).await.unwrap_err();
    assert_eq!(otp_error(error), OtpError::NotFound);
}

#[tokio::test]
async fn test_resend_supersedes_and_counts_separately() {
    let h = harness(relaxed_config());
    let metadata = IssueMetadata::new().with_ip_address("192.0.2.10");

    let first = h
        .engine
        .generate(PHONE, OtpPurpose::Login, metadata.clone())
        .await
        .unwrap();
    let resent = h.engine.resend(PHONE, OtpPurpose::Login).await.unwrap();

    assert_ne!(first.otp_id, resent.otp_id);
    let old = h.records.find_by_id(first.otp_id).await.unwrap().unwrap();
    assert_eq!(old.status, OtpStatus::Superseded);

    let new = h.records.find_by_id(resent.otp_id).await.unwrap().unwrap();
    assert_eq!(new.metadata, metadata);

    let issue = h
        .engine
        .rate_window(PHONE, OtpPurpose::Login, RateKind::OtpIssue)
        .await
        .unwrap();
    let resend = h
        .engine
        .rate_window(PHONE, OtpPurpose::Login, RateKind::OtpResend)
        .await
        .unwrap();
    assert_eq!(issue.count, 1);
    assert_eq!(resend.count, 1);

    let code = h.notifier.last_code(PHONE).unwrap();
    assert!(h.engine.validate(resent.otp_id, &code).await.unwrap().success);
}

#[tokio::test]
async fn test_resend_respects_cooldown() {
    let h = harness(OtpConfig::default());

    h.engine
        .generate(PHONE, OtpPurpose::Login, IssueMetadata::default())
        .await
        .unwrap();

    let error = h.engine.resend(PHONE, OtpPurpose::Login).await.unwrap_err();
    assert!(matches!(otp_error(error), OtpError::ResendCooldown { .. }));
}

#[tokio::test]
async fn test_resend_after_expiry() {
    let config = relaxed_config();
    let h = harness(config.clone());
    let mut expired = record_with_code(PHONE, "123456", &config);
    expired.created_at = Utc::now() - chrono::Duration::minutes(30);
    expired.expires_at = Utc::now() - chrono::Duration::minutes(20);
    h.records.insert_raw(expired).await;

    let resent = h.engine.resend(PHONE, OtpPurpose::Login).await.unwrap();
    let code = h.notifier.last_code(PHONE).unwrap();
    assert!(h.engine.validate(resent.otp_id, &code).await.unwrap().success);
}

#[tokio::test]
async fn test_notifier_failure_does_not_fail_issuance() {
    for mode in [NotifierMode::Reject, NotifierMode::Fail] {
        let h = harness_with_notifier(OtpConfig::default(), mode);

        let issued = h
            .engine
            .generate(PHONE, OtpPurpose::Login, IssueMetadata::default())
            .await
            .unwrap();
        assert!(!issued.notification_accepted);

        let stored = h.records.find_by_id(issued.otp_id).await.unwrap().unwrap();
        assert_eq!(stored.status, OtpStatus::Active);
    }
}

#[tokio::test(start_paused = true)]
async fn test_notifier_timeout_is_bounded() {
    let h = harness_with_notifier(OtpConfig::default(), NotifierMode::Hang);

    let issued = h
        .engine
        .generate(PHONE, OtpPurpose::Login, IssueMetadata::default())
        .await
        .unwrap();
    assert!(!issued.notification_accepted);
}

#[tokio::test]
async fn test_counter_store_down_fails_issuance_closed() {
    let h = harness(OtpConfig::default());
    h.counters.set_unavailable(true);

    let error = h
        .engine
        .generate(PHONE, OtpPurpose::Login, IssueMetadata::default())
        .await
        .unwrap_err();
    assert!(error.is_retryable());
    match otp_error(error) {
        OtpError::Transient { operation, .. } => assert_eq!(operation, "rate_window_check"),
        other => panic!("Expected transient error, got {:?}", other),
    }
    assert!(h.records.is_empty().await);
}

#[tokio::test]
async fn test_counter_store_down_does_not_block_validation() {
    let h = harness(OtpConfig::default());
    let issued = h
        .engine
        .generate(PHONE, OtpPurpose::Login, IssueMetadata::default())
        .await
        .unwrap();
    let code = h.notifier.last_code(PHONE).unwrap();

    h.counters.set_unavailable(true);
    assert!(h.engine.validate(issued.otp_id, &code).await.unwrap().success);
}

#[tokio::test]
async fn test_record_store_down_is_transient() {
    let h = harness(OtpConfig::default());
    h.records.set_unavailable(true);

    let error = h
        .engine
        .generate(PHONE, OtpPurpose::Login, IssueMetadata::default())
        .await
        .unwrap_err();
    assert!(matches!(otp_error(error), OtpError::Transient { .. }));

    let error = h.engine.validate(Uuid::new_v4(), "123456").await.unwrap_err();
    assert!(error.is_retryable());
}

#[tokio::test]
async fn test_slow_record_store_times_out() {
    let config = OtpConfig {
        store_timeout_ms: 20,
        ..Default::default()
    };
    let h = harness(config);
    h.records.set_latency(Duration::from_millis(200));

    let error = h.engine.validate(Uuid::new_v4(), "123456").await.unwrap_err();
    match otp_error(error) {
        OtpError::Transient { operation, message } => {
            assert_eq!(operation, "find_by_id");
            assert!(message.contains("timed out"));
        }
        other => panic!("Expected transient error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rejects_invalid_config() {
    let config = OtpConfig {
        code_length: 3,
        ..Default::default()
    };
    let result = VerificationEngine::new(
        Arc::new(InMemoryRecordStore::new()),
        Arc::new(InMemoryCounterStore::new()),
        Arc::new(MockNotifier::new(NotifierMode::Accept)),
        config,
    );
    assert!(matches!(
        result,
        Err(DomainError::ValidationErr(ValidationError::InvalidConfig { .. }))
    ));
}

#[tokio::test]
async fn test_custom_code_length_and_attempts() {
    let config = OtpConfig {
        code_length: 8,
        max_attempts: 2,
        ..Default::default()
    };
    let h = harness(config);
    let issued = h
        .engine
        .generate(PHONE, OtpPurpose::Login, IssueMetadata::default())
        .await
        .unwrap();
    assert_eq!(issued.attempts_remaining, 2);
    assert_eq!(h.notifier.last_code(PHONE).unwrap().len(), 8);

    let outcome = h.engine.validate(issued.otp_id, &wrong_code(8)).await.unwrap();
    assert_eq!(outcome.attempts_remaining, 1);
    let error = h.engine.validate(issued.otp_id, &wrong_code(8)).await.unwrap_err();
    assert_eq!(otp_error(error), OtpError::AttemptsExceeded);
}
