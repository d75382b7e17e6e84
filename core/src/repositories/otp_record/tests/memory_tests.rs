//! Unit tests for the in-memory record store

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::domain::entities::{IssueMetadata, OtpPurpose, OtpRecord, OtpStatus};
use crate::repositories::otp_record::{InMemoryRecordStore, RecordStore};

fn record(identity: &str, max_attempts: u32) -> OtpRecord {
    OtpRecord::new(
        identity.to_string(),
        OtpPurpose::Login,
        "hash".to_string(),
        "salt".to_string(),
        Duration::minutes(10),
        max_attempts,
        IssueMetadata::default(),
        Utc::now(),
    )
}

#[tokio::test]
async fn test_insert_supersedes_previous_active() {
    let store = InMemoryRecordStore::new();
    let first = record("+15551234567", 5);
    let second = record("+15551234567", 5);

    assert_eq!(store.insert_superseding(&first).await.unwrap(), 0);
    assert_eq!(store.insert_superseding(&second).await.unwrap(), 1);

    let first = store.find_by_id(first.id).await.unwrap().unwrap();
    let second = store.find_by_id(second.id).await.unwrap().unwrap();
    assert_eq!(first.status, OtpStatus::Superseded);
    assert_eq!(second.status, OtpStatus::Active);
}

#[tokio::test]
async fn test_insert_leaves_other_pairs_alone() {
    let store = InMemoryRecordStore::new();
    let login = record("+15551234567", 5);
    let mut registration = record("+15551234567", 5);
    registration.purpose = OtpPurpose::Registration;
    let other_identity = record("+15557654321", 5);

    store.insert_superseding(&login).await.unwrap();
    assert_eq!(store.insert_superseding(&registration).await.unwrap(), 0);
    assert_eq!(store.insert_superseding(&other_identity).await.unwrap(), 0);

    let login = store.find_by_id(login.id).await.unwrap().unwrap();
    assert_eq!(login.status, OtpStatus::Active);
}

#[tokio::test]
async fn test_find_latest() {
    let store = InMemoryRecordStore::new();
    assert!(store
        .find_latest("+15551234567", OtpPurpose::Login)
        .await
        .unwrap()
        .is_none());

    let mut older = record("+15551234567", 5);
    older.created_at = Utc::now() - Duration::minutes(5);
    let newer = record("+15551234567", 5);
    store.insert_raw(older).await;
    store.insert_raw(newer.clone()).await;

    let latest = store
        .find_latest("+15551234567", OtpPurpose::Login)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.id, newer.id);
}

#[tokio::test]
async fn test_mark_used_only_once() {
    let store = InMemoryRecordStore::new();
    let record = record("+15551234567", 5);
    store.insert_superseding(&record).await.unwrap();

    assert!(store.mark_used(record.id, Utc::now()).await.unwrap());
    assert!(!store.mark_used(record.id, Utc::now()).await.unwrap());
    assert!(!store.mark_used(Uuid::new_v4(), Utc::now()).await.unwrap());

    let stored = store.find_by_id(record.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OtpStatus::Used);
    assert!(stored.last_attempt_at.is_some());
}

#[tokio::test]
async fn test_mark_used_rejects_expired() {
    let store = InMemoryRecordStore::new();
    let record = record("+15551234567", 5);
    store.insert_superseding(&record).await.unwrap();

    let later = record.expires_at + Duration::seconds(1);
    assert!(!store.mark_used(record.id, later).await.unwrap());

    let stored = store.find_by_id(record.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OtpStatus::Active);
}

#[tokio::test]
async fn test_failed_attempts_lock_at_ceiling() {
    let store = InMemoryRecordStore::new();
    let record = record("+15551234567", 3);
    store.insert_superseding(&record).await.unwrap();

    let first = store.record_failed_attempt(record.id, Utc::now()).await.unwrap().unwrap();
    assert_eq!(first.attempts, 1);
    assert_eq!(first.remaining(), 2);
    assert!(!first.is_locked());

    store.record_failed_attempt(record.id, Utc::now()).await.unwrap();
    let third = store.record_failed_attempt(record.id, Utc::now()).await.unwrap().unwrap();
    assert_eq!(third.attempts, 3);
    assert!(third.is_locked());

    assert!(store
        .record_failed_attempt(record.id, Utc::now())
        .await
        .unwrap()
        .is_none());

    let stored = store.find_by_id(record.id).await.unwrap().unwrap();
    assert_eq!(stored.attempts, 3);
    assert_eq!(stored.status, OtpStatus::Locked);
}

#[tokio::test]
async fn test_find_expired_before_respects_limit_and_order() {
    let store = InMemoryRecordStore::new();
    let now = Utc::now();

    for hours in [30, 50, 40] {
        let mut r = record("+15551234567", 5);
        r.expires_at = now - Duration::hours(hours);
        store.insert_raw(r).await;
    }
    store.insert_raw(record("+15551234567", 5)).await;

    let cutoff = now - Duration::hours(24);
    let all = store.find_expired_before(cutoff, 10).await.unwrap();
    assert_eq!(all.len(), 3);
    assert!(all[0].expires_at < all[1].expires_at);

    let limited = store.find_expired_before(cutoff, 2).await.unwrap();
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].expires_at, now - Duration::hours(50));
}

#[tokio::test]
async fn test_delete() {
    let store = InMemoryRecordStore::new();
    let record = record("+15551234567", 5);
    store.insert_raw(record.clone()).await;

    assert!(store.delete(record.id).await.unwrap());
    assert!(!store.delete(record.id).await.unwrap());
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_unavailable_store_fails_every_call() {
    let store = InMemoryRecordStore::new();
    store.set_unavailable(true);

    assert!(store.ping().await.is_err());
    assert!(store.find_by_id(Uuid::new_v4()).await.is_err());
    assert!(store.insert_superseding(&record("+15551234567", 5)).await.is_err());

    store.set_unavailable(false);
    assert!(store.ping().await.is_ok());
}
