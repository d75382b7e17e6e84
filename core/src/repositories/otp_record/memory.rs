//! In-memory record store
//!
//! A single lock guards the whole map, which makes every operation
//! linearizable. Used by tests and by single-process deployments.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::entities::{OtpPurpose, OtpRecord, OtpStatus};
use crate::errors::{DomainError, DomainResult};

use super::r#trait::{AttemptUpdate, RecordStore};

pub struct InMemoryRecordStore {
    records: Arc<RwLock<HashMap<Uuid, OtpRecord>>>,
    unavailable: AtomicBool,
    latency_ms: AtomicU64,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            unavailable: AtomicBool::new(false),
            latency_ms: AtomicU64::new(0),
        }
    }

    /// Make every call fail as if the backing store were down
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay every call, for exercising caller timeouts
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Stores a record as-is, without superseding anything
    pub async fn insert_raw(&self, record: OtpRecord) {
        self.records.write().await.insert(record.id, record);
    }

    /// All records for a pair, oldest first
    pub async fn records_for(&self, identity: &str, purpose: OtpPurpose) -> Vec<OtpRecord> {
        let records = self.records.read().await;
        let mut matching: Vec<OtpRecord> = records
            .values()
            .filter(|r| r.identity == identity && r.purpose == purpose)
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.created_at);
        matching
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    async fn guard(&self, operation: &str) -> DomainResult<()> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DomainError::internal(format!(
                "record store unavailable during {}",
                operation
            )));
        }
        Ok(())
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

fn accepts_attempt(record: &OtpRecord, now: DateTime<Utc>) -> bool {
    record.status == OtpStatus::Active
        && !record.is_expired_at(now)
        && record.attempts < record.max_attempts
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn insert_superseding(&self, record: &OtpRecord) -> DomainResult<u64> {
        self.guard("insert_superseding").await?;
        let mut records = self.records.write().await;

        if records.contains_key(&record.id) {
            return Err(DomainError::internal(format!(
                "record {} already exists",
                record.id
            )));
        }

        let mut superseded = 0;
        for existing in records.values_mut() {
            if existing.identity == record.identity
                && existing.purpose == record.purpose
                && existing.status == OtpStatus::Active
            {
                existing.status = OtpStatus::Superseded;
                superseded += 1;
            }
        }

        records.insert(record.id, record.clone());
        Ok(superseded)
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<OtpRecord>> {
        self.guard("find_by_id").await?;
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn find_latest(
        &self,
        identity: &str,
        purpose: OtpPurpose,
    ) -> DomainResult<Option<OtpRecord>> {
        self.guard("find_latest").await?;
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| r.identity == identity && r.purpose == purpose)
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn mark_used(&self, id: Uuid, now: DateTime<Utc>) -> DomainResult<bool> {
        self.guard("mark_used").await?;
        let mut records = self.records.write().await;

        match records.get_mut(&id) {
            Some(record) if accepts_attempt(record, now) => {
                record.status = OtpStatus::Used;
                record.last_attempt_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_failed_attempt(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<AttemptUpdate>> {
        self.guard("record_failed_attempt").await?;
        let mut records = self.records.write().await;

        match records.get_mut(&id) {
            Some(record) if accepts_attempt(record, now) => {
                record.attempts += 1;
                record.last_attempt_at = Some(now);
                if record.attempts >= record.max_attempts {
                    record.status = OtpStatus::Locked;
                }
                Ok(Some(AttemptUpdate {
                    attempts: record.attempts,
                    max_attempts: record.max_attempts,
                    status: record.status,
                }))
            }
            _ => Ok(None),
        }
    }

    async fn find_expired_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> DomainResult<Vec<OtpRecord>> {
        self.guard("find_expired_before").await?;
        let records = self.records.read().await;
        let mut expired: Vec<OtpRecord> = records
            .values()
            .filter(|r| r.expires_at < cutoff)
            .cloned()
            .collect();
        expired.sort_by_key(|r| r.expires_at);
        expired.truncate(limit);
        Ok(expired)
    }

    async fn delete(&self, id: Uuid) -> DomainResult<bool> {
        self.guard("delete").await?;
        Ok(self.records.write().await.remove(&id).is_some())
    }

    async fn ping(&self) -> DomainResult<()> {
        self.guard("ping").await
    }
}
