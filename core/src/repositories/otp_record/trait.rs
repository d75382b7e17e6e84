//! Record store trait defining durable persistence for passcode records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::entities::{OtpPurpose, OtpRecord, OtpStatus};
use crate::errors::DomainResult;

/// Result of counting one failed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptUpdate {
    /// Attempts after the increment
    pub attempts: u32,
    pub max_attempts: u32,
    /// `Locked` when this increment reached the ceiling, `Active` otherwise
    pub status: OtpStatus,
}

impl AttemptUpdate {
    pub fn remaining(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempts)
    }

    pub fn is_locked(&self) -> bool {
        self.status == OtpStatus::Locked
    }
}

/// Durable keyed storage for [`OtpRecord`]s
///
/// Every status change is a single conditional write. Implementations must
/// make each method atomic with respect to concurrent calls on the same
/// record, so that two callers can never both win the same transition.
///
/// Adapter failures are reported as `DomainError::Internal`.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Marks every `Active` record for the record's identity and purpose as
    /// `Superseded` and inserts the new record, as one atomic step.
    ///
    /// Returns the number of records superseded. After this returns, the new
    /// record is the only `Active` one for its (identity, purpose).
    async fn insert_superseding(&self, record: &OtpRecord) -> DomainResult<u64>;

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<OtpRecord>>;

    /// Most recently created record for the pair, whatever its status
    async fn find_latest(
        &self,
        identity: &str,
        purpose: OtpPurpose,
    ) -> DomainResult<Option<OtpRecord>>;

    /// `Active -> Used`, only if the record is still active, unexpired at
    /// `now` and below its attempt ceiling. Returns whether this call won.
    async fn mark_used(&self, id: Uuid, now: DateTime<Utc>) -> DomainResult<bool>;

    /// Counts one failed attempt on an active, unexpired record below its
    /// ceiling, locking it when the ceiling is reached.
    ///
    /// Returns `None` when the record was not eligible; nothing is written.
    async fn record_failed_attempt(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<AttemptUpdate>>;

    /// Records whose `expires_at` is before `cutoff`, oldest first
    async fn find_expired_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> DomainResult<Vec<OtpRecord>>;

    /// Returns whether a record was removed
    async fn delete(&self, id: Uuid) -> DomainResult<bool>;

    /// Cheap liveness probe
    async fn ping(&self) -> DomainResult<()>;
}
