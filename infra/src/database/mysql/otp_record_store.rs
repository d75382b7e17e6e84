//! MySQL implementation of the RecordStore trait.
//!
//! At most one active row per (identity, purpose) is enforced by the schema
//! itself: `active_key` is a generated column that is only non-NULL for
//! active rows and carries a unique index. Status changes are conditional
//! `UPDATE`s whose `WHERE` clause restates the precondition, so concurrent
//! writers are serialized by InnoDB row locks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySql, MySqlPool, Row, Transaction};
use tracing::{debug, error, warn};
use uuid::Uuid;

use vf_core::domain::entities::{IssueMetadata, OtpPurpose, OtpRecord, OtpStatus};
use vf_core::errors::{DomainError, DomainResult};
use vf_core::repositories::{AttemptUpdate, RecordStore};
use vf_shared::utils::mask_identity;

use crate::database::connection::check_pool;
use crate::InfrastructureError;

/// Table definition applied by [`MySqlRecordStore::ensure_schema`]
pub const OTP_RECORDS_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS otp_records (
    id              CHAR(36)      NOT NULL,
    identity        VARCHAR(320)  NOT NULL,
    purpose         VARCHAR(32)   NOT NULL,
    code_hash       CHAR(64)      NOT NULL,
    salt            CHAR(32)      NOT NULL,
    expires_at      DATETIME(6)   NOT NULL,
    attempts        INT UNSIGNED  NOT NULL DEFAULT 0,
    max_attempts    INT UNSIGNED  NOT NULL,
    status          VARCHAR(16)   NOT NULL,
    metadata        TEXT          NULL,
    created_at      DATETIME(6)   NOT NULL,
    last_attempt_at DATETIME(6)   NULL,
    active_key      VARCHAR(360)  GENERATED ALWAYS AS (
                        IF(status = 'active', CONCAT(purpose, ':', identity), NULL)
                    ) STORED,
    PRIMARY KEY (id),
    UNIQUE KEY uq_otp_records_active (active_key),
    KEY idx_otp_records_pair (identity, purpose, created_at),
    KEY idx_otp_records_expires_at (expires_at)
) ENGINE = InnoDB DEFAULT CHARSET = utf8mb4
"#;

const SELECT_COLUMNS: &str = "id, identity, purpose, code_hash, salt, expires_at, attempts, \
     max_attempts, status, metadata, created_at, last_attempt_at";

/// Attempts made at an insert that collides with a concurrent one
const INSERT_RETRIES: u32 = 3;

/// MySQL implementation of RecordStore
pub struct MySqlRecordStore {
    /// Database connection pool
    pool: MySqlPool,
}

impl MySqlRecordStore {
    /// Create a new MySQL record store
    ///
    /// # Arguments
    /// * `pool` - MySQL connection pool from SQLx
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Create the `otp_records` table if it does not exist
    pub async fn ensure_schema(&self) -> Result<(), InfrastructureError> {
        sqlx::query(OTP_RECORDS_DDL).execute(&self.pool).await?;
        debug!("otp_records schema ensured");
        Ok(())
    }

    /// Convert database row to OtpRecord entity
    fn row_to_record(row: &MySqlRow) -> Result<OtpRecord, DomainError> {
        let id: String = row.try_get("id").map_err(|e| column_error("id", e))?;
        let purpose: String = row.try_get("purpose").map_err(|e| column_error("purpose", e))?;
        let status: String = row.try_get("status").map_err(|e| column_error("status", e))?;
        let metadata: Option<String> = row
            .try_get("metadata")
            .map_err(|e| column_error("metadata", e))?;

        let metadata = match metadata {
            Some(raw) if !raw.is_empty() => serde_json::from_str::<IssueMetadata>(&raw)
                .map_err(|e| corrupt(format!("metadata: {}", e)))?,
            _ => IssueMetadata::default(),
        };

        Ok(OtpRecord {
            id: Uuid::parse_str(&id).map_err(|e| corrupt(format!("id {}: {}", id, e)))?,
            identity: row
                .try_get("identity")
                .map_err(|e| column_error("identity", e))?,
            purpose: purpose.parse::<OtpPurpose>().map_err(corrupt)?,
            code_hash: row
                .try_get("code_hash")
                .map_err(|e| column_error("code_hash", e))?,
            salt: row.try_get("salt").map_err(|e| column_error("salt", e))?,
            expires_at: row
                .try_get("expires_at")
                .map_err(|e| column_error("expires_at", e))?,
            attempts: row
                .try_get("attempts")
                .map_err(|e| column_error("attempts", e))?,
            max_attempts: row
                .try_get("max_attempts")
                .map_err(|e| column_error("max_attempts", e))?,
            status: status.parse::<OtpStatus>().map_err(corrupt)?,
            metadata,
            created_at: row
                .try_get("created_at")
                .map_err(|e| column_error("created_at", e))?,
            last_attempt_at: row
                .try_get("last_attempt_at")
                .map_err(|e| column_error("last_attempt_at", e))?,
        })
    }

    async fn try_insert_superseding(&self, record: &OtpRecord) -> Result<u64, sqlx::Error> {
        let metadata = serde_json::to_string(&record.metadata).unwrap_or_default();
        let mut tx = self.pool.begin().await?;

        let superseded = sqlx::query(
            r#"
            UPDATE otp_records
            SET status = 'superseded'
            WHERE identity = ? AND purpose = ? AND status = 'active'
            "#,
        )
        .bind(&record.identity)
        .bind(record.purpose.as_str())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query(
            r#"
            INSERT INTO otp_records (
                id, identity, purpose, code_hash, salt, expires_at,
                attempts, max_attempts, status, metadata, created_at, last_attempt_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.identity)
        .bind(record.purpose.as_str())
        .bind(&record.code_hash)
        .bind(&record.salt)
        .bind(record.expires_at)
        .bind(record.attempts)
        .bind(record.max_attempts)
        .bind(record.status.as_str())
        .bind(metadata)
        .bind(record.created_at)
        .bind(record.last_attempt_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(superseded)
    }

    async fn read_attempts(
        tx: &mut Transaction<'_, MySql>,
        id: Uuid,
    ) -> Result<AttemptUpdate, DomainError> {
        let row = sqlx::query("SELECT attempts, max_attempts, status FROM otp_records WHERE id = ?")
            .bind(id.to_string())
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| db_error("read attempts", e))?;

        let status: String = row.try_get("status").map_err(|e| column_error("status", e))?;
        Ok(AttemptUpdate {
            attempts: row
                .try_get("attempts")
                .map_err(|e| column_error("attempts", e))?,
            max_attempts: row
                .try_get("max_attempts")
                .map_err(|e| column_error("max_attempts", e))?,
            status: status.parse::<OtpStatus>().map_err(corrupt)?,
        })
    }
}

#[async_trait]
impl RecordStore for MySqlRecordStore {
    async fn insert_superseding(&self, record: &OtpRecord) -> DomainResult<u64> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_insert_superseding(record).await {
                Ok(superseded) => return Ok(superseded),
                Err(e) if attempt < INSERT_RETRIES && is_write_conflict(&e) => {
                    warn!(
                        identity = %mask_identity(&record.identity),
                        attempt = attempt,
                        error = %e,
                        "Concurrent issuance collided, retrying"
                    );
                }
                Err(e) => {
                    error!(
                        identity = %mask_identity(&record.identity),
                        error = %e,
                        "Failed to store verification code"
                    );
                    return Err(db_error("insert record", e));
                }
            }
        }
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<OtpRecord>> {
        let query = format!("SELECT {} FROM otp_records WHERE id = ?", SELECT_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("find record", e))?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn find_latest(
        &self,
        identity: &str,
        purpose: OtpPurpose,
    ) -> DomainResult<Option<OtpRecord>> {
        let query = format!(
            "SELECT {} FROM otp_records WHERE identity = ? AND purpose = ? \
             ORDER BY created_at DESC LIMIT 1",
            SELECT_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(identity)
            .bind(purpose.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("find latest record", e))?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn mark_used(&self, id: Uuid, now: DateTime<Utc>) -> DomainResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE otp_records
            SET status = 'used', last_attempt_at = ?
            WHERE id = ? AND status = 'active' AND expires_at >= ? AND attempts < max_attempts
            "#,
        )
        .bind(now)
        .bind(id.to_string())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("mark record used", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_failed_attempt(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<AttemptUpdate>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("begin transaction", e))?;

        // MySQL applies single-table SET assignments left to right, so
        // `status` sees the attempts value from before the increment.
        let result = sqlx::query(
            r#"
            UPDATE otp_records
            SET status = IF(attempts + 1 >= max_attempts, 'locked', status),
                attempts = attempts + 1,
                last_attempt_at = ?
            WHERE id = ? AND status = 'active' AND expires_at >= ? AND attempts < max_attempts
            "#,
        )
        .bind(now)
        .bind(id.to_string())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("record failed attempt", e))?;

        if result.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| db_error("rollback", e))?;
            return Ok(None);
        }

        let update = Self::read_attempts(&mut tx, id).await?;
        tx.commit().await.map_err(|e| db_error("commit", e))?;
        Ok(Some(update))
    }

    async fn find_expired_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> DomainResult<Vec<OtpRecord>> {
        let query = format!(
            "SELECT {} FROM otp_records WHERE expires_at < ? ORDER BY expires_at ASC LIMIT ?",
            SELECT_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(cutoff)
            .bind(limit as u64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("list expired records", e))?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn delete(&self, id: Uuid) -> DomainResult<bool> {
        let result = sqlx::query("DELETE FROM otp_records WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("delete record", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> DomainResult<()> {
        match check_pool(&self.pool).await? {
            true => Ok(()),
            false => Err(DomainError::Internal {
                message: "database health check returned an unexpected value".to_string(),
            }),
        }
    }
}

/// Duplicate active key or deadlock between two issuances for the same pair
fn is_write_conflict(error: &sqlx::Error) -> bool {
    match error.as_database_error() {
        Some(db) => db.is_unique_violation() || db.code().as_deref() == Some("40001"),
        None => false,
    }
}

fn db_error(operation: &str, error: sqlx::Error) -> DomainError {
    DomainError::Internal {
        message: format!("Failed to {}: {}", operation, error),
    }
}

fn column_error(column: &str, error: sqlx::Error) -> DomainError {
    DomainError::Internal {
        message: format!("Failed to get {}: {}", column, error),
    }
}

fn corrupt(message: impl Into<String>) -> DomainError {
    InfrastructureError::Corrupt(message.into()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ddl_guards_single_active_row() {
        assert!(OTP_RECORDS_DDL.contains("UNIQUE KEY uq_otp_records_active (active_key)"));
        assert!(OTP_RECORDS_DDL.contains("IF(status = 'active'"));
        assert!(OTP_RECORDS_DDL.contains("KEY idx_otp_records_expires_at (expires_at)"));
    }

    #[test]
    fn test_select_columns_cover_entity() {
        for column in [
            "id",
            "identity",
            "purpose",
            "code_hash",
            "salt",
            "expires_at",
            "attempts",
            "max_attempts",
            "status",
            "metadata",
            "created_at",
            "last_attempt_at",
        ] {
            assert!(SELECT_COLUMNS.contains(column), "missing {}", column);
        }
    }

    #[test]
    fn test_corrupt_maps_to_internal() {
        match corrupt("status: bogus") {
            DomainError::Internal { message } => assert!(message.contains("bogus")),
            other => panic!("Expected internal error, got {:?}", other),
        }
    }
}
