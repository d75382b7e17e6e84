//! Verification engine implementation

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use vf_shared::config::OtpConfig;
use vf_shared::utils::{mask_identity, normalize_identity};

use crate::domain::entities::{
    IssueMetadata, OtpPurpose, OtpRecord, OtpStatus, RateKind, RateWindow,
};
use crate::errors::{DomainError, DomainResult, OtpError, ValidationError};
use crate::repositories::{CounterStore, RecordStore};
use crate::services::store_call::bounded;

use super::code::{generate_salt, hash_code, verify_code_hash, CodeGenerator};
use super::traits::Notifier;
use super::types::{IssuedOtp, ValidationOutcome};

/// Issues and validates one-time passcodes
///
/// Records live in the durable [`RecordStore`]; rate windows live in the
/// [`CounterStore`]. Every status change goes through a single conditional
/// store write, so concurrent callers on the same record cannot both win.
pub struct VerificationEngine<R: RecordStore, C: CounterStore, N: Notifier> {
    /// Durable record storage
    record_store: Arc<R>,
    /// Rate window counters
    counter_store: Arc<C>,
    /// Delivery channel for plaintext codes
    notifier: Arc<N>,
    generator: CodeGenerator,
    config: OtpConfig,
}

impl<R: RecordStore, C: CounterStore, N: Notifier> VerificationEngine<R, C, N> {
    /// Create a new verification engine
    ///
    /// # Arguments
    ///
    /// * `record_store` - Durable record storage
    /// * `counter_store` - Rate window counters
    /// * `notifier` - Delivery channel for issued codes
    /// * `config` - Issuance and validation policy
    ///
    /// # Returns
    ///
    /// * `Err(DomainError)` - If the configuration is unusable
    pub fn new(
        record_store: Arc<R>,
        counter_store: Arc<C>,
        notifier: Arc<N>,
        config: OtpConfig,
    ) -> DomainResult<Self> {
        config
            .validate()
            .map_err(|message| ValidationError::InvalidConfig { message })?;
        let generator = CodeGenerator::new(config.code_length)?;

        Ok(Self {
            record_store,
            counter_store,
            notifier,
            generator,
            config,
        })
    }

    pub fn config(&self) -> &OtpConfig {
        &self.config
    }

    /// Issue a new code for an identity and purpose
    ///
    /// This method:
    /// 1. Normalizes the identity
    /// 2. Rejects the request if the issue window is exhausted
    /// 3. Rejects the request inside the resend cooldown
    /// 4. Supersedes any active code and persists the new record atomically
    /// 5. Counts the issuance in the rate window
    /// 6. Hands the plaintext code to the notifier
    ///
    /// # Arguments
    ///
    /// * `identity` - Phone number (E.164) or email address
    /// * `purpose` - Flow the code is valid for
    /// * `metadata` - Request context stored with the record
    ///
    /// # Returns
    ///
    /// * `Ok(IssuedOtp)` - Handle for the new record; never contains the code
    /// * `Err(DomainError)` - Invalid identity, rate limit, cooldown or store failure
    pub async fn generate(
        &self,
        identity: &str,
        purpose: OtpPurpose,
        metadata: IssueMetadata,
    ) -> DomainResult<IssuedOtp> {
        let identity = Self::normalize(identity)?;
        self.issue(&identity, purpose, RateKind::OtpIssue, metadata)
            .await
    }

    /// Validate a code against a previously issued record
    ///
    /// A correct code consumes the record. A wrong code consumes one attempt;
    /// the attempt that reaches the ceiling locks the record. Malformed codes
    /// are rejected without touching the record.
    ///
    /// # Arguments
    ///
    /// * `otp_id` - Identifier returned by `generate` or `resend`
    /// * `code` - Code entered by the user
    ///
    /// # Returns
    ///
    /// * `Ok(ValidationOutcome)` - `success` is false for a wrong code that left attempts
    /// * `Err(DomainError)` - Unknown, expired, used, locked or superseded record
    pub async fn validate(&self, otp_id: Uuid, code: &str) -> DomainResult<ValidationOutcome> {
        if !self.generator.is_well_formed(code) {
            tracing::warn!(
                otp_id = %otp_id,
                code_length = code.len(),
                event = "invalid_code_format",
                "Verification code has the wrong shape"
            );
            return Err(ValidationError::InvalidCodeFormat {
                expected_length: self.generator.length(),
            }
            .into());
        }

        let record = self
            .store("find_by_id", self.record_store.find_by_id(otp_id))
            .await?
            .ok_or(OtpError::NotFound)?;
        let now = Utc::now();

        if let Err(e) = Self::ensure_accepts_attempt(&record, now) {
            tracing::warn!(
                otp_id = %otp_id,
                identity = %mask_identity(&record.identity),
                status = %record.effective_status(now),
                error = %e,
                event = "otp_validation_rejected",
                "Verification code can no longer be validated"
            );
            return Err(e);
        }

        if verify_code_hash(code, &record.salt, &record.code_hash) {
            if self
                .store("mark_used", self.record_store.mark_used(otp_id, now))
                .await?
            {
                tracing::info!(
                    otp_id = %otp_id,
                    identity = %mask_identity(&record.identity),
                    purpose = %record.purpose,
                    event = "otp_verified_success",
                    "Verification code successfully verified"
                );
                return Ok(ValidationOutcome {
                    otp_id,
                    success: true,
                    attempts_remaining: record.remaining_attempts(),
                });
            }
            // Lost the race to another validation or a newer issuance
            return Err(self.terminal_error(otp_id, now).await);
        }

        let update = self
            .store(
                "record_failed_attempt",
                self.record_store.record_failed_attempt(otp_id, now),
            )
            .await?;

        match update {
            Some(update) if update.is_locked() => {
                tracing::error!(
                    otp_id = %otp_id,
                    identity = %mask_identity(&record.identity),
                    attempts = update.attempts,
                    event = "max_attempts_exceeded",
                    "Verification code locked after too many failed attempts"
                );
                Err(OtpError::AttemptsExceeded.into())
            }
            Some(update) => {
                tracing::warn!(
                    otp_id = %otp_id,
                    identity = %mask_identity(&record.identity),
                    remaining_attempts = update.remaining(),
                    event = "otp_verification_failed",
                    "Verification code did not match"
                );
                Ok(ValidationOutcome {
                    otp_id,
                    success: false,
                    attempts_remaining: update.remaining(),
                })
            }
            None => Err(self.terminal_error(otp_id, now).await),
        }
    }

    /// Issue a fresh code for a pair that already has one
    ///
    /// Counts against the resend window rather than the issue window and is
    /// subject to the same cooldown as `generate`. The previous code is
    /// superseded. Metadata is carried over from the most recent record.
    ///
    /// # Returns
    ///
    /// * `Err(OtpError::NotFound)` - If no code was ever issued for the pair
    pub async fn resend(&self, identity: &str, purpose: OtpPurpose) -> DomainResult<IssuedOtp> {
        let identity = Self::normalize(identity)?;

        let previous = self
            .store(
                "find_latest",
                self.record_store.find_latest(&identity, purpose),
            )
            .await?
            .ok_or(OtpError::NotFound)?;

        tracing::debug!(
            identity = %mask_identity(&identity),
            previous_otp_id = %previous.id,
            event = "otp_resend_requested",
            "Resending verification code"
        );

        self.issue(&identity, purpose, RateKind::OtpResend, previous.metadata)
            .await
    }

    /// Current state of a rate window for an identity
    pub async fn rate_window(
        &self,
        identity: &str,
        purpose: OtpPurpose,
        kind: RateKind,
    ) -> DomainResult<RateWindow> {
        let identity = Self::normalize(identity)?;
        let key = RateWindow::counter_key(kind, &identity, purpose);
        self.read_window(&key, kind, purpose, Utc::now()).await
    }

    async fn issue(
        &self,
        identity: &str,
        purpose: OtpPurpose,
        kind: RateKind,
        metadata: IssueMetadata,
    ) -> DomainResult<IssuedOtp> {
        let now = Utc::now();
        let rate_key = RateWindow::counter_key(kind, identity, purpose);

        let window = self.read_window(&rate_key, kind, purpose, now).await?;
        if window.is_exhausted(self.config.max_otps_per_window) {
            let retry_after_seconds = window.retry_after_seconds(now);
            tracing::warn!(
                identity = %mask_identity(identity),
                purpose = %purpose,
                kind = %kind,
                count = window.count,
                retry_after_seconds = retry_after_seconds,
                event = "rate_limit_exceeded",
                "Verification code request rate limit exceeded"
            );
            return Err(OtpError::RateLimited {
                retry_after_seconds,
            }
            .into());
        }

        let latest = self
            .store("find_latest", self.record_store.find_latest(identity, purpose))
            .await?;
        if let Some(previous) = latest {
            let ready_at = previous.created_at + self.config.resend_cooldown();
            if now < ready_at {
                let retry_after_seconds = seconds_until(now, ready_at);
                tracing::warn!(
                    identity = %mask_identity(identity),
                    purpose = %purpose,
                    retry_after_seconds = retry_after_seconds,
                    event = "resend_cooldown_active",
                    "Verification code requested inside the resend cooldown"
                );
                return Err(OtpError::ResendCooldown {
                    retry_after_seconds,
                }
                .into());
            }
        }

        let code = self.generator.generate();
        let salt = generate_salt();
        let record = OtpRecord::new(
            identity.to_string(),
            purpose,
            hash_code(&code, &salt),
            salt,
            self.config.expiry(),
            self.config.max_attempts,
            metadata,
            now,
        );

        let superseded = self
            .store(
                "insert_superseding",
                self.record_store.insert_superseding(&record),
            )
            .await?;
        if superseded > 0 {
            tracing::info!(
                identity = %mask_identity(identity),
                purpose = %purpose,
                superseded = superseded,
                event = "otp_superseded",
                "Previous verification codes superseded"
            );
        }

        tracing::info!(
            otp_id = %record.id,
            identity = %mask_identity(identity),
            purpose = %purpose,
            kind = %kind,
            expires_at = %record.expires_at,
            event = "otp_generated",
            "Generated new verification code"
        );

        // The record is already durable; a lost increment only relaxes the limit
        if let Err(e) = self
            .store(
                "rate_window_increment",
                self.counter_store
                    .increment(&rate_key, rate_window_ttl(&self.config)),
            )
            .await
        {
            tracing::warn!(
                identity = %mask_identity(identity),
                error = %e,
                event = "rate_counter_increment_failed",
                "Failed to count issuance in rate window"
            );
        }

        let notification_accepted = self.notify(&record, &code).await;

        Ok(IssuedOtp {
            otp_id: record.id,
            identity: record.identity,
            purpose,
            expires_at: record.expires_at,
            attempts_remaining: record.max_attempts,
            next_resend_at: now + self.config.resend_cooldown(),
            notification_accepted,
        })
    }

    async fn read_window(
        &self,
        key: &str,
        kind: RateKind,
        purpose: OtpPurpose,
        now: DateTime<Utc>,
    ) -> DomainResult<RateWindow> {
        let entry = self
            .store("rate_window_check", self.counter_store.get(key))
            .await?;
        let (count, remaining) = match entry {
            Some(entry) => (
                entry.count,
                entry
                    .ttl
                    .and_then(|ttl| chrono::Duration::from_std(ttl).ok()),
            ),
            None => (0, None),
        };

        Ok(RateWindow::from_remaining(
            kind,
            purpose,
            count,
            self.config.rate_window(),
            remaining,
            now,
        ))
    }

    async fn notify(&self, record: &OtpRecord, code: &str) -> bool {
        let send = self.notifier.send(&record.identity, record.purpose, code);
        match tokio::time::timeout(self.config.notify_timeout(), send).await {
            Ok(Ok(true)) => true,
            Ok(Ok(false)) => {
                tracing::warn!(
                    otp_id = %record.id,
                    identity = %mask_identity(&record.identity),
                    event = "otp_notification_rejected",
                    "Notifier declined the verification code"
                );
                false
            }
            Ok(Err(e)) => {
                tracing::error!(
                    otp_id = %record.id,
                    identity = %mask_identity(&record.identity),
                    error = %e,
                    event = "otp_notification_failed",
                    "Failed to hand verification code to notifier"
                );
                false
            }
            Err(_) => {
                tracing::error!(
                    otp_id = %record.id,
                    identity = %mask_identity(&record.identity),
                    timeout_ms = self.config.notify_timeout_ms,
                    event = "otp_notification_timeout",
                    "Notifier did not answer in time"
                );
                false
            }
        }
    }

    /// Error for a record that refused a transition we expected it to accept
    async fn terminal_error(&self, otp_id: Uuid, now: DateTime<Utc>) -> DomainError {
        match self
            .store("find_by_id", self.record_store.find_by_id(otp_id))
            .await
        {
            Ok(Some(record)) => match Self::ensure_accepts_attempt(&record, now) {
                Err(e) => e,
                Ok(()) => OtpError::transient("validate", "record changed concurrently").into(),
            },
            Ok(None) => OtpError::NotFound.into(),
            Err(e) => e,
        }
    }

    fn ensure_accepts_attempt(record: &OtpRecord, now: DateTime<Utc>) -> DomainResult<()> {
        let error = match record.effective_status(now) {
            OtpStatus::Used => OtpError::AlreadyUsed,
            OtpStatus::Locked => OtpError::AttemptsExceeded,
            OtpStatus::Superseded => OtpError::Superseded,
            OtpStatus::Expired => OtpError::Expired,
            OtpStatus::Active if record.attempts >= record.max_attempts => {
                OtpError::AttemptsExceeded
            }
            OtpStatus::Active => return Ok(()),
        };
        Err(error.into())
    }

    fn normalize(identity: &str) -> DomainResult<String> {
        normalize_identity(identity)
            .map(|(normalized, _)| normalized)
            .ok_or_else(|| ValidationError::InvalidIdentity.into())
    }

    async fn store<T, F>(&self, operation: &'static str, call: F) -> DomainResult<T>
    where
        F: std::future::Future<Output = DomainResult<T>>,
    {
        bounded(operation, self.config.store_timeout(), call).await
    }
}

fn rate_window_ttl(config: &OtpConfig) -> std::time::Duration {
    config
        .rate_window()
        .to_std()
        .unwrap_or(std::time::Duration::from_secs(3600))
}

fn seconds_until(now: DateTime<Utc>, later: DateTime<Utc>) -> u64 {
    let millis = (later - now).num_milliseconds().max(0) as u64;
    millis.div_ceil(1000)
}
