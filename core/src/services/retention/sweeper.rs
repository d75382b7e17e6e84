//! Retention sweeper for expired passcode records
//!
//! Deletes records whose expiry lies further in the past than the retention
//! period, in bounded batches, either on demand or on a fixed interval.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use vf_shared::config::OtpConfig;

use crate::domain::entities::OtpStatus;
use crate::errors::DomainResult;
use crate::repositories::RecordStore;
use crate::services::store_call::bounded;

/// Service that prunes records past retention
pub struct RetentionSweeper<R: RecordStore + 'static> {
    record_store: Arc<R>,
    config: OtpConfig,
}

impl<R: RecordStore> RetentionSweeper<R> {
    pub fn new(record_store: Arc<R>, config: OtpConfig) -> Self {
        Self {
            record_store,
            config,
        }
    }

    /// Run one sweep deleting at most `batch_size` records
    ///
    /// A record is eligible when `expires_at < now - retention`. Records that
    /// are still active at `now` are never deleted. A failed delete is noted
    /// in the report and the sweep moves on.
    ///
    /// # Returns
    /// * `Ok(SweepReport)` - Summary of the sweep
    /// * `Err(DomainError)` - If the candidates could not be listed
    pub async fn sweep(&self, batch_size: usize) -> DomainResult<SweepReport> {
        let now = Utc::now();
        let cutoff = now - self.config.retention();
        let limit = self.config.store_timeout();

        let candidates = bounded(
            "find_expired_before",
            limit,
            self.record_store.find_expired_before(cutoff, batch_size),
        )
        .await?;

        let mut report = SweepReport {
            cutoff,
            ..Default::default()
        };

        for record in candidates.into_iter().take(batch_size) {
            if record.effective_status(now) == OtpStatus::Active {
                report.skipped_active += 1;
                continue;
            }

            match bounded("delete", limit, self.record_store.delete(record.id)).await {
                Ok(true) => report.deleted_count += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        otp_id = %record.id,
                        error = %e,
                        event = "otp_sweep_delete_failed",
                        "Failed to delete expired verification code"
                    );
                    report.errors.push(format!("{}: {}", record.id, e));
                }
            }
        }

        info!(
            deleted = report.deleted_count,
            skipped_active = report.skipped_active,
            errors = report.errors.len(),
            cutoff = %cutoff,
            event = "otp_sweep_completed",
            "Retention sweep completed"
        );

        Ok(report)
    }

    /// Run one sweep with the configured batch size
    pub async fn run_once(&self) -> DomainResult<SweepReport> {
        self.sweep(self.config.sweep_batch_size).await
    }

    /// Start the sweeper as a background task
    ///
    /// Returns `None` when sweeping is disabled in the configuration.
    pub fn start_background_task(self: Arc<Self>) -> Option<JoinHandle<()>> {
        if !self.config.sweep_enabled {
            warn!("Retention sweeper is disabled");
            return None;
        }

        let interval = self.config.sweep_interval();

        Some(tokio::spawn(async move {
            info!(
                interval_seconds = interval.as_secs(),
                batch_size = self.config.sweep_batch_size,
                "Retention sweeper started"
            );

            let mut interval_timer = tokio::time::interval(interval);

            loop {
                interval_timer.tick().await;

                match self.run_once().await {
                    Ok(report) => {
                        if !report.is_success() {
                            warn!("Sweep completed with errors: {:?}", report.errors);
                        }
                    }
                    Err(e) => {
                        error!(error = %e, event = "otp_sweep_failed", "Retention sweep failed");
                    }
                }
            }
        }))
    }
}

/// Result of one sweep
#[derive(Debug, Default, Clone)]
pub struct SweepReport {
    /// Records actually removed
    pub deleted_count: usize,
    /// Candidates left alone because they were still active
    pub skipped_active: usize,
    /// Expiry horizon used for this sweep
    pub cutoff: DateTime<Utc>,
    /// Per-record delete failures
    pub errors: Vec<String>,
}

impl SweepReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}
