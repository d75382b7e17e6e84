//! Rate window accounting for code issuance.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::otp_record::OtpPurpose;

/// Which action a counter tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateKind {
    OtpIssue,
    OtpResend,
}

impl RateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateKind::OtpIssue => "otp_issue",
            RateKind::OtpResend => "otp_resend",
        }
    }
}

impl fmt::Display for RateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one fixed window counter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateWindow {
    pub kind: RateKind,
    pub purpose: OtpPurpose,
    pub count: u64,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

impl RateWindow {
    /// Counter key for an identity. The identity is hashed so raw phone
    /// numbers and addresses never appear in the counter store.
    pub fn counter_key(kind: RateKind, identity: &str, purpose: OtpPurpose) -> String {
        let digest = Sha256::digest(identity.as_bytes());
        format!(
            "otp:rate:{}:{}:{}",
            kind.as_str(),
            purpose.as_str(),
            hex::encode(digest)
        )
    }

    /// Window that ends `remaining` from `now`; a missing TTL means a fresh window
    pub fn from_remaining(
        kind: RateKind,
        purpose: OtpPurpose,
        count: u64,
        window: Duration,
        remaining: Option<Duration>,
        now: DateTime<Utc>,
    ) -> Self {
        let window_end = now + remaining.unwrap_or(window);
        Self {
            kind,
            purpose,
            count,
            window_start: window_end - window,
            window_end,
        }
    }

    pub fn is_exhausted(&self, limit: u32) -> bool {
        self.count >= u64::from(limit)
    }

    /// Whole seconds until the window resets, rounded up
    pub fn retry_after_seconds(&self, now: DateTime<Utc>) -> u64 {
        let remaining = self.window_end - now;
        let millis = remaining.num_milliseconds().max(0) as u64;
        millis.div_ceil(1000)
    }
}
