//! One-time passcode record entity.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Business flow a code was issued for. Codes never cross purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    Registration,
    Login,
    PasswordReset,
    ChangeIdentity,
}

impl OtpPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpPurpose::Registration => "registration",
            OtpPurpose::Login => "login",
            OtpPurpose::PasswordReset => "password_reset",
            OtpPurpose::ChangeIdentity => "change_identity",
        }
    }
}

impl fmt::Display for OtpPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OtpPurpose {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registration" => Ok(OtpPurpose::Registration),
            "login" => Ok(OtpPurpose::Login),
            "password_reset" => Ok(OtpPurpose::PasswordReset),
            "change_identity" => Ok(OtpPurpose::ChangeIdentity),
            other => Err(format!("unknown OTP purpose: {}", other)),
        }
    }
}

/// Lifecycle state of a record.
///
/// Only `Active` records accept validations. `Used`, `Locked` and
/// `Superseded` are terminal and are written exactly once. `Expired` is
/// never stored: it is the projection of an `Active` record whose
/// `expires_at` has passed (see [`OtpRecord::effective_status`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpStatus {
    Active,
    Used,
    Locked,
    Superseded,
    Expired,
}

impl OtpStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpStatus::Active => "active",
            OtpStatus::Used => "used",
            OtpStatus::Locked => "locked",
            OtpStatus::Superseded => "superseded",
            OtpStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OtpStatus::Active)
    }

    /// Whether a stored record may move from `self` to `next`
    pub fn can_transition_to(&self, next: OtpStatus) -> bool {
        matches!(
            (self, next),
            (OtpStatus::Active, OtpStatus::Used)
                | (OtpStatus::Active, OtpStatus::Locked)
                | (OtpStatus::Active, OtpStatus::Superseded)
        )
    }
}

impl fmt::Display for OtpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OtpStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(OtpStatus::Active),
            "used" => Ok(OtpStatus::Used),
            "locked" => Ok(OtpStatus::Locked),
            "superseded" => Ok(OtpStatus::Superseded),
            "expired" => Ok(OtpStatus::Expired),
            other => Err(format!("unknown OTP status: {}", other)),
        }
    }
}

/// Context captured when a code is requested
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl IssueMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ip_address(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// A single issued passcode.
///
/// The plaintext code is never part of the record; only its salted hash is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpRecord {
    pub id: Uuid,

    /// Normalized phone number or email address
    pub identity: String,

    pub purpose: OtpPurpose,

    /// Hex-encoded SHA-256 of salt and code
    pub code_hash: String,

    /// Hex-encoded per-record salt
    pub salt: String,

    pub expires_at: DateTime<Utc>,

    /// Failed validations counted so far, never above `max_attempts`
    pub attempts: u32,

    pub max_attempts: u32,

    pub status: OtpStatus,

    pub metadata: IssueMetadata,

    pub created_at: DateTime<Utc>,

    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl OtpRecord {
    /// Creates a fresh `Active` record issued at `now`
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        identity: String,
        purpose: OtpPurpose,
        code_hash: String,
        salt: String,
        ttl: Duration,
        max_attempts: u32,
        metadata: IssueMetadata,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity,
            purpose,
            code_hash,
            salt,
            expires_at: now + ttl,
            attempts: 0,
            max_attempts,
            status: OtpStatus::Active,
            metadata,
            created_at: now,
            last_attempt_at: None,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Status as observed at `now`, projecting `Expired` onto stale active records
    pub fn effective_status(&self, now: DateTime<Utc>) -> OtpStatus {
        match self.status {
            OtpStatus::Active if self.is_expired_at(now) => OtpStatus::Expired,
            status => status,
        }
    }

    pub fn remaining_attempts(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempts)
    }

    pub fn time_until_expiration(&self, now: DateTime<Utc>) -> Duration {
        if self.is_expired_at(now) {
            Duration::zero()
        } else {
            self.expires_at - now
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(now: DateTime<Utc>) -> OtpRecord {
        OtpRecord::new(
            "+15551234567".to_string(),
            OtpPurpose::Login,
            "hash".to_string(),
            "salt".to_string(),
            Duration::minutes(10),
            5,
            IssueMetadata::default(),
            now,
        )
    }

    #[test]
    fn test_new_record_is_active() {
        let now = Utc::now();
        let record = sample(now);

        assert_eq!(record.status, OtpStatus::Active);
        assert_eq!(record.attempts, 0);
        assert_eq!(record.remaining_attempts(), 5);
        assert_eq!(record.expires_at, now + Duration::minutes(10));
        assert!(record.last_attempt_at.is_none());
    }

    #[test]
    fn test_effective_status_projects_expiry() {
        let now = Utc::now();
        let record = sample(now);

        assert_eq!(record.effective_status(now), OtpStatus::Active);
        assert_eq!(record.effective_status(record.expires_at), OtpStatus::Active);
        assert_eq!(
            record.effective_status(record.expires_at + Duration::seconds(1)),
            OtpStatus::Expired
        );

        let mut used = record.clone();
        used.status = OtpStatus::Used;
        assert_eq!(
            used.effective_status(record.expires_at + Duration::hours(1)),
            OtpStatus::Used
        );
    }

    #[test]
    fn test_time_until_expiration() {
        let now = Utc::now();
        let record = sample(now);

        assert_eq!(record.time_until_expiration(now), Duration::minutes(10));
        assert_eq!(
            record.time_until_expiration(now + Duration::minutes(11)),
            Duration::zero()
        );
    }

    #[test]
    fn test_status_transitions() {
        assert!(OtpStatus::Active.can_transition_to(OtpStatus::Used));
        assert!(OtpStatus::Active.can_transition_to(OtpStatus::Locked));
        assert!(OtpStatus::Active.can_transition_to(OtpStatus::Superseded));
        assert!(!OtpStatus::Active.can_transition_to(OtpStatus::Expired));
        assert!(!OtpStatus::Used.can_transition_to(OtpStatus::Active));
        assert!(!OtpStatus::Locked.can_transition_to(OtpStatus::Used));
        assert!(!OtpStatus::Superseded.can_transition_to(OtpStatus::Used));
        assert!(OtpStatus::Used.is_terminal());
        assert!(!OtpStatus::Active.is_terminal());
    }

    #[test]
    fn test_purpose_round_trip_strings() {
        for purpose in [
            OtpPurpose::Registration,
            OtpPurpose::Login,
            OtpPurpose::PasswordReset,
            OtpPurpose::ChangeIdentity,
        ] {
            assert_eq!(purpose.as_str().parse::<OtpPurpose>().unwrap(), purpose);
        }
        assert!("signup".parse::<OtpPurpose>().is_err());
        assert_eq!(
            serde_json::to_string(&OtpPurpose::PasswordReset).unwrap(),
            "\"password_reset\""
        );
    }

    #[test]
    fn test_metadata_builder() {
        let metadata = IssueMetadata::new()
            .with_ip_address("203.0.113.7")
            .with_user_agent("curl/8.0")
            .with_extra("channel", "web");

        assert_eq!(metadata.ip_address.as_deref(), Some("203.0.113.7"));
        assert_eq!(metadata.extra.get("channel").map(String::as_str), Some("web"));

        let json = serde_json::to_string(&IssueMetadata::default()).unwrap();
        assert_eq!(json, "{}");
    }
}
