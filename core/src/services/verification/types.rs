//! Types for verification engine results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::OtpPurpose;

/// Result of issuing a code. The code itself only goes to the notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedOtp {
    pub otp_id: Uuid,
    /// Normalized identity the code was issued to
    pub identity: String,
    pub purpose: OtpPurpose,
    pub expires_at: DateTime<Utc>,
    pub attempts_remaining: u32,
    /// Earliest time another code may be requested for this pair
    pub next_resend_at: DateTime<Utc>,
    /// Whether the notifier accepted the code for delivery
    pub notification_accepted: bool,
}

/// Result of a validation that did not end in an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub otp_id: Uuid,
    pub success: bool,
    pub attempts_remaining: u32,
}
