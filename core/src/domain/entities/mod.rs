//! Domain entities for passcode issuance.

pub mod otp_record;
pub mod rate_window;

pub use otp_record::{IssueMetadata, OtpPurpose, OtpRecord, OtpStatus};
pub use rate_window::{RateKind, RateWindow};
