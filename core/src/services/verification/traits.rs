//! Delivery channel integration

use async_trait::async_trait;

use crate::domain::entities::OtpPurpose;

/// Hands a plaintext code to whatever delivers it (SMS, email, a log)
///
/// The engine never retries and never fails an issuance because of the
/// notifier; the outcome is reported back to the caller instead.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Returns `Ok(true)` when the channel accepted the message
    async fn send(&self, identity: &str, purpose: OtpPurpose, code: &str) -> Result<bool, String>;
}
