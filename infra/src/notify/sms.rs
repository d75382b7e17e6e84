//! Adapter from an SMS provider to the engine's Notifier contract

use async_trait::async_trait;
use tracing::warn;

use vf_core::domain::entities::OtpPurpose;
use vf_core::services::Notifier;
use vf_shared::utils::{identity_kind, mask_identity, IdentityKind};

use crate::sms::SmsService;

/// Delivers codes as text messages through any [`SmsService`]
///
/// Email identities are declined (`Ok(false)`) rather than treated as a
/// provider failure.
pub struct SmsNotifier<S: SmsService> {
    sms: S,
    /// Lifetime quoted in the message body
    expires_in_minutes: i64,
}

impl<S: SmsService> SmsNotifier<S> {
    pub fn new(sms: S, expires_in_minutes: i64) -> Self {
        Self {
            sms,
            expires_in_minutes,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.sms.provider_name()
    }
}

#[async_trait]
impl<S: SmsService> Notifier for SmsNotifier<S> {
    async fn send(&self, identity: &str, purpose: OtpPurpose, code: &str) -> Result<bool, String> {
        if identity_kind(identity) == IdentityKind::Email {
            warn!(
                event = "otp_notification_rejected",
                identity = %mask_identity(identity),
                purpose = %purpose,
                provider = self.sms.provider_name(),
                "SMS channel cannot deliver to an email identity"
            );
            return Ok(false);
        }

        self.sms
            .send_verification_code(identity, code, self.expires_in_minutes)
            .await
            .map(|_message_id| true)
            .map_err(|e| e.to_string())
    }
}
