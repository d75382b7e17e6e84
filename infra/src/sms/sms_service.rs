//! SMS Service Interface
//!
//! Defines the trait for SMS providers that deliver verification codes.

use async_trait::async_trait;
use vf_shared::utils::{normalize_identity, IdentityKind};

use crate::InfrastructureError;

/// Longest message accepted by the providers we support
pub const MAX_MESSAGE_LEN: usize = 1600;

/// SMS service trait for sending text messages
///
/// Implementations include:
/// - Twilio SMS API
/// - Mock implementation for development
#[async_trait]
pub trait SmsService: Send + Sync {
    /// Send an SMS message to a phone number in E.164 format
    ///
    /// # Returns
    ///
    /// * `Ok(message_id)` - Provider identifier for the sent message
    /// * `Err(InfrastructureError)` - If sending fails
    async fn send_sms(&self, phone_number: &str, message: &str)
        -> Result<String, InfrastructureError>;

    /// Send a verification code using the standard message format
    async fn send_verification_code(
        &self,
        phone_number: &str,
        code: &str,
        expires_in_minutes: i64,
    ) -> Result<String, InfrastructureError> {
        let message = verification_message(code, expires_in_minutes);
        self.send_sms(phone_number, &message).await
    }

    /// Provider name, e.g. "Twilio" or "Mock"
    fn provider_name(&self) -> &str;

    /// Whether the provider is currently usable
    async fn is_available(&self) -> bool {
        true
    }
}

#[async_trait]
impl SmsService for Box<dyn SmsService> {
    async fn send_sms(
        &self,
        phone_number: &str,
        message: &str,
    ) -> Result<String, InfrastructureError> {
        (**self).send_sms(phone_number, message).await
    }

    fn provider_name(&self) -> &str {
        (**self).provider_name()
    }

    async fn is_available(&self) -> bool {
        (**self).is_available().await
    }
}

/// Text of a verification code message
pub fn verification_message(code: &str, expires_in_minutes: i64) -> String {
    match expires_in_minutes {
        m if m <= 1 => format!(
            "Your verification code is: {}. This code will expire in 1 minute.",
            code
        ),
        m => format!(
            "Your verification code is: {}. This code will expire in {} minutes.",
            code, m
        ),
    }
}

/// Normalize a phone number to E.164, rejecting emails and malformed input
pub fn normalize_phone_number(phone: &str) -> Result<String, InfrastructureError> {
    match normalize_identity(phone) {
        Some((normalized, IdentityKind::Phone)) => Ok(normalized),
        Some((_, IdentityKind::Email)) => Err(InfrastructureError::Sms(
            "SMS delivery requires a phone number, got an email address".to_string(),
        )),
        None => Err(InfrastructureError::Sms(
            "Invalid phone number format, expected E.164 (e.g. +14155552671)".to_string(),
        )),
    }
}

/// Check that a message fits in a single provider request
pub fn check_message_length(message: &str) -> Result<(), InfrastructureError> {
    if message.chars().count() > MAX_MESSAGE_LEN {
        return Err(InfrastructureError::Sms(format!(
            "Message exceeds maximum length of {} characters",
            MAX_MESSAGE_LEN
        )));
    }
    Ok(())
}
