//! SMS Service Module
//!
//! SMS providers that deliver verification codes to phone identities.
//!
//! - **SMS Service Trait**: common interface for all providers
//! - **Mock Implementation**: logs instead of sending, for development
//! - **Twilio Support**: production delivery (feature `twilio-sms`)

pub mod mock_sms;
pub mod sms_service;

#[cfg(feature = "twilio-sms")]
pub mod twilio;

pub use mock_sms::MockSmsService;
pub use sms_service::{
    check_message_length, normalize_phone_number, verification_message, SmsService,
    MAX_MESSAGE_LEN,
};

#[cfg(feature = "twilio-sms")]
pub use twilio::{TwilioConfig, TwilioSmsService};

#[cfg(test)]
mod tests;

use crate::config::SmsConfig;

/// Create an SMS service based on configuration
///
/// Unknown providers, and any provider when the `mock-services` feature is
/// enabled, fall back to the mock implementation. A Twilio configuration
/// that cannot be used is an error rather than a silent fallback.
pub fn create_sms_service(config: &SmsConfig) -> Result<Box<dyn SmsService>, crate::InfrastructureError> {
    if cfg!(feature = "mock-services") {
        return Ok(Box::new(MockSmsService::new()));
    }

    match config.provider.to_lowercase().as_str() {
        "mock" => Ok(Box::new(MockSmsService::new())),
        #[cfg(feature = "twilio-sms")]
        "twilio" => {
            let twilio_config = TwilioConfig::from_sms_config(config)?;
            Ok(Box::new(TwilioSmsService::new(twilio_config)))
        }
        #[cfg(not(feature = "twilio-sms"))]
        "twilio" => Err(crate::InfrastructureError::Config(
            "SMS provider 'twilio' requires the twilio-sms feature".to_string(),
        )),
        other => {
            tracing::warn!(
                "Unknown SMS provider '{}', using mock implementation",
                other
            );
            Ok(Box::new(MockSmsService::new()))
        }
    }
}
