//! Notifier implementations
//!
//! The engine hands every issued code to a [`Notifier`]. This module
//! provides the channels the service can be configured with and
//! [`create_notifier`], which picks one from [`NotifierConfig`].

pub mod log;
pub mod sms;
pub mod webhook;

use std::time::Duration;

use async_trait::async_trait;

use vf_core::domain::entities::OtpPurpose;
use vf_core::services::Notifier;

use crate::config::{NotifierChannel, NotifierConfig};
use crate::sms::{create_sms_service, SmsService};
use crate::InfrastructureError;

pub use self::log::LogNotifier;
pub use self::sms::SmsNotifier;
pub use self::webhook::WebhookNotifier;

/// Notifier selected at startup
pub enum ConfiguredNotifier {
    Log(LogNotifier),
    Sms(SmsNotifier<Box<dyn SmsService>>),
    Webhook(WebhookNotifier),
}

impl ConfiguredNotifier {
    pub fn channel(&self) -> NotifierChannel {
        match self {
            ConfiguredNotifier::Log(_) => NotifierChannel::Log,
            ConfiguredNotifier::Sms(_) => NotifierChannel::Sms,
            ConfiguredNotifier::Webhook(_) => NotifierChannel::Webhook,
        }
    }
}

#[async_trait]
impl Notifier for ConfiguredNotifier {
    async fn send(&self, identity: &str, purpose: OtpPurpose, code: &str) -> Result<bool, String> {
        match self {
            ConfiguredNotifier::Log(n) => n.send(identity, purpose, code).await,
            ConfiguredNotifier::Sms(n) => n.send(identity, purpose, code).await,
            ConfiguredNotifier::Webhook(n) => n.send(identity, purpose, code).await,
        }
    }
}

/// Build the notifier for the configured channel
///
/// # Arguments
/// * `expires_in_minutes` - Code lifetime quoted in SMS bodies and kept by
///   the log channel
/// * `timeout` - Request timeout for the webhook channel
pub fn create_notifier(
    config: &NotifierConfig,
    expires_in_minutes: i64,
    timeout: Duration,
) -> Result<ConfiguredNotifier, InfrastructureError> {
    match config.channel {
        NotifierChannel::Log => {
            let retain = Duration::from_secs(expires_in_minutes.max(0) as u64 * 60);
            Ok(ConfiguredNotifier::Log(LogNotifier::new(retain)))
        }
        NotifierChannel::Sms => {
            let sms = create_sms_service(&config.sms)?;
            tracing::info!(provider = sms.provider_name(), "SMS notifier configured");
            Ok(ConfiguredNotifier::Sms(SmsNotifier::new(sms, expires_in_minutes)))
        }
        NotifierChannel::Webhook => {
            let url = config.webhook_url.as_deref().ok_or_else(|| {
                InfrastructureError::Config(
                    "OTP_WEBHOOK_URL is required for the webhook notifier".to_string(),
                )
            })?;
            let notifier = WebhookNotifier::new(url, config.webhook_token.clone(), timeout)?;
            Ok(ConfiguredNotifier::Webhook(notifier))
        }
    }
}
