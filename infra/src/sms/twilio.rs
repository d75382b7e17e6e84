//! Twilio SMS Service Implementation
//!
//! Production SMS delivery through the Twilio API with retry and backoff.
//! Client errors (4xx) are not retried; rate limits and server errors are.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use twilio::{Client, OutboundMessage};

use vf_shared::utils::mask_identity;

use super::sms_service::{check_message_length, normalize_phone_number, SmsService};
use crate::config::SmsConfig;
use crate::InfrastructureError;

/// Twilio SMS service configuration
#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    /// Sending number, must be a Twilio number in E.164 format
    pub from_number: String,
    pub max_retries: u32,
    /// Initial retry delay in milliseconds
    pub retry_delay_ms: u64,
}

impl TwilioConfig {
    /// Build from the generic SMS settings
    pub fn from_sms_config(config: &SmsConfig) -> Result<Self, InfrastructureError> {
        if config.api_key.is_empty() || config.api_secret.is_empty() {
            return Err(InfrastructureError::Config(
                "Twilio requires SMS_API_KEY and SMS_API_SECRET".to_string(),
            ));
        }
        let from_number = normalize_phone_number(&config.from_number).map_err(|_| {
            InfrastructureError::Config("SMS_FROM_NUMBER must be in E.164 format".to_string())
        })?;

        Ok(Self {
            account_sid: config.api_key.clone(),
            auth_token: config.api_secret.clone(),
            from_number,
            max_retries: 3,
            retry_delay_ms: 1000,
        })
    }
}

/// Whether a Twilio error message describes a transient failure
pub(crate) fn is_retryable_failure(error_message: &str) -> bool {
    let lowered = error_message.to_lowercase();
    if lowered.contains("400") || lowered.contains("invalid") {
        return false;
    }
    ["429", "rate", "500", "502", "503", "504", "timed out", "connection"]
        .iter()
        .any(|marker| lowered.contains(marker))
}

/// Twilio SMS service implementation
pub struct TwilioSmsService {
    client: Client,
    config: TwilioConfig,
}

impl TwilioSmsService {
    pub fn new(config: TwilioConfig) -> Self {
        let client = Client::new(&config.account_sid, &config.auth_token);
        info!(
            "Twilio SMS service initialized with from number: {}",
            mask_identity(&config.from_number)
        );
        Self { client, config }
    }

    async fn send_with_retry(&self, to: &str, message: &str) -> Result<String, InfrastructureError> {
        let mut attempts = 0;
        let mut delay = Duration::from_millis(self.config.retry_delay_ms);

        loop {
            attempts += 1;
            debug!(
                "Sending SMS attempt {}/{} to {}",
                attempts,
                self.config.max_retries,
                mask_identity(to)
            );

            let msg = OutboundMessage::new(&self.config.from_number, to, message);
            match self.client.send_message(msg).await {
                Ok(response) => {
                    info!(
                        "SMS sent successfully to {} with SID: {}",
                        mask_identity(to),
                        response.sid
                    );
                    return Ok(response.sid);
                }
                Err(e) => {
                    let error_message = e.to_string();
                    error!(
                        "Failed to send SMS (attempt {}/{}): {}",
                        attempts, self.config.max_retries, error_message
                    );

                    if attempts >= self.config.max_retries || !is_retryable_failure(&error_message)
                    {
                        return Err(InfrastructureError::Sms(format!(
                            "Failed to send SMS after {} attempts: {}",
                            attempts, error_message
                        )));
                    }

                    warn!("Retrying Twilio request after {:?}", delay);
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }
}

#[async_trait]
impl SmsService for TwilioSmsService {
    async fn send_sms(
        &self,
        phone_number: &str,
        message: &str,
    ) -> Result<String, InfrastructureError> {
        let phone = normalize_phone_number(phone_number)?;
        check_message_length(message)?;

        info!(
            "Sending SMS to {} via Twilio (message length: {} chars)",
            mask_identity(&phone),
            message.len()
        );
        self.send_with_retry(&phone, message).await
    }

    fn provider_name(&self) -> &str {
        "Twilio"
    }
}
