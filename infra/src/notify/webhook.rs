//! Notifier that posts codes to an HTTP endpoint owned by the caller

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::warn;

use vf_core::domain::entities::OtpPurpose;
use vf_core::services::Notifier;
use vf_shared::utils::mask_identity;

use crate::InfrastructureError;

#[derive(Debug, Serialize)]
struct DeliveryRequest<'a> {
    identity: &'a str,
    purpose: OtpPurpose,
    code: &'a str,
}

/// POSTs `{identity, purpose, code}` as JSON
///
/// A 2xx answer means accepted, a 4xx answer means declined, anything else
/// is a delivery error.
#[derive(Clone)]
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl WebhookNotifier {
    pub fn new(
        url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, InfrastructureError> {
        let url = url.into();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(InfrastructureError::Config(format!(
                "Webhook URL must be http(s): {}",
                url
            )));
        }

        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, url, token })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, identity: &str, purpose: OtpPurpose, code: &str) -> Result<bool, String> {
        let mut request = self.http.post(&self.url).json(&DeliveryRequest {
            identity,
            purpose,
            code,
        });
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request.send().await.map_err(|e| e.to_string())?;
        let status = response.status();

        if status.is_success() {
            Ok(true)
        } else if status.is_client_error() {
            warn!(
                event = "otp_notification_rejected",
                identity = %mask_identity(identity),
                status = status.as_u16(),
                "Webhook declined verification code"
            );
            Ok(false)
        } else {
            Err(format!("webhook answered {}", status))
        }
    }
}
