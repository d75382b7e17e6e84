//! Mock SMS Service Implementation
//!
//! Logs messages instead of sending them. Used for development and tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

use vf_shared::utils::mask_identity;

use super::sms_service::{check_message_length, normalize_phone_number, SmsService};
use crate::InfrastructureError;

/// Mock SMS service for development and testing
///
/// Clones share the message counter, the failure switch and the last
/// delivered message.
#[derive(Clone, Default)]
pub struct MockSmsService {
    message_count: Arc<AtomicU64>,
    simulate_failure: Arc<AtomicBool>,
    last_message: Arc<Mutex<Option<(String, String)>>>,
}

impl MockSmsService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of messages sent
    pub fn get_message_count(&self) -> u64 {
        self.message_count.load(Ordering::SeqCst)
    }

    pub fn reset_counter(&self) {
        self.message_count.store(0, Ordering::SeqCst);
    }

    /// Make every following send fail
    pub fn set_simulate_failure(&self, simulate: bool) {
        self.simulate_failure.store(simulate, Ordering::SeqCst);
    }

    /// Recipient and body of the most recent message
    pub fn last_message(&self) -> Option<(String, String)> {
        self.last_message
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or(None)
    }
}

#[async_trait]
impl SmsService for MockSmsService {
    async fn send_sms(
        &self,
        phone_number: &str,
        message: &str,
    ) -> Result<String, InfrastructureError> {
        let phone = normalize_phone_number(phone_number)?;
        check_message_length(message)?;

        if self.simulate_failure.load(Ordering::SeqCst) {
            warn!(
                provider = "mock",
                phone = %mask_identity(&phone),
                "Mock SMS service simulating failure"
            );
            return Err(InfrastructureError::Sms(
                "Simulated SMS sending failure".to_string(),
            ));
        }

        let message_id = format!("mock_{}", Uuid::new_v4());
        let count = self.message_count.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut last) = self.last_message.lock() {
            *last = Some((phone.clone(), message.to_string()));
        }

        info!(
            target: "sms_service",
            provider = "mock",
            phone = %mask_identity(&phone),
            message_id = %message_id,
            message_number = count,
            "Mock SMS sent"
        );

        Ok(message_id)
    }

    fn provider_name(&self) -> &str {
        "Mock"
    }

    async fn is_available(&self) -> bool {
        !self.simulate_failure.load(Ordering::SeqCst)
    }
}
