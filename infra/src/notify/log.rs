//! Development notifier that records deliveries instead of sending them

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, info};

use vf_core::domain::entities::OtpPurpose;
use vf_core::services::Notifier;
use vf_shared::utils::mask_identity;

/// Upper bound on remembered codes
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Logs a masked delivery line and keeps the latest code per identity in
/// memory, so local tooling can read it back. The code itself is never
/// written to the log.
///
/// A remembered code is dropped once `retain` has passed since it was sent,
/// and at most `capacity` identities are kept; the oldest entry is evicted
/// to make room.
pub struct LogNotifier {
    delivered: AtomicU64,
    latest: Mutex<HashMap<String, (String, Instant)>>,
    retain: Duration,
    capacity: usize,
}

impl LogNotifier {
    /// Remember codes for `retain`, normally the code lifetime
    pub fn new(retain: Duration) -> Self {
        Self::with_capacity(retain, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(retain: Duration, capacity: usize) -> Self {
        Self {
            delivered: AtomicU64::new(0),
            latest: Mutex::new(HashMap::new()),
            retain,
            capacity: capacity.max(1),
        }
    }

    pub fn delivered_count(&self) -> u64 {
        self.delivered.load(Ordering::SeqCst)
    }

    /// Number of codes currently remembered
    pub fn remembered(&self) -> usize {
        self.latest.lock().map(|latest| latest.len()).unwrap_or(0)
    }

    /// Most recent code handed over for `identity`, if it has not expired
    pub fn latest_code(&self, identity: &str) -> Option<String> {
        let now = Instant::now();
        self.latest.lock().ok().and_then(|latest| {
            latest
                .get(identity)
                .filter(|(_, sent_at)| now.duration_since(*sent_at) < self.retain)
                .map(|(code, _)| code.clone())
        })
    }

    fn remember(&self, identity: &str, code: &str) {
        let Ok(mut latest) = self.latest.lock() else {
            return;
        };
        let now = Instant::now();
        latest.retain(|_, (_, sent_at)| now.duration_since(*sent_at) < self.retain);

        if latest.len() >= self.capacity && !latest.contains_key(identity) {
            let oldest = latest
                .iter()
                .min_by_key(|(_, (_, sent_at))| *sent_at)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                latest.remove(&oldest);
                debug!(capacity = self.capacity, "Log notifier evicted oldest code");
            }
        }

        latest.insert(identity.to_string(), (code.to_string(), now));
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, identity: &str, purpose: OtpPurpose, code: &str) -> Result<bool, String> {
        let number = self.delivered.fetch_add(1, Ordering::SeqCst) + 1;
        self.remember(identity, code);

        info!(
            event = "otp_notification_logged",
            identity = %mask_identity(identity),
            purpose = %purpose,
            code_length = code.len(),
            message_number = number,
            "Verification code delivered to log channel"
        );
        Ok(true)
    }
}
