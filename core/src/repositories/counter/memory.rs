//! In-memory counter store backed by a single mutex

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::errors::{DomainError, DomainResult};

use super::r#trait::{CounterEntry, CounterStore};

struct Slot {
    count: u64,
    expires_at: Instant,
}

pub struct InMemoryCounterStore {
    slots: Mutex<HashMap<String, Slot>>,
    unavailable: AtomicBool,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Drops every counter, as a cache flush or restart would
    pub async fn clear(&self) {
        self.slots.lock().await.clear();
    }

    fn guard(&self, operation: &str) -> DomainResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DomainError::internal(format!(
                "counter store unavailable during {}",
                operation
            )));
        }
        Ok(())
    }
}

impl Default for InMemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn get(&self, key: &str) -> DomainResult<Option<CounterEntry>> {
        self.guard("get")?;
        let now = Instant::now();
        let mut slots = self.slots.lock().await;

        match slots.get(key) {
            Some(slot) if slot.expires_at > now => Ok(Some(CounterEntry {
                count: slot.count,
                ttl: Some(slot.expires_at - now),
            })),
            Some(_) => {
                slots.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn increment(&self, key: &str, ttl: Duration) -> DomainResult<CounterEntry> {
        self.guard("increment")?;
        let now = Instant::now();
        let mut slots = self.slots.lock().await;

        let slot = slots
            .entry(key.to_string())
            .and_modify(|slot| {
                if slot.expires_at <= now {
                    slot.count = 0;
                    slot.expires_at = now + ttl;
                }
            })
            .or_insert(Slot {
                count: 0,
                expires_at: now + ttl,
            });
        slot.count += 1;

        Ok(CounterEntry {
            count: slot.count,
            ttl: Some(slot.expires_at - now),
        })
    }

    async fn ping(&self) -> DomainResult<()> {
        self.guard("ping")
    }
}
