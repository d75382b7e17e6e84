//! Redis implementation of the CounterStore trait

use std::time::Duration;

use async_trait::async_trait;

use vf_core::errors::{DomainError, DomainResult};
use vf_core::repositories::{CounterEntry, CounterStore};

use super::redis_client::RedisClient;

/// Rate window counters kept in Redis
///
/// Keys are namespaced with the configured prefix; counter keys handed in by
/// the engine already hash the identity, so nothing personal reaches Redis.
#[derive(Clone)]
pub struct RedisCounterStore {
    client: RedisClient,
}

impl RedisCounterStore {
    pub fn new(client: RedisClient) -> Self {
        Self { client }
    }

    /// Full Redis key for a counter key
    pub fn storage_key(&self, key: &str) -> String {
        self.client.config().make_key(key)
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn get(&self, key: &str) -> DomainResult<Option<CounterEntry>> {
        let entry = self.client.get_counter(&self.storage_key(key)).await?;
        Ok(entry.map(|(count, ttl)| CounterEntry { count, ttl }))
    }

    async fn increment(&self, key: &str, ttl: Duration) -> DomainResult<CounterEntry> {
        let (count, ttl) = self
            .client
            .increment_with_expiry(&self.storage_key(key), ttl)
            .await?;
        Ok(CounterEntry { count, ttl })
    }

    async fn ping(&self) -> DomainResult<()> {
        match self.client.health_check().await? {
            true => Ok(()),
            false => Err(DomainError::internal("redis answered PING unexpectedly")),
        }
    }
}
