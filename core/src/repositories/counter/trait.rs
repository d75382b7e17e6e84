//! Counter store trait for rate window accounting.

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::DomainResult;

/// Current value of a counter and how long it has left to live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterEntry {
    pub count: u64,
    /// `None` when the store could not report a TTL
    pub ttl: Option<Duration>,
}

/// Fast keyed counters with expiry
///
/// Losing counter state only relaxes rate limits; it never affects the
/// correctness of validation.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Live counter for `key`, or `None` if absent or expired
    async fn get(&self, key: &str) -> DomainResult<Option<CounterEntry>>;

    /// Atomically adds one. A missing key is created with count 1 and the
    /// given `ttl`; an existing key keeps its original expiry.
    async fn increment(&self, key: &str, ttl: Duration) -> DomainResult<CounterEntry>;

    async fn ping(&self) -> DomainResult<()>;
}
