//! Health reporter probing both stores

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::DomainResult;
use crate::repositories::{CounterStore, RecordStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Both stores answer
    Healthy,
    /// Only the counter store is down; validation still works
    Degraded,
    /// The record store is down
    Unhealthy,
}

/// Outcome of one probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub up: bool,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub record_store_up: bool,
    pub counter_store_up: bool,
    /// True only when both stores are up
    pub overall: bool,
    pub status: HealthStatus,
    pub record_store: ProbeResult,
    pub counter_store: ProbeResult,
    pub checked_at: DateTime<Utc>,
}

pub struct HealthReporter<R: RecordStore, C: CounterStore> {
    record_store: Arc<R>,
    counter_store: Arc<C>,
    timeout: Duration,
}

impl<R: RecordStore, C: CounterStore> HealthReporter<R, C> {
    pub fn new(record_store: Arc<R>, counter_store: Arc<C>, timeout: Duration) -> Self {
        Self {
            record_store,
            counter_store,
            timeout,
        }
    }

    /// Probe both stores concurrently, each bounded by the probe timeout
    pub async fn check(&self) -> HealthReport {
        let (record_store, counter_store) = tokio::join!(
            probe("record_store", self.timeout, self.record_store.ping()),
            probe("counter_store", self.timeout, self.counter_store.ping()),
        );

        let status = match (record_store.up, counter_store.up) {
            (true, true) => HealthStatus::Healthy,
            (true, false) => HealthStatus::Degraded,
            (false, _) => HealthStatus::Unhealthy,
        };

        HealthReport {
            record_store_up: record_store.up,
            counter_store_up: counter_store.up,
            overall: record_store.up && counter_store.up,
            status,
            record_store,
            counter_store,
            checked_at: Utc::now(),
        }
    }
}

async fn probe<F>(store: &'static str, timeout: Duration, ping: F) -> ProbeResult
where
    F: std::future::Future<Output = DomainResult<()>>,
{
    let started = Instant::now();
    let outcome = tokio::time::timeout(timeout, ping).await;
    let latency_ms = started.elapsed().as_millis() as u64;

    let error = match outcome {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(_) => Some(format!("no answer within {}ms", timeout.as_millis())),
    };

    if let Some(error) = &error {
        warn!(
            store = store,
            error = %error,
            latency_ms = latency_ms,
            event = "store_health_check_failed",
            "Store health probe failed"
        );
    }

    ProbeResult {
        up: error.is_none(),
        latency_ms,
        error,
    }
}
