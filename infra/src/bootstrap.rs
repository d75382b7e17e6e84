//! Service wiring: connects the stores and builds the engine, sweeper and
//! health reporter on top of them.

use std::sync::Arc;

use vf_core::errors::DomainResult;
use vf_core::services::{HealthReporter, RetentionSweeper, VerificationEngine};
use vf_shared::config::{AppConfig, OtpConfig};

use crate::cache::{RedisClient, RedisCounterStore};
use crate::config::{InfrastructureConfig, NotifierConfig};
use crate::database::{DatabasePool, MySqlRecordStore};
use crate::notify::{create_notifier, ConfiguredNotifier};
use crate::InfrastructureError;

/// Engine backed by MySQL records, Redis counters and the configured notifier
pub type Engine = VerificationEngine<MySqlRecordStore, RedisCounterStore, ConfiguredNotifier>;

/// Connected infrastructure and the services built on it
pub struct InfrastructureServices {
    pub database: DatabasePool,
    pub redis: RedisClient,
    pub record_store: Arc<MySqlRecordStore>,
    pub counter_store: Arc<RedisCounterStore>,
    pub notifier: Arc<ConfiguredNotifier>,
    pub otp: OtpConfig,
}

impl InfrastructureServices {
    /// Verification engine over the shared stores
    pub fn engine(&self) -> DomainResult<Engine> {
        VerificationEngine::new(
            self.record_store.clone(),
            self.counter_store.clone(),
            self.notifier.clone(),
            self.otp.clone(),
        )
    }

    pub fn sweeper(&self) -> RetentionSweeper<MySqlRecordStore> {
        RetentionSweeper::new(self.record_store.clone(), self.otp.clone())
    }

    pub fn health_reporter(&self) -> HealthReporter<MySqlRecordStore, RedisCounterStore> {
        HealthReporter::new(
            self.record_store.clone(),
            self.counter_store.clone(),
            self.otp.health_timeout(),
        )
    }

    /// Close the database pool; the Redis connection drops with `self`
    pub async fn shutdown(self) {
        self.database.close().await;
        tracing::info!("Infrastructure services shut down");
    }
}

/// Initialize infrastructure services from the environment
///
/// This function sets up:
/// - The MySQL connection pool and record store
/// - The Redis connection and counter store
/// - The notifier for the configured channel
pub async fn initialize() -> Result<InfrastructureServices, InfrastructureError> {
    initialize_with(load_config()?).await
}

/// Initialize infrastructure services from explicit configuration
pub async fn initialize_with(
    config: InfrastructureConfig,
) -> Result<InfrastructureServices, InfrastructureError> {
    tracing::info!("Initializing infrastructure services...");
    config.validate()?;

    let notifier = create_notifier(
        &config.notifier,
        config.otp.expiry_minutes,
        config.otp.notify_timeout(),
    )?;

    let database = DatabasePool::new(config.database).await?;
    let redis = RedisClient::new(config.cache).await?;

    let record_store = Arc::new(MySqlRecordStore::new(database.get_pool().clone()));
    let counter_store = Arc::new(RedisCounterStore::new(redis.clone()));

    tracing::info!(
        notifier = ?notifier.channel(),
        "Infrastructure services initialized successfully"
    );

    Ok(InfrastructureServices {
        database,
        redis,
        record_store,
        counter_store,
        notifier: Arc::new(notifier),
        otp: config.otp,
    })
}

/// Load infrastructure configuration from environment (and `.env`)
pub fn load_config() -> Result<InfrastructureConfig, InfrastructureError> {
    let app = AppConfig::from_env().map_err(InfrastructureError::Config)?;
    let notifier = NotifierConfig::from_env()?;
    Ok(InfrastructureConfig::from_app_config(app, notifier))
}
