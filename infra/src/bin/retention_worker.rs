//! Retention worker
//!
//! Runs the retention sweeper on its configured interval and logs a health
//! report for both stores until interrupted.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vf_core::services::HealthStatus;
use vf_infra::config::{InfrastructureConfig, NotifierConfig};
use vf_shared::config::{AppConfig, LogFormat, LoggingConfig};

const DEFAULT_HEALTH_INTERVAL_SECONDS: u64 = 30;

fn init_tracing(logging: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let registry = tracing_subscriber::registry().with(env_filter);

    match logging.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_file(logging.source_location))
            .init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_file(logging.source_location))
            .init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_file(logging.source_location))
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let app = AppConfig::from_env()
        .map_err(anyhow::Error::msg)
        .context("invalid configuration")?;
    init_tracing(&app.logging);
    info!(environment = ?app.environment, "Starting retention worker");

    let health_interval = std::env::var("HEALTH_INTERVAL_SECONDS")
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|secs: &u64| *secs > 0)
        .unwrap_or(DEFAULT_HEALTH_INTERVAL_SECONDS);

    let notifier = NotifierConfig::from_env().context("invalid notifier configuration")?;
    let config = InfrastructureConfig::from_app_config(app, notifier);
    let services = vf_infra::initialize_with(config)
        .await
        .context("failed to initialize infrastructure")?;

    services
        .record_store
        .ensure_schema()
        .await
        .context("failed to ensure otp_records schema")?;

    let sweeper = Arc::new(services.sweeper());
    let sweep_task = sweeper.start_background_task();
    if sweep_task.is_none() {
        warn!("Retention sweep disabled by configuration");
    }

    let reporter = services.health_reporter();
    let mut ticker = tokio::time::interval(Duration::from_secs(health_interval));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = reporter.check().await;
                match report.status {
                    HealthStatus::Healthy => info!(
                        event = "health_report",
                        status = ?report.status,
                        record_store_ms = report.record_store.latency_ms,
                        counter_store_ms = report.counter_store.latency_ms,
                        "Stores healthy"
                    ),
                    HealthStatus::Degraded => warn!(
                        event = "health_report",
                        status = ?report.status,
                        error = report.counter_store.error.as_deref().unwrap_or(""),
                        "Counter store unavailable, rate limits cannot be enforced"
                    ),
                    HealthStatus::Unhealthy => error!(
                        event = "health_report",
                        status = ?report.status,
                        error = report.record_store.error.as_deref().unwrap_or(""),
                        "Record store unavailable"
                    ),
                }
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    error!("Failed to listen for shutdown signal: {}", e);
                }
                break;
            }
        }
    }

    info!("Shutting down retention worker");
    if let Some(task) = sweep_task {
        task.abort();
    }
    services.shutdown().await;
    Ok(())
}
