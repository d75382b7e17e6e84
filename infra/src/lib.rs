//! # Infrastructure Layer
//!
//! This crate implements the infrastructure layer for Veriflow. It provides
//! concrete store and delivery implementations for the verification engine.
//!
//! ## Architecture
//!
//! The infrastructure layer contains:
//! - **Database**: MySQL record store using SQLx
//! - **Cache**: Redis counter store for rate windows
//! - **SMS**: SMS providers (Twilio, mock)
//! - **Notify**: Notifier implementations (log, SMS, webhook)
//!
//! ## Features
//!
//! - `mysql`: Enable MySQL record store (default)
//! - `redis-cache`: Enable Redis counter store (default)
//! - `twilio-sms`: Enable Twilio SMS delivery
//! - `mock-services`: Prefer mock delivery regardless of configuration

// Re-export core types for convenience
pub use vf_core::errors::*;

/// Database module - MySQL record store using SQLx
#[cfg(feature = "mysql")]
pub mod database;

/// Cache module - Redis client and counter store
#[cfg(feature = "redis-cache")]
pub mod cache;

/// SMS service module - External SMS providers
pub mod sms;

/// Notifier implementations handing codes to delivery channels
pub mod notify;

/// Configuration module for infrastructure services
pub mod config {
    //! Configuration management for infrastructure services
    //!
    //! Handles:
    //! - Database and Redis settings (from the shared crate)
    //! - Delivery channel selection and credentials

    use serde::{Deserialize, Serialize};
    use vf_shared::config::{AppConfig, CacheConfig, DatabaseConfig, Environment, OtpConfig};

    use crate::InfrastructureError;

    /// Infrastructure configuration settings
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct InfrastructureConfig {
        pub environment: Environment,
        pub otp: OtpConfig,
        pub database: DatabaseConfig,
        pub cache: CacheConfig,
        pub notifier: NotifierConfig,
    }

    /// Which channel receives issued codes
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum NotifierChannel {
        Log,
        Sms,
        Webhook,
    }

    impl std::str::FromStr for NotifierChannel {
        type Err = String;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match s.trim().to_lowercase().as_str() {
                "log" | "mock" => Ok(NotifierChannel::Log),
                "sms" | "twilio" => Ok(NotifierChannel::Sms),
                "webhook" => Ok(NotifierChannel::Webhook),
                other => Err(format!("unknown notifier channel: {}", other)),
            }
        }
    }

    /// Delivery configuration
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct NotifierConfig {
        pub channel: NotifierChannel,
        pub sms: SmsConfig,
        /// Endpoint receiving `POST`ed codes when the channel is `webhook`
        pub webhook_url: Option<String>,
        pub webhook_token: Option<String>,
    }

    /// SMS service configuration
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct SmsConfig {
        /// SMS service provider ("twilio", "mock")
        pub provider: String,
        /// API credentials
        pub api_key: String,
        /// API secret/token
        pub api_secret: String,
        /// From phone number
        pub from_number: String,
    }

    impl Default for NotifierConfig {
        fn default() -> Self {
            Self {
                channel: NotifierChannel::Log,
                sms: SmsConfig {
                    provider: "mock".to_string(),
                    api_key: String::new(),
                    api_secret: String::new(),
                    from_number: "+15550000000".to_string(),
                },
                webhook_url: None,
                webhook_token: None,
            }
        }
    }

    impl NotifierConfig {
        /// Load from process environment
        ///
        /// An `OTP_NOTIFIER` value that names no known channel is an error;
        /// only an unset variable falls back to the log channel.
        pub fn from_env() -> Result<Self, InfrastructureError> {
            Self::from_lookup(|key| std::env::var(key).ok())
        }

        /// Load using `lookup` to resolve variable names
        pub fn from_lookup<F>(lookup: F) -> Result<Self, InfrastructureError>
        where
            F: Fn(&str) -> Option<String>,
        {
            let defaults = Self::default();
            let channel = match lookup("OTP_NOTIFIER").filter(|v| !v.trim().is_empty()) {
                Some(raw) => raw.parse().map_err(InfrastructureError::Config)?,
                None => defaults.channel,
            };

            Ok(Self {
                channel,
                sms: SmsConfig {
                    provider: lookup("SMS_PROVIDER").unwrap_or(defaults.sms.provider),
                    api_key: lookup("SMS_API_KEY").unwrap_or_default(),
                    api_secret: lookup("SMS_API_SECRET").unwrap_or_default(),
                    from_number: lookup("SMS_FROM_NUMBER").unwrap_or(defaults.sms.from_number),
                },
                webhook_url: lookup("OTP_WEBHOOK_URL").filter(|v| !v.is_empty()),
                webhook_token: lookup("OTP_WEBHOOK_TOKEN").filter(|v| !v.is_empty()),
            })
        }
    }

    impl InfrastructureConfig {
        pub fn from_app_config(app: AppConfig, notifier: NotifierConfig) -> Self {
            Self {
                environment: app.environment,
                otp: app.otp,
                database: app.database,
                cache: app.cache,
                notifier,
            }
        }

        /// Reject settings that cannot serve real users
        ///
        /// The log channel accepts every code without delivering it, so it is
        /// only allowed in development.
        pub fn validate(&self) -> Result<(), InfrastructureError> {
            self.otp.validate().map_err(InfrastructureError::Config)?;
            if self.notifier.channel == NotifierChannel::Log && !self.environment.is_development() {
                return Err(InfrastructureError::Config(format!(
                    "the log notifier delivers nothing and is not allowed in {}; set OTP_NOTIFIER",
                    self.environment
                )));
            }
            Ok(())
        }
    }

}

#[cfg(all(feature = "mysql", feature = "redis-cache"))]
mod bootstrap;

#[cfg(all(feature = "mysql", feature = "redis-cache"))]
pub use bootstrap::{initialize, initialize_with, load_config, Engine, InfrastructureServices};

/// Infrastructure-specific error types
#[derive(Debug, thiserror::Error)]
pub enum InfrastructureError {
    /// Database connection error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Redis cache error
    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    /// HTTP request error for external services
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// SMS service error
    #[error("SMS service error: {0}")]
    Sms(String),

    /// Stored data that cannot be mapped back to a domain value
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl From<InfrastructureError> for DomainError {
    fn from(error: InfrastructureError) -> Self {
        DomainError::Internal {
            message: error.to_string(),
        }
    }
}
