//! Configuration module with per-concern sub-modules
//!
//! - `otp` - Passcode policy (lengths, expiry, attempts, rate windows, retention)
//! - `cache` - Redis counter store connection
//! - `database` - MySQL record store connection
//! - `environment` - Environment detection and logging configuration

pub mod cache;
pub mod database;
pub mod environment;
pub mod otp;

use serde::{Deserialize, Serialize};
use std::path::Path;

pub use cache::CacheConfig;
pub use database::DatabaseConfig;
pub use environment::{Environment, LogFormat, LoggingConfig};
pub use otp::OtpConfig;

/// Prefix for environment overrides when loading from a file,
/// e.g. `VERIFLOW__OTP__MAX_ATTEMPTS=3`
const ENV_OVERRIDE_PREFIX: &str = "VERIFLOW";

/// Complete application configuration combining all sub-configurations
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Environment configuration
    #[serde(default)]
    pub environment: Environment,

    /// Passcode policy
    #[serde(default)]
    pub otp: OtpConfig,

    /// Record store database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Counter store configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        let env = Environment::default();
        Self {
            environment: env,
            otp: OtpConfig::default(),
            database: DatabaseConfig::default(),
            cache: CacheConfig::default(),
            logging: LoggingConfig::for_environment(env),
        }
    }
}

impl AppConfig {
    /// Load configuration from process environment (and a `.env` file if present)
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();

        let environment = Environment::from_env();
        let mut logging = LoggingConfig::for_environment(environment);
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            logging.level = level;
        }

        let config = Self {
            environment,
            otp: OtpConfig::from_env(),
            database: DatabaseConfig::from_env(),
            cache: CacheConfig::from_env(),
            logging,
        };
        config.otp.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, with `VERIFLOW__*` environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix(ENV_OVERRIDE_PREFIX).separator("__"))
            .build()
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;

        let config: Self = settings
            .try_deserialize()
            .map_err(|e| format!("Invalid configuration in {}: {}", path.display(), e))?;
        config.otp.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_default_is_valid() {
        let config = AppConfig::default();
        assert!(config.otp.validate().is_ok());
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_app_config_from_toml_file() {
        let dir = std::env::temp_dir().join(format!("veriflow-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("veriflow.toml");
        std::fs::write(
            &path,
            r#"
environment = "production"

[otp]
max_attempts = 3
retention_hours = 48

[database]
url = "mysql://db:3306/otp"
max_connections = 20
connect_timeout = 5
idle_timeout = 600
max_lifetime = 1800
"#,
        )
        .unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.otp.max_attempts, 3);
        assert_eq!(config.otp.retention_hours, 48);
        assert_eq!(config.otp.code_length, 6);
        assert_eq!(config.database.max_connections, 20);
        assert_eq!(config.cache.url, "redis://localhost:6379");

        std::fs::remove_dir_all(&dir).ok();
    }
}
