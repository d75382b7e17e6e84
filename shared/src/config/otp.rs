//! OTP policy configuration module

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Policy options for issuing, validating and retaining one-time passcodes
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OtpConfig {
    /// Number of digits in a generated code
    #[serde(default = "default_code_length")]
    pub code_length: usize,

    /// Minutes until an issued code expires
    #[serde(default = "default_expiry_minutes")]
    pub expiry_minutes: i64,

    /// Failed validations allowed before a record locks
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Minimum seconds between two issuances for the same identity and purpose
    #[serde(default = "default_resend_cooldown_seconds")]
    pub resend_cooldown_seconds: i64,

    /// Maximum issuances counted within one rate window
    #[serde(default = "default_max_otps_per_window")]
    pub max_otps_per_window: u32,

    /// Length of the rate window in minutes
    #[serde(default = "default_rate_window_minutes")]
    pub rate_window_minutes: i64,

    /// Hours a record is kept past its expiry before the sweeper removes it
    #[serde(default = "default_retention_hours")]
    pub retention_hours: i64,

    /// Maximum records deleted per sweep
    #[serde(default = "default_sweep_batch_size")]
    pub sweep_batch_size: usize,

    /// Seconds between background sweeps
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,

    /// Whether the background sweeper runs at all
    #[serde(default = "default_sweep_enabled")]
    pub sweep_enabled: bool,

    /// Upper bound for a single store round-trip in milliseconds
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    /// Upper bound for a single health probe in milliseconds
    #[serde(default = "default_health_timeout_ms")]
    pub health_timeout_ms: u64,

    /// Upper bound for handing a code to the notifier in milliseconds
    #[serde(default = "default_notify_timeout_ms")]
    pub notify_timeout_ms: u64,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            code_length: default_code_length(),
            expiry_minutes: default_expiry_minutes(),
            max_attempts: default_max_attempts(),
            resend_cooldown_seconds: default_resend_cooldown_seconds(),
            max_otps_per_window: default_max_otps_per_window(),
            rate_window_minutes: default_rate_window_minutes(),
            retention_hours: default_retention_hours(),
            sweep_batch_size: default_sweep_batch_size(),
            sweep_interval_seconds: default_sweep_interval_seconds(),
            sweep_enabled: default_sweep_enabled(),
            store_timeout_ms: default_store_timeout_ms(),
            health_timeout_ms: default_health_timeout_ms(),
            notify_timeout_ms: default_notify_timeout_ms(),
        }
    }
}

impl OtpConfig {
    /// Create from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            code_length: env_or("OTP_CODE_LENGTH", defaults.code_length),
            expiry_minutes: env_or("OTP_EXPIRY_MINUTES", defaults.expiry_minutes),
            max_attempts: env_or("OTP_MAX_ATTEMPTS", defaults.max_attempts),
            resend_cooldown_seconds: env_or(
                "OTP_RESEND_COOLDOWN_SECONDS",
                defaults.resend_cooldown_seconds,
            ),
            max_otps_per_window: env_or("OTP_MAX_PER_WINDOW", defaults.max_otps_per_window),
            rate_window_minutes: env_or("OTP_RATE_WINDOW_MINUTES", defaults.rate_window_minutes),
            retention_hours: env_or("OTP_RETENTION_HOURS", defaults.retention_hours),
            sweep_batch_size: env_or("OTP_SWEEP_BATCH_SIZE", defaults.sweep_batch_size),
            sweep_interval_seconds: env_or(
                "OTP_SWEEP_INTERVAL_SECONDS",
                defaults.sweep_interval_seconds,
            ),
            sweep_enabled: env_or("OTP_SWEEP_ENABLED", defaults.sweep_enabled),
            store_timeout_ms: env_or("OTP_STORE_TIMEOUT_MS", defaults.store_timeout_ms),
            health_timeout_ms: env_or("OTP_HEALTH_TIMEOUT_MS", defaults.health_timeout_ms),
            notify_timeout_ms: env_or("OTP_NOTIFY_TIMEOUT_MS", defaults.notify_timeout_ms),
        }
    }

    /// Check that every option is usable
    pub fn validate(&self) -> Result<(), String> {
        if !(4..=10).contains(&self.code_length) {
            return Err(format!(
                "code_length must be between 4 and 10, got {}",
                self.code_length
            ));
        }
        if self.expiry_minutes <= 0 {
            return Err("expiry_minutes must be positive".to_string());
        }
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".to_string());
        }
        if self.resend_cooldown_seconds < 0 {
            return Err("resend_cooldown_seconds must not be negative".to_string());
        }
        if self.max_otps_per_window == 0 {
            return Err("max_otps_per_window must be at least 1".to_string());
        }
        if self.rate_window_minutes <= 0 {
            return Err("rate_window_minutes must be positive".to_string());
        }
        if self.retention_hours < 0 {
            return Err("retention_hours must not be negative".to_string());
        }
        if self.sweep_batch_size == 0 {
            return Err("sweep_batch_size must be at least 1".to_string());
        }
        if self.sweep_interval_seconds == 0 {
            return Err("sweep_interval_seconds must be positive".to_string());
        }
        if self.store_timeout_ms == 0 || self.health_timeout_ms == 0 || self.notify_timeout_ms == 0 {
            return Err("timeouts must be positive".to_string());
        }
        Ok(())
    }

    pub fn expiry(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.expiry_minutes)
    }

    pub fn resend_cooldown(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.resend_cooldown_seconds)
    }

    pub fn rate_window(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.rate_window_minutes)
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::hours(self.retention_hours)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_millis(self.notify_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn default_code_length() -> usize {
    6
}

fn default_expiry_minutes() -> i64 {
    10
}

fn default_max_attempts() -> u32 {
    5
}

fn default_resend_cooldown_seconds() -> i64 {
    60
}

fn default_max_otps_per_window() -> u32 {
    3
}

fn default_rate_window_minutes() -> i64 {
    60
}

fn default_retention_hours() -> i64 {
    24
}

fn default_sweep_batch_size() -> usize {
    100
}

fn default_sweep_interval_seconds() -> u64 {
    3600 // hourly
}

fn default_sweep_enabled() -> bool {
    true
}

fn default_store_timeout_ms() -> u64 {
    300
}

fn default_health_timeout_ms() -> u64 {
    200
}

fn default_notify_timeout_ms() -> u64 {
    3000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_otp_config_defaults() {
        let config = OtpConfig::default();
        assert_eq!(config.code_length, 6);
        assert_eq!(config.expiry_minutes, 10);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.resend_cooldown_seconds, 60);
        assert_eq!(config.max_otps_per_window, 3);
        assert_eq!(config.rate_window_minutes, 60);
        assert_eq!(config.retention_hours, 24);
        assert_eq!(config.sweep_batch_size, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_otp_config_rejects_bad_values() {
        let config = OtpConfig {
            code_length: 2,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = OtpConfig {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = OtpConfig {
            resend_cooldown_seconds: 0,
            retention_hours: 0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_otp_config_partial_deserialize() {
        let json = r#"{ "max_attempts": 3, "code_length": 8 }"#;
        let config: OtpConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.code_length, 8);
        assert_eq!(config.expiry_minutes, 10);
        assert_eq!(config.sweep_batch_size, 100);
    }

    #[test]
    fn test_duration_helpers() {
        let config = OtpConfig::default();
        assert_eq!(config.expiry(), chrono::Duration::minutes(10));
        assert_eq!(config.retention(), chrono::Duration::hours(24));
        assert_eq!(config.store_timeout(), Duration::from_millis(300));
    }
}
