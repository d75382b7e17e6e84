//! Redis client implementation
//!
//! This module provides a Redis client with a multiplexed connection, retry
//! logic, and the counter operations behind rate windows: reading a counter
//! with its remaining TTL and incrementing it atomically with an expiry.

use redis::{aio::MultiplexedConnection, Client, RedisError, RedisResult, Script};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use vf_shared::config::CacheConfig;

use crate::InfrastructureError;

/// Increments a counter and sets its expiry only when the counter is created.
/// A key left without an expiry (for example by a crash between INCR and
/// PEXPIRE on an older deployment) gets one again.
const INCREMENT_WITH_EXPIRY: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
local ttl = redis.call('PTTL', KEYS[1])
if ttl < 0 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
    ttl = tonumber(ARGV[1])
end
return {count, ttl}
"#;

type RedisFuture<T> = Pin<Box<dyn Future<Output = RedisResult<T>> + Send>>;

/// Redis client with retry logic
///
/// Cloning is cheap; all clones share one multiplexed connection.
#[derive(Clone)]
pub struct RedisClient {
    /// Redis multiplexed connection for async operations
    connection: MultiplexedConnection,
    /// Configuration used to create this client
    config: CacheConfig,
    increment_script: Script,
    /// Maximum number of attempts for operations
    max_retries: u32,
    /// Base delay between retries (exponential backoff)
    retry_delay_ms: u64,
}

impl RedisClient {
    /// Create a new Redis client
    ///
    /// Connection attempts are bounded by `config.connect_retries` and each
    /// one by `config.connection_timeout` seconds.
    ///
    /// # Example
    /// ```no_run
    /// use vf_infra::cache::RedisClient;
    /// use vf_shared::config::CacheConfig;
    ///
    /// async fn create_client() -> Result<RedisClient, Box<dyn std::error::Error>> {
    ///     let config = CacheConfig::new("redis://localhost:6379").with_prefix("veriflow");
    ///     let client = RedisClient::new(config).await?;
    ///     Ok(client)
    /// }
    /// ```
    pub async fn new(config: CacheConfig) -> Result<Self, InfrastructureError> {
        Self::new_with_retry_config(config, 3, 100).await
    }

    /// Create a new Redis client with custom retry configuration for operations
    pub async fn new_with_retry_config(
        config: CacheConfig,
        max_retries: u32,
        retry_delay_ms: u64,
    ) -> Result<Self, InfrastructureError> {
        info!("Creating Redis client with URL: {}", mask_url(&config.url));

        let client = Client::open(config.url.as_str()).map_err(|e| {
            error!("Failed to parse Redis URL: {}", e);
            InfrastructureError::Config(format!("Invalid Redis URL: {}", e))
        })?;

        let connection = Self::create_connection_with_retry(
            client,
            config.connect_retries.max(1),
            Duration::from_secs(config.connection_timeout),
            retry_delay_ms,
        )
        .await?;

        info!("Redis client created successfully");

        Ok(Self {
            connection,
            config,
            increment_script: Script::new(INCREMENT_WITH_EXPIRY),
            max_retries: max_retries.max(1),
            retry_delay_ms,
        })
    }

    async fn create_connection_with_retry(
        client: Client,
        max_retries: u32,
        connect_timeout: Duration,
        retry_delay_ms: u64,
    ) -> Result<MultiplexedConnection, InfrastructureError> {
        let mut attempts = 0;
        let mut delay = retry_delay_ms;

        loop {
            attempts += 1;
            debug!("Attempting to connect to Redis (attempt {})", attempts);

            let outcome =
                tokio::time::timeout(connect_timeout, client.get_multiplexed_async_connection())
                    .await;

            let error = match outcome {
                Ok(Ok(connection)) => {
                    info!("Successfully connected to Redis");
                    return Ok(connection);
                }
                Ok(Err(e)) => InfrastructureError::Cache(e),
                Err(_) => InfrastructureError::Config(format!(
                    "Redis connection timed out after {}s",
                    connect_timeout.as_secs()
                )),
            };

            if attempts >= max_retries {
                error!(
                    "Failed to connect to Redis after {} attempts: {}",
                    attempts, error
                );
                return Err(error);
            }

            warn!(
                "Failed to connect to Redis (attempt {}/{}): {}. Retrying in {}ms...",
                attempts, max_retries, error, delay
            );
            sleep(Duration::from_millis(delay)).await;
            delay = (delay * 2).min(5000);
        }
    }

    /// Configuration this client was created with
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Read a counter and its remaining lifetime
    ///
    /// # Returns
    /// * `Ok(None)` - Key is absent or expired
    /// * `Ok(Some((count, ttl)))` - `ttl` is `None` when the key has no expiry
    pub async fn get_counter(
        &self,
        key: &str,
    ) -> Result<Option<(u64, Option<Duration>)>, InfrastructureError> {
        debug!("Reading counter '{}'", key);

        let result = self
            .execute_with_retry(|mut conn| {
                let key = key.to_string();
                Box::pin(async move {
                    redis::pipe()
                        .atomic()
                        .cmd("GET")
                        .arg(&key)
                        .cmd("PTTL")
                        .arg(&key)
                        .query_async::<_, (Option<u64>, i64)>(&mut conn)
                        .await
                })
            })
            .await;

        match result {
            Ok((Some(count), ttl_ms)) => Ok(Some((count, ttl_from_millis(ttl_ms)))),
            Ok((None, _)) => Ok(None),
            Err(e) => {
                error!("Failed to read counter '{}': {}", key, e);
                Err(InfrastructureError::Cache(e))
            }
        }
    }

    /// Atomically increment a counter, creating it with `ttl` if absent
    ///
    /// An existing counter keeps its original expiry, which makes the
    /// counter a fixed window.
    ///
    /// # Returns
    /// * `(count, ttl)` - New count and the counter's remaining lifetime
    pub async fn increment_with_expiry(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Result<(u64, Option<Duration>), InfrastructureError> {
        debug!("Incrementing counter '{}'", key);
        let ttl_ms = ttl.as_millis().max(1) as u64;

        let result = self
            .execute_with_retry(|mut conn| {
                let key = key.to_string();
                let script = self.increment_script.clone();
                Box::pin(async move {
                    script
                        .key(key)
                        .arg(ttl_ms)
                        .invoke_async::<_, (i64, i64)>(&mut conn)
                        .await
                })
            })
            .await;

        match result {
            Ok((count, remaining)) => {
                debug!("Counter '{}' incremented to {}", key, count);
                Ok((count.max(0) as u64, ttl_from_millis(remaining)))
            }
            Err(e) => {
                error!("Failed to increment counter '{}': {}", key, e);
                Err(InfrastructureError::Cache(e))
            }
        }
    }

    /// Check if the Redis connection is healthy
    ///
    /// Sends a single PING without retries so a probe reflects the current
    /// state of the connection.
    pub async fn health_check(&self) -> Result<bool, InfrastructureError> {
        debug!("Performing Redis health check");
        let mut conn = self.connection.clone();

        match redis::cmd("PING").query_async::<_, String>(&mut conn).await {
            Ok(response) if response == "PONG" => Ok(true),
            Ok(response) => {
                warn!("Redis health check returned unexpected response: {}", response);
                Ok(false)
            }
            Err(e) => {
                error!("Redis health check failed: {}", e);
                Err(InfrastructureError::Cache(e))
            }
        }
    }

    /// Execute a Redis operation with retries and exponential backoff
    async fn execute_with_retry<F, T>(&self, operation: F) -> RedisResult<T>
    where
        F: Fn(MultiplexedConnection) -> RedisFuture<T>,
    {
        let mut attempts = 0;
        let mut delay = self.retry_delay_ms;

        loop {
            attempts += 1;
            let conn = self.connection.clone();

            match operation(conn).await {
                Ok(result) => return Ok(result),
                Err(e) if attempts < self.max_retries && is_retriable_error(&e) => {
                    warn!(
                        "Redis operation failed (attempt {}/{}): {}. Retrying in {}ms...",
                        attempts, self.max_retries, e, delay
                    );
                    sleep(Duration::from_millis(delay)).await;
                    delay = (delay * 2).min(5000);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// PTTL returns -1 for a key without expiry and -2 for a missing key
pub(crate) fn ttl_from_millis(ttl_ms: i64) -> Option<Duration> {
    (ttl_ms >= 0).then(|| Duration::from_millis(ttl_ms as u64))
}

/// Whether an error is transient and the operation should be retried
pub(crate) fn is_retriable_error(error: &RedisError) -> bool {
    matches!(
        error.kind(),
        redis::ErrorKind::IoError
            | redis::ErrorKind::ClientError
            | redis::ErrorKind::BusyLoadingError
            | redis::ErrorKind::TryAgain
    )
}

/// Mask credentials in a Redis URL for logging
pub(crate) fn mask_url(url: &str) -> String {
    if let (Some(at_pos), Some(proto_end)) = (url.rfind('@'), url.find("://")) {
        if at_pos > proto_end {
            return format!("{}****{}", &url[..proto_end + 3], &url[at_pos..]);
        }
    }
    url.to_string()
}
