//! Redis connection settings and start-up connection helpers.

use crate::{ConfigError, FromEnv, env_optional};
use redis::Client;
use redis::aio::ConnectionManager;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Redis configuration
#[derive(Clone, Debug)]
pub struct RedisConfig {
    /// Redis connection URL, e.g. `redis://127.0.0.1:6379`.
    pub url: String,
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl FromEnv for RedisConfig {
    /// `REDIS_URL` first, `REDIS_HOST` for compatibility. No default.
    fn from_env() -> Result<Self, ConfigError> {
        let url = env_optional("REDIS_URL")
            .or_else(|| env_optional("REDIS_HOST"))
            .ok_or_else(|| ConfigError::MissingEnvVar("REDIS_URL or REDIS_HOST".to_string()))?;

        Ok(Self { url })
    }
}

/// Backoff settings for the start-up connection attempt.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay_ms: 200,
            max_delay_ms: 5_000,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (1-based), doubling up to the cap.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.initial_delay_ms.saturating_mul(factor).min(self.max_delay_ms))
    }
}

/// Connect and verify the connection with `PING`.
///
/// The returned `ConnectionManager` reconnects on its own after start-up, so
/// it is cloned freely and shared by every component of the process.
pub async fn connect(config: &RedisConfig) -> redis::RedisResult<ConnectionManager> {
    let client = Client::open(config.url.as_str())?;
    let manager = ConnectionManager::new(client).await?;

    let mut conn = manager.clone();
    let _: String = redis::cmd("PING").query_async(&mut conn).await?;

    info!("Connected to Redis");
    Ok(manager)
}

/// Connect with exponential backoff, for services that may start before Redis.
pub async fn connect_with_retry(
    config: &RedisConfig,
    retry: Option<RetryConfig>,
) -> redis::RedisResult<ConnectionManager> {
    let retry = retry.unwrap_or_default();
    let mut attempt = 0;

    loop {
        match connect(config).await {
            Ok(manager) => {
                if attempt > 0 {
                    debug!(attempt, "Redis connection succeeded after retries");
                }
                return Ok(manager);
            }
            Err(e) if attempt < retry.max_retries => {
                attempt += 1;
                let delay = retry.delay_for(attempt);
                warn!(
                    attempt,
                    max_retries = retry.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Redis connection failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
