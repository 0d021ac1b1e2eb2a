//! Redis cache backend implementation.

use super::CacheBackend;
use crate::error::{Error, Result};
use deadpool_redis::redis::cmd;
use deadpool_redis::{Config, Connection, Pool, PoolConfig, Runtime};
use std::time::Duration;

/// Default Redis connection pool size.
/// Override with REDIS_POOL_SIZE environment variable
const DEFAULT_POOL_SIZE: usize = 16;

/// Configuration for Redis backend.
#[derive(Clone, Debug)]
pub struct RedisConfig {
    pub url: String, // e.g., "redis://127.0.0.1:6379/0"
    pub pool_size: usize,
}

impl Default for RedisConfig {
    fn default() -> Self {
        RedisConfig {
            url: "redis://127.0.0.1:6379".to_string(),
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

/// Redis backend with connection pooling.
///
/// Values are written with `SET key value PX <ttl>`, so expiry has
/// millisecond precision.
///
/// # Example
///
/// ```no_run
/// # use memo_kit::backend::{CacheBackend, RedisBackend, RedisConfig};
/// # use std::time::Duration;
/// # async fn example() -> memo_kit::Result<()> {
/// let backend = RedisBackend::new(RedisConfig::default())?;
/// backend.set("key", "\"value\"".to_string(), Duration::from_millis(1500)).await?;
/// let value = backend.get("key").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisBackend {
    pool: Pool,
}

impl RedisBackend {
    /// Create new Redis backend from configuration.
    ///
    /// # Errors
    /// Returns `Err` if connection pool creation fails
    pub fn new(config: RedisConfig) -> Result<Self> {
        let mut pool_config = Config::from_url(config.url.clone());
        pool_config.pool = Some(PoolConfig::new(config.pool_size));

        let pool = pool_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| Error::ConfigError(format!("Failed to create connection pool: {}", e)))?;

        info!(
            "✓ Redis backend initialized for {} (pool size: {})",
            config.url, config.pool_size
        );

        Ok(RedisBackend { pool })
    }

    /// Create from a connection URL directly.
    ///
    /// Pool size is taken from `REDIS_POOL_SIZE` when set.
    ///
    /// # Errors
    /// Returns `Err` if connection pool creation fails
    pub fn from_url(url: impl Into<String>) -> Result<Self> {
        let pool_size = std::env::var("REDIS_POOL_SIZE")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(DEFAULT_POOL_SIZE);

        Self::new(RedisConfig {
            url: url.into(),
            pool_size,
        })
    }

    async fn connection(&self) -> Result<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| Error::BackendError(format!("Failed to get Redis connection: {}", e)))
    }
}

/// `PX` argument for a ttl. Zero is rejected by redis, so it becomes 1;
/// ttls beyond `u64` saturate.
fn px_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection().await?;

        let value: Option<String> = cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::BackendError(format!("Redis GET failed for key {}: {}", key, e)))?;

        debug!(
            "✓ Redis GET {} -> {}",
            key,
            if value.is_some() { "HIT" } else { "MISS" }
        );
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let mut conn = self.connection().await?;

        let millis = px_millis(ttl);

        let _: () = cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(millis)
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::BackendError(format!("Redis SET failed for key {}: {}", key, e)))?;

        debug!("✓ Redis SET {} (PX {})", key, millis);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<u64> {
        let mut conn = self.connection().await?;

        let removed: u64 = cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::BackendError(format!("Redis DEL failed for key {}: {}", key, e)))?;

        debug!("✓ Redis DEL {} ({} removed)", key, removed);
        Ok(removed)
    }

    async fn health_check(&self) -> Result<bool> {
        let mut conn = match self.pool.get().await {
            Ok(conn) => conn,
            Err(_) => return Ok(false),
        };

        let pong: std::result::Result<String, _> = cmd("PING").query_async(&mut conn).await;
        Ok(matches!(pong, Ok(reply) if reply == "PONG"))
    }
}
