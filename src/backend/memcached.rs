//! Memcached cache backend implementation.

use super::CacheBackend;
use crate::error::{Error, Result};
use async_memcached::AsciiProtocol;
use deadpool_memcached::{Manager, Pool};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Default Memcached connection pool size.
/// Override with MEMCACHED_POOL_SIZE environment variable
const DEFAULT_POOL_SIZE: u32 = 16;

/// Configuration for Memcached backend.
#[derive(Clone, Debug)]
pub struct MemcachedConfig {
    pub servers: Vec<String>, // e.g., ["localhost:11211", "cache2:11211"]
    pub connection_timeout: Duration,
    pub pool_size: u32,
}

impl Default for MemcachedConfig {
    fn default() -> Self {
        MemcachedConfig {
            servers: vec!["localhost:11211".to_string()],
            connection_timeout: Duration::from_secs(5),
            pool_size: 10,
        }
    }
}

/// Memcached backend with connection pooling.
///
/// Memcached expiry has whole-second precision, so millisecond ttls are
/// rounded up: a 1500ms ttl lives for 2 seconds, never for less than asked.
#[derive(Clone)]
pub struct MemcachedBackend {
    pool: Pool,
}

impl MemcachedBackend {
    /// Create new Memcached backend from configuration.
    ///
    /// # Errors
    /// Returns `Err` if no server is configured or pool creation fails
    pub async fn new(config: MemcachedConfig) -> Result<Self> {
        // deadpool-memcached Manager takes a single server address
        let addr = config
            .servers
            .first()
            .ok_or_else(|| Error::ConfigError("No memcached servers specified".to_string()))?
            .clone();

        let manager = Manager::new(addr.clone());

        let pool = Pool::builder(manager)
            .max_size(config.pool_size as usize)
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to create connection pool: {}", e)))?;

        info!(
            "✓ Memcached backend initialized with server: {} (pool size: {})",
            addr, config.pool_size
        );

        Ok(MemcachedBackend { pool })
    }

    /// Create from server address directly.
    ///
    /// Pool size is taken from `MEMCACHED_POOL_SIZE` when set.
    ///
    /// # Errors
    /// Returns `Err` if connection pool creation fails
    pub async fn from_server(addr: String) -> Result<Self> {
        let pool_size = std::env::var("MEMCACHED_POOL_SIZE")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_POOL_SIZE);

        let config = MemcachedConfig {
            servers: vec![addr],
            pool_size,
            ..Default::default()
        };
        Self::new(config).await
    }
}

/// Longest expiry memcached reads as relative seconds (30 days). Anything
/// above is taken as an absolute unix timestamp.
const MAX_RELATIVE_EXPIRATION: i64 = 60 * 60 * 24 * 30;

/// Memcached exptime for a ttl: whole seconds rounded up and never below
/// one, switching to an absolute timestamp past the 30 day threshold.
fn expiration_secs(ttl: Duration, now_unix_secs: i64) -> i64 {
    let secs = i64::try_from(ttl.as_millis().div_ceil(1000))
        .unwrap_or(i64::MAX)
        .max(1);

    if secs <= MAX_RELATIVE_EXPIRATION {
        secs
    } else {
        now_unix_secs.saturating_add(secs)
    }
}

fn now_unix_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

impl CacheBackend for MemcachedBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.pool.get().await.map_err(|e| {
            Error::BackendError(format!("Failed to get Memcached connection: {}", e))
        })?;

        match conn.get(key).await {
            Ok(Some(value)) => {
                debug!("✓ Memcached GET {} -> HIT", key);
                match value.data {
                    Some(bytes) => String::from_utf8(bytes).map(Some).map_err(|e| {
                        Error::DeserializationError(format!(
                            "Memcached value for key {} is not UTF-8: {}",
                            key, e
                        ))
                    }),
                    None => Ok(None),
                }
            }
            Ok(None) => {
                debug!("✓ Memcached GET {} -> MISS", key);
                Ok(None)
            }
            Err(e) => Err(Error::BackendError(format!(
                "Memcached GET failed for key {}: {}",
                key, e
            ))),
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let mut conn = self.pool.get().await.map_err(|e| {
            Error::BackendError(format!("Failed to get Memcached connection: {}", e))
        })?;

        let expiration = expiration_secs(ttl, now_unix_secs());

        // Correct parameter order: set(key, value, ttl, flags)
        conn.set(key, value.as_bytes(), Some(expiration), None)
            .await
            .map_err(|e| {
                Error::BackendError(format!("Memcached SET failed for key {}: {}", key, e))
            })?;

        debug!("✓ Memcached SET {} (TTL: {}s)", key, expiration);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<u64> {
        let mut conn = self.pool.get().await.map_err(|e| {
            Error::BackendError(format!("Failed to get Memcached connection: {}", e))
        })?;

        match conn.delete(key).await {
            Ok(()) => {
                debug!("✓ Memcached DELETE {}", key);
                Ok(1)
            }
            // memcached answers NOT_FOUND for absent keys
            Err(e) if e.to_string().to_lowercase().contains("not found") => Ok(0),
            Err(e) => Err(Error::BackendError(format!(
                "Memcached DELETE failed for key {}: {}",
                key, e
            ))),
        }
    }

    async fn health_check(&self) -> Result<bool> {
        match self.pool.get().await {
            Ok(mut conn) => Ok(conn.get("__health_check__").await.is_ok()),
            Err(_) => Ok(false),
        }
    }
}
