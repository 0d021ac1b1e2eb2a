//! Backing store clients.
//!
//! A backend is the injected key-value client the memoizer talks to. It only
//! has to read text, write text with a millisecond expiry, and delete keys.
//! Connection pooling and transport retries belong to the backend.

use crate::error::Result;
use std::future::Future;
use std::time::Duration;

#[cfg(feature = "inmemory")]
mod inmemory;
#[cfg(feature = "memcached")]
mod memcached;
#[cfg(feature = "redis")]
mod redis;

#[cfg(feature = "inmemory")]
pub use inmemory::InMemoryBackend;
#[cfg(feature = "memcached")]
pub use memcached::{MemcachedBackend, MemcachedConfig};
#[cfg(feature = "redis")]
pub use self::redis::{RedisBackend, RedisConfig};

/// Capability contract of a backing store.
///
/// Implementations may use `async fn` directly.
pub trait CacheBackend: Send + Sync + 'static {
    /// Fetch the stored text for `key`, `None` when absent or expired.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Store `value` under `key`, expiring after `ttl`.
    fn set(&self, key: &str, value: String, ttl: Duration)
        -> impl Future<Output = Result<()>> + Send;

    /// Remove `key`, returning how many keys were removed.
    fn delete(&self, key: &str) -> impl Future<Output = Result<u64>> + Send;

    /// Check that the store is reachable.
    fn health_check(&self) -> impl Future<Output = Result<bool>> + Send {
        async { Ok(true) }
    }
}
