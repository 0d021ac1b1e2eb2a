//! In-memory backend with per-entry expiry.

use super::CacheBackend;
use crate::error::Result;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Clone, Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// Process-local backend backed by a concurrent map.
///
/// Expired entries are evicted lazily on access. Clones share storage, so a
/// test can hand one clone to the memoizer and inspect another.
///
/// # Example
///
/// ```
/// # use memo_kit::backend::{CacheBackend, InMemoryBackend};
/// # use std::time::Duration;
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> memo_kit::Result<()> {
/// let backend = InMemoryBackend::new();
/// backend.set("greeting", "\"hello\"".to_string(), Duration::from_secs(60)).await?;
/// assert_eq!(backend.get("greeting").await?.as_deref(), Some("\"hello\""));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    store: Arc<DashMap<String, Entry>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.store.retain(|_, entry| entry.expires_at > now);
        self.store.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remaining time to live for `key`, if present.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.store
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.expires_at - now)
    }

    /// Store raw text without going through the memoizer, e.g. to seed
    /// corrupted entries in tests.
    pub fn insert_raw(&self, key: &str, value: &str, ttl: Duration) {
        self.store.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
    }
}

impl CacheBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        let hit = match self.store.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => None,
            None => return Ok(None),
        };

        if hit.is_none() {
            self.store.remove_if(key, |_, entry| entry.expires_at <= now);
            debug!("InMemory GET {} -> EXPIRED", key);
        }
        Ok(hit)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        self.store.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        debug!("✓ InMemory SET {} (TTL: {:?})", key, ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<u64> {
        let now = Instant::now();
        let removed = match self.store.remove(key) {
            Some((_, entry)) if entry.expires_at > now => 1,
            _ => 0,
        };
        debug!("✓ InMemory DELETE {} ({} removed)", key, removed);
        Ok(removed)
    }
}
