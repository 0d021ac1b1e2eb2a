//! Global and per-function configuration.
//!
//! [`MemoizeOptions`] holds the factory-wide defaults. [`WrapOptions`]
//! overrides them for one wrapped function, field by field. Nothing is
//! validated here; `Memoizer::wrap` validates the merged result.

use crate::error::{Error, Result};
use crate::hooks::{ReadHook, WriteHook};
use crate::key::{AnyArgs, KeyRule};
use crate::observability::CacheMetrics;
use std::sync::Arc;
use std::time::Duration;

/// Environment variable holding the global key prefix.
pub const ENV_PREFIX: &str = "MEMOIZE_PREFIX";

/// Environment variable holding the global ttl in milliseconds.
pub const ENV_TTL_MS: &str = "MEMOIZE_TTL_MS";

/// Factory-wide defaults.
///
/// # Example
///
/// ```
/// use memo_kit::{backend::InMemoryBackend, MemoizeOptions};
/// use std::time::Duration;
///
/// let options = MemoizeOptions::new()
///     .with_client(InMemoryBackend::new())
///     .with_prefix("app:")
///     .with_ttl(Duration::from_secs(30));
/// ```
pub struct MemoizeOptions<B> {
    pub(crate) client: Option<Arc<B>>,
    pub(crate) prefix: Option<String>,
    pub(crate) key: Option<KeyRule<AnyArgs>>,
    pub(crate) ttl: Option<Duration>,
    pub(crate) read: Option<ReadHook>,
    pub(crate) write: Option<WriteHook>,
    pub(crate) metrics: Option<Arc<dyn CacheMetrics>>,
}

impl<B> MemoizeOptions<B> {
    pub fn new() -> Self {
        MemoizeOptions {
            client: None,
            prefix: None,
            key: None,
            ttl: None,
            read: None,
            write: None,
            metrics: None,
        }
    }

    /// Defaults from `MEMOIZE_PREFIX` and `MEMOIZE_TTL_MS`.
    ///
    /// Unset variables leave the field empty.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if `MEMOIZE_TTL_MS` is not a whole number
    pub fn from_env() -> Result<Self> {
        let mut options = Self::new();

        if let Ok(prefix) = std::env::var(ENV_PREFIX) {
            options.prefix = Some(prefix);
        }

        if let Ok(raw) = std::env::var(ENV_TTL_MS) {
            let millis = raw.trim().parse::<u64>().map_err(|e| {
                Error::ConfigError(format!(
                    "{} must be milliseconds, got {:?}: {}",
                    ENV_TTL_MS, raw, e
                ))
            })?;
            options.ttl = Some(Duration::from_millis(millis));
        }

        debug!(
            "Loaded memoize options from environment (prefix: {:?}, ttl: {:?})",
            options.prefix, options.ttl
        );
        Ok(options)
    }

    pub fn with_client(self, client: B) -> Self {
        self.with_shared_client(Arc::new(client))
    }

    pub fn with_shared_client(mut self, client: Arc<B>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Default key rule for every wrapped function.
    pub fn with_key(mut self, key: impl Into<KeyRule<AnyArgs>>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_ttl_millis(self, millis: u64) -> Self {
        self.with_ttl(Duration::from_millis(millis))
    }

    pub fn with_read_hook(mut self, hook: ReadHook) -> Self {
        self.read = Some(hook);
        self
    }

    pub fn with_write_hook(mut self, hook: WriteHook) -> Self {
        self.write = Some(hook);
        self
    }

    pub fn with_metrics(mut self, metrics: impl CacheMetrics + 'static) -> Self {
        self.metrics = Some(Arc::new(metrics));
        self
    }
}

impl<B> Default for MemoizeOptions<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> Clone for MemoizeOptions<B> {
    fn clone(&self) -> Self {
        MemoizeOptions {
            client: self.client.clone(),
            prefix: self.prefix.clone(),
            key: self.key.clone(),
            ttl: self.ttl,
            read: self.read.clone(),
            write: self.write.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

/// Per-function overrides.
///
/// A bare number converts into ttl-only options, in milliseconds, so
/// `memoizer.wrap(f, 500_u64)` equals
/// `memoizer.wrap(f, WrapOptions::new().with_ttl_millis(500))`.
pub struct WrapOptions<B, A> {
    pub(crate) name: Option<String>,
    pub(crate) client: Option<Arc<B>>,
    pub(crate) prefix: Option<String>,
    pub(crate) key: Option<KeyRule<A>>,
    pub(crate) ttl: Option<Duration>,
    pub(crate) read: Option<ReadHook>,
    pub(crate) write: Option<WriteHook>,
    pub(crate) metrics: Option<Arc<dyn CacheMetrics>>,
}

impl<B, A> WrapOptions<B, A> {
    pub fn new() -> Self {
        WrapOptions {
            name: None,
            client: None,
            prefix: None,
            key: None,
            ttl: None,
            read: None,
            write: None,
            metrics: None,
        }
    }

    /// Name the function. Closures have no declared name, so they need
    /// either a name or a key rule.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_client(self, client: B) -> Self {
        self.with_shared_client(Arc::new(client))
    }

    pub fn with_shared_client(mut self, client: Arc<B>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_key(mut self, key: impl Into<KeyRule<A>>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_ttl_millis(self, millis: u64) -> Self {
        self.with_ttl(Duration::from_millis(millis))
    }

    pub fn with_read_hook(mut self, hook: ReadHook) -> Self {
        self.read = Some(hook);
        self
    }

    pub fn with_write_hook(mut self, hook: WriteHook) -> Self {
        self.write = Some(hook);
        self
    }

    pub fn with_metrics(mut self, metrics: impl CacheMetrics + 'static) -> Self {
        self.metrics = Some(Arc::new(metrics));
        self
    }
}

impl<B, A> Default for WrapOptions<B, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B, A> From<u64> for WrapOptions<B, A> {
    fn from(millis: u64) -> Self {
        WrapOptions::new().with_ttl_millis(millis)
    }
}

impl<B, A> From<Duration> for WrapOptions<B, A> {
    fn from(ttl: Duration) -> Self {
        WrapOptions::new().with_ttl(ttl)
    }
}
