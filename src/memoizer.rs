//! Memoizer factory - turns functions into memoized handles.

use crate::backend::CacheBackend;
use crate::error::{Error, Result};
use crate::hooks;
use crate::key::{FunctionInfo, KeyDeriver, KeyRule};
use crate::memoized::{Memoized, MemoizedInner};
use crate::observability::{CacheMetrics, NoOpMetrics};
use crate::options::{MemoizeOptions, WrapOptions};
use futures::future::FutureExt;
use std::future::Future;
use std::sync::Arc;

/// Factory holding the global defaults.
///
/// The factory never mutates its options; every `wrap` resolves a fresh,
/// independent configuration for one function.
///
/// # Example
///
/// ```
/// use memo_kit::{backend::InMemoryBackend, Error, MemoizeOptions, Memoizer};
///
/// async fn square(n: u64) -> Result<Option<u64>, Error> {
///     Ok(Some(n * n))
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> memo_kit::Result<()> {
/// let memoizer = Memoizer::new(
///     MemoizeOptions::new()
///         .with_client(InMemoryBackend::new())
///         .with_prefix("math:"),
/// );
///
/// // 60 second ttl, key "math:square"
/// let square = memoizer.wrap(square, 60_000_u64)?;
/// assert_eq!(square.call(4).await?, Some(16));
/// # Ok(())
/// # }
/// ```
pub struct Memoizer<B> {
    defaults: MemoizeOptions<B>,
}

impl<B: CacheBackend> Memoizer<B> {
    pub fn new(defaults: MemoizeOptions<B>) -> Self {
        Memoizer { defaults }
    }

    /// Global defaults this factory merges under every wrap.
    pub fn defaults(&self) -> &MemoizeOptions<B> {
        &self.defaults
    }

    /// Wrap `f` into a memoized handle.
    ///
    /// `options` overrides the global defaults field by field; pass a bare
    /// `u64` for a ttl-only override in milliseconds, or
    /// `WrapOptions::default()` to take every default.
    ///
    /// # Errors
    ///
    /// Validation happens here, before any call:
    /// - `Error::MissingDependency`: no backend client after merging
    /// - `Error::ConfigError`: empty key rule (a closure with no name or
    ///   key counts as empty), missing ttl, or zero ttl
    pub fn wrap<A, T, E, F, Fut>(
        &self,
        f: F,
        options: impl Into<WrapOptions<B, A>>,
    ) -> Result<Memoized<B, A, T, E>>
    where
        A: Send + Sync + 'static,
        T: Send + 'static,
        E: Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Option<T>, E>> + Send + 'static,
    {
        let options = options.into();
        let defaults = &self.defaults;

        let name = options.name.unwrap_or_else(|| FunctionInfo::of::<F>().name);
        let function = FunctionInfo::new(name);

        let backend = options
            .client
            .or_else(|| defaults.client.clone())
            .ok_or_else(|| {
                Error::MissingDependency(format!(
                    "no backend client configured for {:?}",
                    function.name
                ))
            })?;

        let prefix = options
            .prefix
            .or_else(|| defaults.prefix.clone())
            .unwrap_or_default();

        let rule = options
            .key
            .or_else(|| defaults.key.clone().map(|rule| rule.typed()))
            .unwrap_or_else(|| KeyRule::Fixed(function.name.clone()));
        if !rule.is_valid() {
            return Err(Error::ConfigError(
                "key must be a non-empty string or a key function; \
                 closures need an explicit key or name"
                    .to_string(),
            ));
        }

        let ttl = options.ttl.or(defaults.ttl).ok_or_else(|| {
            Error::ConfigError(format!("no ttl configured for {:?}", function.name))
        })?;
        if ttl.is_zero() {
            return Err(Error::ConfigError(
                "ttl must be greater than zero".to_string(),
            ));
        }

        let read = options
            .read
            .or_else(|| defaults.read.clone())
            .unwrap_or_else(|| hooks::default_read(Arc::clone(&backend)));
        let write = options
            .write
            .or_else(|| defaults.write.clone())
            .unwrap_or_else(|| hooks::default_write(Arc::clone(&backend)));
        let metrics: Arc<dyn CacheMetrics> = options
            .metrics
            .or_else(|| defaults.metrics.clone())
            .unwrap_or_else(|| Arc::new(NoOpMetrics) as Arc<dyn CacheMetrics>);

        info!(
            "✓ Memoized {:?} (prefix: {:?}, key: {:?}, ttl: {:?})",
            function.name, prefix, rule, ttl
        );

        Ok(Memoized::from_inner(MemoizedInner {
            target: Box::new(move |args: A| f(args).boxed()),
            keys: KeyDeriver {
                prefix,
                rule,
                function,
            },
            backend,
            ttl,
            read,
            write,
            metrics,
        }))
    }
}

impl<B: CacheBackend> Default for Memoizer<B> {
    fn default() -> Self {
        Self::new(MemoizeOptions::default())
    }
}

impl<B> Clone for Memoizer<B> {
    fn clone(&self) -> Self {
        Memoizer {
            defaults: self.defaults.clone(),
        }
    }
}
