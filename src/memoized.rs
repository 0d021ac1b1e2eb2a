//! Memoized handle - the cache-or-compute protocol.

use crate::backend::CacheBackend;
use crate::error::{Error, Result};
use crate::hooks::{ReadHook, WriteHook};
use crate::key::{CacheKey, KeyDeriver};
use crate::observability::CacheMetrics;
use crate::serialization;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub(crate) type TargetFn<A, T, E> =
    Box<dyn Fn(A) -> BoxFuture<'static, std::result::Result<Option<T>, E>> + Send + Sync>;

pub(crate) struct MemoizedInner<B, A, T, E> {
    pub(crate) target: TargetFn<A, T, E>,
    pub(crate) keys: KeyDeriver<A>,
    pub(crate) backend: Arc<B>,
    pub(crate) ttl: Duration,
    pub(crate) read: ReadHook,
    pub(crate) write: WriteHook,
    pub(crate) metrics: Arc<dyn CacheMetrics>,
}

/// A wrapped function plus its cache operations.
///
/// Produced by [`Memoizer::wrap`](crate::Memoizer::wrap). The configuration
/// is fixed at wrap time; cloning shares it. Every operation derives the key
/// afresh from its arguments, so `get`, `set` and `clear` address the same
/// entry `call` does for equal arguments.
///
/// Concurrent misses on one key each invoke the function and each write;
/// the last write wins.
pub struct Memoized<B, A, T, E> {
    inner: Arc<MemoizedInner<B, A, T, E>>,
}

impl<B, A, T, E> Clone for Memoized<B, A, T, E> {
    fn clone(&self) -> Self {
        Memoized {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B, A, T, E> Memoized<B, A, T, E> {
    pub(crate) fn from_inner(inner: MemoizedInner<B, A, T, E>) -> Self {
        Memoized {
            inner: Arc::new(inner),
        }
    }

    /// Name of the wrapped function.
    pub fn name(&self) -> &str {
        &self.inner.keys.function.name
    }

    pub fn prefix(&self) -> &str {
        &self.inner.keys.prefix
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Derive the cache key `args` would use.
    pub async fn key(&self, args: &A) -> Result<CacheKey> {
        self.inner.keys.derive(args).await
    }

    /// Invoke the wrapped function directly. Never touches the store.
    pub async fn raw(&self, args: A) -> std::result::Result<Option<T>, E> {
        (self.inner.target)(args).await
    }
}

impl<B, A, T, E> Memoized<B, A, T, E>
where
    B: CacheBackend,
    T: Serialize + DeserializeOwned,
    E: From<Error>,
{
    /// Return the stored result for `args`, computing and storing it on a
    /// miss.
    ///
    /// A skipped key calls straight through. Errors from the wrapped
    /// function, the key rule and custom hooks reach the caller unchanged;
    /// the default hooks turn store failures into a miss.
    pub async fn call(&self, args: A) -> std::result::Result<Option<T>, E> {
        let timer = Instant::now();
        let inner = &self.inner;

        let key = match inner.keys.derive(&args).await {
            Ok(CacheKey::Key(key)) => key,
            Ok(CacheKey::Skip) => {
                debug!("Bypassing cache for {}", self.name());
                let result = self.raw(args).await;
                inner.metrics.record_skip(self.name(), timer.elapsed());
                return result;
            }
            Err(e) => {
                inner.metrics.record_error(self.name(), &e.to_string());
                return Err(e.into());
            }
        };

        match self.read_typed(&key).await {
            Ok(Some(value)) => {
                debug!("✓ Cache hit for {}", key);
                inner.metrics.record_hit(&key, timer.elapsed());
                return Ok(Some(value));
            }
            Ok(None) => debug!("✗ Cache miss for {}, invoking {}", key, self.name()),
            Err(e) => {
                inner.metrics.record_error(&key, &e.to_string());
                return Err(e.into());
            }
        }

        let result = match self.raw(args).await {
            Ok(result) => result,
            Err(e) => {
                inner.metrics.record_error(&key, "wrapped function failed");
                return Err(e);
            }
        };

        if let Some(value) = &result {
            match serialization::to_stored(value) {
                Ok(stored) => {
                    if let Err(e) = (inner.write)(key.clone(), stored, inner.ttl).await {
                        inner.metrics.record_error(&key, &e.to_string());
                        return Err(e.into());
                    }
                }
                Err(e) => warn!("⚠ Result for {} is not storable: {}", key, e),
            }
        }

        inner.metrics.record_miss(&key, timer.elapsed());
        debug!("Computed {} in {:?}", key, timer.elapsed());
        Ok(result)
    }

    /// Read the stored result for `args` without computing.
    ///
    /// Returns `None` for a skipped key or when nothing is stored.
    pub async fn get(&self, args: &A) -> std::result::Result<Option<T>, E> {
        match self.inner.keys.derive(args).await? {
            CacheKey::Key(key) => Ok(self.read_typed(&key).await?),
            CacheKey::Skip => Ok(None),
        }
    }

    /// Store `value` as the result for `args`.
    ///
    /// Returns `false` without touching the store when the key is skipped
    /// or `value` is `None`; absence is never stored.
    ///
    /// A value that cannot be represented as JSON fails with
    /// `Error::SerializationError`. `call` instead logs that case and returns
    /// the computed result without storing it.
    pub async fn set(
        &self,
        args: &A,
        value: impl Into<Option<T>>,
    ) -> std::result::Result<bool, E> {
        let key = match self.inner.keys.derive(args).await? {
            CacheKey::Key(key) => key,
            CacheKey::Skip => return Ok(false),
        };
        let value = match value.into() {
            Some(value) => value,
            None => return Ok(false),
        };

        let stored = serialization::to_stored(&value)?;
        (self.inner.write)(key, stored, self.inner.ttl).await?;
        Ok(true)
    }

    /// Delete the stored result for `args`.
    ///
    /// Returns the number of entries removed, or `None` for a skipped key.
    /// Backend errors are not swallowed here.
    pub async fn clear(&self, args: &A) -> std::result::Result<Option<u64>, E> {
        match self.inner.keys.derive(args).await? {
            CacheKey::Key(key) => {
                let removed = self.inner.backend.delete(&key).await?;
                debug!("✓ Cleared {} ({} removed)", key, removed);
                Ok(Some(removed))
            }
            CacheKey::Skip => Ok(None),
        }
    }

    /// Read through the hook and decode into `T`.
    ///
    /// A stored value of the wrong shape counts as a miss.
    async fn read_typed(&self, key: &str) -> Result<Option<T>> {
        let stored = match (self.inner.read)(key.to_string()).await? {
            Some(stored) => stored,
            None => return Ok(None),
        };

        match serialization::from_stored(stored) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!("⚠ Stored value for {} does not match the result type: {}", key, e);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::hooks;
    use crate::key::KeyRule;
    use crate::memoizer::Memoizer;
    use crate::options::{MemoizeOptions, WrapOptions};
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Account {
        id: u32,
        balance: i64,
    }

    fn memoizer(backend: &InMemoryBackend) -> Memoizer<InMemoryBackend> {
        Memoizer::new(
            MemoizeOptions::new()
                .with_client(backend.clone())
                .with_prefix("t:")
                .with_ttl_millis(1000),
        )
    }

    /// Wraps a counting closure; the counter tracks real invocations.
    fn counted(
        backend: &InMemoryBackend,
        options: WrapOptions<InMemoryBackend, u32>,
    ) -> (Memoized<InMemoryBackend, u32, Account, Error>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handle = memoizer(backend)
            .wrap(
                move |id: u32| {
                    let counter = Arc::clone(&counter);
                    async move {
                        let n = counter.fetch_add(1, Ordering::SeqCst) as i64;
                        Ok(Some(Account { id, balance: n }))
                    }
                },
                options,
            )
            .expect("wrap");
        (handle, calls)
    }

    fn by_id() -> KeyRule<u32> {
        KeyRule::from_fn(|_, id: &u32| format!("acct:{}", id))
    }

    #[tokio::test]
    async fn test_call_caches_result() {
        let backend = InMemoryBackend::new();
        let (handle, calls) = counted(&backend, WrapOptions::new().with_key(by_id()));

        let first = handle.call(1).await.expect("call");
        let second = handle.call(1).await.expect("call");

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(backend.ttl("t:acct:1").is_some());
    }

    #[tokio::test]
    async fn test_get_after_call_returns_same_value() {
        let backend = InMemoryBackend::new();
        let (handle, _) = counted(&backend, WrapOptions::new().with_key(by_id()));

        let computed = handle.call(3).await.expect("call");
        assert_eq!(handle.get(&3).await.expect("get"), computed);
        assert_eq!(handle.get(&4).await.expect("get"), None);
    }

    #[tokio::test]
    async fn test_set_then_call_skips_function() {
        let backend = InMemoryBackend::new();
        let (handle, calls) = counted(&backend, WrapOptions::new().with_key(by_id()));
        let seeded = Account { id: 5, balance: 99 };

        assert!(handle.set(&5, seeded.clone()).await.expect("set"));
        assert_eq!(handle.call(5).await.expect("call"), Some(seeded));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_set_none_is_noop() {
        let backend = InMemoryBackend::new();
        let (handle, _) = counted(&backend, WrapOptions::new().with_key(by_id()));

        assert!(!handle.set(&5, None).await.expect("set"));
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn test_clear_forces_recompute() {
        let backend = InMemoryBackend::new();
        let (handle, calls) = counted(&backend, WrapOptions::new().with_key(by_id()));

        handle.call(2).await.expect("call");
        assert_eq!(handle.clear(&2).await.expect("clear"), Some(1));
        assert_eq!(handle.clear(&2).await.expect("clear"), Some(0));

        handle.call(2).await.expect("call");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_skip_never_touches_store() {
        let backend = InMemoryBackend::new();
        let (handle, calls) = counted(
            &backend,
            WrapOptions::new().with_key(KeyRule::from_fn(|_, _: &u32| CacheKey::Skip)),
        );

        handle.call(1).await.expect("call");
        handle.call(1).await.expect("call");
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert_eq!(handle.get(&1).await.expect("get"), None);
        assert!(!handle.set(&1, Account { id: 1, balance: 0 }).await.expect("set"));
        assert_eq!(handle.clear(&1).await.expect("clear"), None);
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn test_raw_bypasses_cache() {
        let backend = InMemoryBackend::new();
        let (handle, calls) = counted(&backend, WrapOptions::new().with_key(by_id()));

        handle.call(1).await.expect("call");
        let raw = handle.raw(1).await.expect("raw");

        assert_eq!(raw, Some(Account { id: 1, balance: 1 }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_absent_result_is_not_stored() {
        let backend = InMemoryBackend::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handle = memoizer(&backend)
            .wrap(
                move |_: u32| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<Option<Account>, Error>(None) }
                },
                WrapOptions::new().with_name("lookup"),
            )
            .expect("wrap");

        assert_eq!(handle.call(1).await.expect("call"), None);
        assert_eq!(handle.call(1).await.expect("call"), None);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn test_null_is_a_storable_value() {
        let backend = InMemoryBackend::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handle = memoizer(&backend)
            .wrap(
                move |_: u32| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<Option<Option<u8>>, Error>(Some(None)) }
                },
                WrapOptions::new().with_name("nullable"),
            )
            .expect("wrap");

        assert_eq!(handle.call(1).await.expect("call"), Some(None));
        assert_eq!(handle.call(1).await.expect("call"), Some(None));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_malformed_entry_counts_as_miss() {
        let backend = InMemoryBackend::new();
        let (handle, calls) = counted(&backend, WrapOptions::new().with_key(by_id()));
        backend.insert_raw("t:acct:8", "{\"id\":", Duration::from_secs(5));

        assert_eq!(
            handle.call(8).await.expect("call"),
            Some(Account { id: 8, balance: 0 })
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_wrong_shape_counts_as_miss() {
        let backend = InMemoryBackend::new();
        let (handle, calls) = counted(&backend, WrapOptions::new().with_key(by_id()));
        backend.insert_raw("t:acct:8", "[1,2,3]", Duration::from_secs(5));

        handle.call(8).await.expect("call");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_target_error_propagates_and_nothing_is_stored() {
        let backend = InMemoryBackend::new();
        let handle = memoizer(&backend)
            .wrap(
                |_: u32| async {
                    Err::<Option<Account>, Error>(Error::BackendError("upstream down".into()))
                },
                WrapOptions::new().with_name("failing"),
            )
            .expect("wrap");

        assert_eq!(
            handle.call(1).await,
            Err(Error::BackendError("upstream down".into()))
        );
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn test_custom_read_hook_error_propagates() {
        let backend = InMemoryBackend::new();
        let read = hooks::read_hook(|_key: String| async {
            Err(Error::BackendError("custom read failed".into()))
        });
        let (handle, calls) =
            counted(&backend, WrapOptions::new().with_key(by_id()).with_read_hook(read));

        assert!(matches!(handle.call(1).await, Err(Error::BackendError(_))));
        assert!(matches!(handle.get(&1).await, Err(Error::BackendError(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_custom_hooks_receive_key_value_and_ttl() {
        let backend = InMemoryBackend::new();
        let writes = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&writes);
        let write = hooks::write_hook(move |key: String, value, ttl| {
            log.lock().expect("lock").push((key, value, ttl));
            async { Ok(()) }
        });
        let read = hooks::read_hook(|_key: String| async { Ok(None) });

        let (handle, _) = counted(
            &backend,
            WrapOptions::new()
                .with_key(by_id())
                .with_ttl_millis(250)
                .with_read_hook(read)
                .with_write_hook(write),
        );
        handle.call(4).await.expect("call");

        let writes = writes.lock().expect("lock");
        assert_eq!(
            *writes,
            vec![(
                "t:acct:4".to_string(),
                json!({"id": 4, "balance": 0}),
                Duration::from_millis(250)
            )]
        );
        assert!(backend.is_empty().await);
    }

    fn failing_write() -> WriteHook {
        hooks::write_hook(|_key: String, _value, _ttl| async {
            Err(Error::BackendError("custom write failed".into()))
        })
    }

    #[tokio::test]
    async fn test_custom_write_hook_error_propagates() {
        let backend = InMemoryBackend::new();
        let (handle, calls) = counted(
            &backend,
            WrapOptions::new()
                .with_key(by_id())
                .with_write_hook(failing_write()),
        );

        assert_eq!(
            handle.call(1).await,
            Err(Error::BackendError("custom write failed".into()))
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            handle.set(&1, Account { id: 1, balance: 5 }).await,
            Err(Error::BackendError(_))
        ));
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn test_factory_hooks_reach_wrapped_handles() {
        let backend = InMemoryBackend::new();
        let reads = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&reads);
        let read = hooks::read_hook(move |_key: String| {
            seen.fetch_add(1, Ordering::SeqCst);
            async { Ok(Some(json!({"id": 0, "balance": -1}))) }
        });
        let memoizer = Memoizer::new(
            MemoizeOptions::new()
                .with_client(backend.clone())
                .with_ttl_millis(1000)
                .with_read_hook(read)
                .with_write_hook(failing_write()),
        );
        let handle = memoizer
            .wrap(
                |id: u32| async move { Ok::<_, Error>(Some(Account { id, balance: 0 })) },
                WrapOptions::new().with_key(by_id()),
            )
            .expect("wrap");

        assert_eq!(
            handle.get(&3).await.expect("get"),
            Some(Account { id: 0, balance: -1 })
        );
        assert_eq!(reads.load(Ordering::SeqCst), 1);
        assert!(matches!(
            handle.set(&3, Account { id: 3, balance: 3 }).await,
            Err(Error::BackendError(_))
        ));
    }

    #[tokio::test]
    async fn test_per_function_hooks_override_factory_hooks() {
        let backend = InMemoryBackend::new();
        let factory_read = hooks::read_hook(|_key: String| async {
            Err(Error::BackendError("factory read used".into()))
        });
        let memoizer = Memoizer::new(
            MemoizeOptions::new()
                .with_client(backend.clone())
                .with_ttl_millis(1000)
                .with_read_hook(factory_read)
                .with_write_hook(failing_write()),
        );
        let handle = memoizer
            .wrap(
                |id: u32| async move { Ok::<_, Error>(Some(Account { id, balance: 7 })) },
                WrapOptions::new()
                    .with_key(by_id())
                    .with_read_hook(hooks::default_read(Arc::new(backend.clone())))
                    .with_write_hook(hooks::default_write(Arc::new(backend.clone()))),
            )
            .expect("wrap");

        assert_eq!(
            handle.call(2).await.expect("call"),
            Some(Account { id: 2, balance: 7 })
        );
        assert_eq!(
            handle.get(&2).await.expect("get"),
            Some(Account { id: 2, balance: 7 })
        );
        assert!(backend.ttl("acct:2").is_some());
    }

    #[tokio::test]
    async fn test_key_contract_error_reaches_every_operation() {
        let backend = InMemoryBackend::new();
        let rule = KeyRule::try_from_fn(|_, _: &u32| Err(Error::key_contract("no key")));
        let (handle, calls) = counted(&backend, WrapOptions::new().with_key(rule));

        assert!(matches!(handle.call(1).await, Err(Error::KeyContract(_))));
        assert!(matches!(handle.get(&1).await, Err(Error::KeyContract(_))));
        assert!(matches!(
            handle.set(&1, Account { id: 1, balance: 1 }).await,
            Err(Error::KeyContract(_))
        ));
        assert!(matches!(handle.clear(&1).await, Err(Error::KeyContract(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let backend = InMemoryBackend::new();
        let (handle, calls) = counted(
            &backend,
            WrapOptions::new().with_key(by_id()).with_ttl_millis(100),
        );

        handle.call(1).await.expect("call");
        tokio::time::advance(Duration::from_millis(150)).await;
        handle.call(1).await.expect("call");

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_metrics_record_hits_and_misses() {
        #[derive(Default)]
        struct Counts {
            hits: AtomicUsize,
            misses: AtomicUsize,
            skips: AtomicUsize,
        }

        #[derive(Clone, Default)]
        struct TestMetrics(Arc<Counts>);

        impl CacheMetrics for TestMetrics {
            fn record_hit(&self, _key: &str, _duration: Duration) {
                self.0.hits.fetch_add(1, Ordering::SeqCst);
            }

            fn record_miss(&self, _key: &str, _duration: Duration) {
                self.0.misses.fetch_add(1, Ordering::SeqCst);
            }

            fn record_skip(&self, _function: &str, _duration: Duration) {
                self.0.skips.fetch_add(1, Ordering::SeqCst);
            }
        }

        let metrics = TestMetrics::default();
        let backend = InMemoryBackend::new();
        let rule = KeyRule::from_fn(|_, id: &u32| (*id < 10).then(|| format!("acct:{}", id)));
        let (handle, _) = counted(
            &backend,
            WrapOptions::new().with_key(rule).with_metrics(metrics.clone()),
        );

        handle.call(1).await.expect("call");
        handle.call(1).await.expect("call");
        handle.call(11).await.expect("call");

        assert_eq!(metrics.0.misses.load(Ordering::SeqCst), 1);
        assert_eq!(metrics.0.hits.load(Ordering::SeqCst), 1);
        assert_eq!(metrics.0.skips.load(Ordering::SeqCst), 1);
    }
}
