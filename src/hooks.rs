//! Read and write hooks.
//!
//! Hooks sit between a handle and its backend. The defaults degrade every
//! backend or decode failure to a miss (read) or a no-op (write) so a broken
//! cache never breaks the wrapped function. Custom hooks get no such
//! treatment: their errors reach the caller unchanged.

use crate::backend::CacheBackend;
use crate::error::Result;
use crate::serialization;
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Fetch the stored value for a key, `None` when absent.
pub type ReadHook = Arc<dyn Fn(String) -> BoxFuture<'static, Result<Option<Value>>> + Send + Sync>;

/// Persist a value under a key for the given ttl.
pub type WriteHook =
    Arc<dyn Fn(String, Value, Duration) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Build a custom read hook from an async function.
///
/// ```
/// use memo_kit::hooks;
/// use serde_json::json;
///
/// let read = hooks::read_hook(|key: String| async move {
///     Ok(Some(json!({ "from": key })))
/// });
/// ```
pub fn read_hook<F, Fut>(f: F) -> ReadHook
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<Value>>> + Send + 'static,
{
    Arc::new(move |key: String| f(key).boxed())
}

/// Build a custom write hook from an async function.
pub fn write_hook<F, Fut>(f: F) -> WriteHook
where
    F: Fn(String, Value, Duration) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |key: String, value: Value, ttl: Duration| f(key, value, ttl).boxed())
}

/// Default read: fetch text, decode it, and treat any failure as a miss.
pub fn default_read<B: CacheBackend>(backend: Arc<B>) -> ReadHook {
    Arc::new(move |key: String| -> BoxFuture<'static, Result<Option<Value>>> {
        let backend = Arc::clone(&backend);
        async move {
            let text = match backend.get(&key).await {
                Ok(Some(text)) => text,
                Ok(None) => return Ok(None),
                Err(e) => {
                    warn!("⚠ Cache read failed for {}, treating as miss: {}", key, e);
                    return Ok(None);
                }
            };

            match serialization::decode(&text) {
                Ok(value) => Ok(Some(value)),
                Err(e) => {
                    warn!("⚠ Discarding undecodable entry for {}: {}", key, e);
                    Ok(None)
                }
            }
        }
        .boxed()
    })
}

/// Default write: encode and store with the ttl, swallowing failures.
pub fn default_write<B: CacheBackend>(backend: Arc<B>) -> WriteHook {
    Arc::new(
        move |key: String, value: Value, ttl: Duration| -> BoxFuture<'static, Result<()>> {
            let backend = Arc::clone(&backend);
            async move {
                let text = match serialization::encode(&value) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("⚠ Skipping cache write for {}: {}", key, e);
                        return Ok(());
                    }
                };

                if let Err(e) = backend.set(&key, text, ttl).await {
                    warn!("⚠ Cache write failed for {}: {}", key, e);
                }
                Ok(())
            }
            .boxed()
        },
    )
}
