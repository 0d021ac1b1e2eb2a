//! Metrics hooks for memoized calls.

use std::time::Duration;

/// Receives the outcome of each memoized call.
///
/// Only the cache-or-compute path reports; `raw`, `get`, `set` and `clear`
/// are direct operations and stay silent. All methods default to no-ops.
pub trait CacheMetrics: Send + Sync {
    /// The stored value was returned without invoking the function.
    fn record_hit(&self, _key: &str, _duration: Duration) {}

    /// The function was invoked because nothing was stored.
    fn record_miss(&self, _key: &str, _duration: Duration) {}

    /// The key rule skipped the cache for this call.
    fn record_skip(&self, _function: &str, _duration: Duration) {}

    /// The call failed.
    fn record_error(&self, _key: &str, _error: &str) {}
}

/// Metrics sink that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpMetrics;

impl CacheMetrics for NoOpMetrics {}
