//! # memo-kit
//!
//! Function-level result memoization over an expiring key-value store.
//!
//! ## Features
//!
//! - **Cache-or-compute:** Wrap any async function; repeated calls with
//!   equivalent arguments reuse the stored result until its ttl runs out
//! - **Key Rules:** Fixed keys or key functions of the call arguments, with
//!   an explicit [`CacheKey::Skip`] to bypass the cache per call
//! - **Escape Hatches:** `raw`, `get`, `set` and `clear` share the same key
//!   derivation as the memoized call
//! - **Backend Agnostic:** In-memory, Redis and Memcached backends, or any
//!   [`CacheBackend`] implementation
//! - **Fail Soft:** The default hooks turn store outages into cache misses;
//!   a broken cache never breaks the wrapped function
//!
//! ## Quick Start
//!
//! ```
//! use memo_kit::{
//!     backend::InMemoryBackend, CacheKey, Error, KeyRule, MemoizeOptions, Memoizer,
//!     WrapOptions,
//! };
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! async fn load_user(id: u64) -> Result<Option<User>, Error> {
//!     Ok(Some(User { id, name: format!("user-{}", id) }))
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> memo_kit::Result<()> {
//! // 1. Global defaults
//! let memoizer = Memoizer::new(
//!     MemoizeOptions::new()
//!         .with_client(InMemoryBackend::new())
//!         .with_prefix("app:")
//!         .with_ttl_millis(60_000),
//! );
//!
//! // 2. Wrap with a per-call key
//! let users = memoizer.wrap(
//!     load_user,
//!     WrapOptions::new().with_key(KeyRule::from_fn(|f, id: &u64| format!("{}:{}", f.name, id))),
//! )?;
//!
//! // 3. Call it
//! let user = users.call(7).await?;
//! assert_eq!(users.get(&7).await?, user);
//! assert_eq!(users.key(&7).await?, CacheKey::key("app:load_user:7"));
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate log;

pub mod backend;
pub mod error;
pub mod hooks;
pub mod key;
pub mod memoized;
pub mod memoizer;
pub mod observability;
pub mod options;
pub mod serialization;

// Re-exports for convenience
pub use backend::CacheBackend;
pub use error::{Error, Result};
pub use key::{CacheKey, FunctionInfo, KeyRule};
pub use memoized::Memoized;
pub use memoizer::Memoizer;
pub use observability::{CacheMetrics, NoOpMetrics};
pub use options::{MemoizeOptions, WrapOptions};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
