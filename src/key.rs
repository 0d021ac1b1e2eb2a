//! Cache key derivation.
//!
//! A [`KeyRule`] turns call arguments into a [`CacheKey`]. Derivation is a
//! pure function of the arguments and the wrap-time configuration, so every
//! operation on a handle addresses the same key for the same arguments.

use crate::error::Result;
use futures::future::{self, BoxFuture, FutureExt};
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Outcome of key derivation.
///
/// `Skip` means "do not touch the store for this call". It is unrelated to a
/// missing value, which is always `Option::None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Key(String),
    Skip,
}

impl CacheKey {
    pub fn key(key: impl Into<String>) -> Self {
        CacheKey::Key(key.into())
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, CacheKey::Skip)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CacheKey::Key(key) => Some(key),
            CacheKey::Skip => None,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Key(key) => f.write_str(key),
            CacheKey::Skip => f.write_str("<skip>"),
        }
    }
}

impl From<String> for CacheKey {
    fn from(key: String) -> Self {
        CacheKey::Key(key)
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        CacheKey::Key(key.to_string())
    }
}

impl<K: Into<CacheKey>> From<Option<K>> for CacheKey {
    /// `None` skips the cache.
    fn from(key: Option<K>) -> Self {
        key.map(Into::into).unwrap_or(CacheKey::Skip)
    }
}

/// Identity of the wrapped function, handed to key functions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionInfo {
    pub name: String,
}

impl FunctionInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Identity of a function type.
    ///
    /// `fn` items are named after the last segment of their path. Closures,
    /// fn pointers, references and boxed or shared callables have no
    /// declared name and get an empty one.
    pub fn of<F>() -> Self {
        Self::new(declared_name(std::any::type_name::<F>()))
    }
}

/// Smart pointers whose type name would otherwise pass for a fn item.
const WRAPPER_TYPES: &[&str] = &[
    "alloc::boxed::Box",
    "alloc::sync::Arc",
    "alloc::rc::Rc",
    "core::pin::Pin",
    "std::boxed::Box",
    "std::sync::Arc",
    "std::rc::Rc",
    "std::pin::Pin",
];

fn declared_name(type_name: &str) -> &str {
    let anonymous = type_name.contains("{{closure}}")
        || type_name.contains("dyn ")
        || type_name.starts_with("fn(")
        || type_name.starts_with("unsafe ")
        || type_name.starts_with("extern ")
        || type_name.starts_with(&['&', '*', '(', '['][..]);
    if anonymous {
        return "";
    }

    let path = type_name.split('<').next().unwrap_or(type_name);
    if WRAPPER_TYPES.contains(&path) {
        return "";
    }
    path.rsplit("::").next().unwrap_or(path)
}

/// Arguments as seen by a key function shared across differently typed
/// functions.
pub type AnyArgs = dyn Any + Send + Sync;

/// Boxed key function over arguments of type `A`.
pub type KeyFn<A> =
    Arc<dyn Fn(&FunctionInfo, &A) -> BoxFuture<'static, Result<CacheKey>> + Send + Sync>;

/// How a handle derives its key from call arguments.
///
/// Factory-level rules use `KeyRule<AnyArgs>` and receive arguments as
/// `&dyn Any`; per-function rules are typed on the function's arguments.
pub enum KeyRule<A: ?Sized> {
    Fixed(String),
    Function(KeyFn<A>),
}

impl<A: ?Sized> Clone for KeyRule<A> {
    fn clone(&self) -> Self {
        match self {
            KeyRule::Fixed(key) => KeyRule::Fixed(key.clone()),
            KeyRule::Function(f) => KeyRule::Function(Arc::clone(f)),
        }
    }
}

impl<A: ?Sized> fmt::Debug for KeyRule<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyRule::Fixed(key) => f.debug_tuple("Fixed").field(key).finish(),
            KeyRule::Function(_) => f.write_str("Function(..)"),
        }
    }
}

impl<A: ?Sized + 'static> KeyRule<A> {
    pub fn fixed(key: impl Into<String>) -> Self {
        KeyRule::Fixed(key.into())
    }

    /// Synchronous key function.
    ///
    /// ```
    /// use memo_kit::{CacheKey, KeyRule};
    ///
    /// let rule: KeyRule<u32> = KeyRule::from_fn(|_, n: &u32| {
    ///     if *n >= 4 { CacheKey::Skip } else { CacheKey::key(format!("k:{}", n)) }
    /// });
    /// ```
    pub fn from_fn<F, K>(f: F) -> Self
    where
        F: Fn(&FunctionInfo, &A) -> K + Send + Sync + 'static,
        K: Into<CacheKey>,
    {
        KeyRule::Function(Arc::new(
            move |info: &FunctionInfo, args: &A| -> BoxFuture<'static, Result<CacheKey>> {
                future::ready(Ok(f(info, args).into())).boxed()
            },
        ))
    }

    /// Key function that may fail with a key contract error.
    pub fn try_from_fn<F>(f: F) -> Self
    where
        F: Fn(&FunctionInfo, &A) -> Result<CacheKey> + Send + Sync + 'static,
    {
        KeyRule::Function(Arc::new(
            move |info: &FunctionInfo, args: &A| -> BoxFuture<'static, Result<CacheKey>> {
                future::ready(f(info, args)).boxed()
            },
        ))
    }

    /// Asynchronous key function. The returned future must own what it
    /// needs from the arguments.
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(&FunctionInfo, &A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<CacheKey>> + Send + 'static,
    {
        KeyRule::Function(Arc::new(
            move |info: &FunctionInfo, args: &A| -> BoxFuture<'static, Result<CacheKey>> {
                f(info, args).boxed()
            },
        ))
    }

    pub(crate) fn is_valid(&self) -> bool {
        match self {
            KeyRule::Fixed(key) => !key.is_empty(),
            KeyRule::Function(_) => true,
        }
    }
}

impl KeyRule<AnyArgs> {
    /// Specialize a factory-level rule to arguments of type `A`.
    pub(crate) fn typed<A>(self) -> KeyRule<A>
    where
        A: Send + Sync + 'static,
    {
        match self {
            KeyRule::Fixed(key) => KeyRule::Fixed(key),
            KeyRule::Function(f) => {
                KeyRule::Function(Arc::new(
                    move |info: &FunctionInfo, args: &A| -> BoxFuture<'static, Result<CacheKey>> {
                        f(info, args as &AnyArgs)
                    },
                ))
            }
        }
    }
}

impl<A: ?Sized> From<&str> for KeyRule<A> {
    fn from(key: &str) -> Self {
        KeyRule::Fixed(key.to_string())
    }
}

impl<A: ?Sized> From<String> for KeyRule<A> {
    fn from(key: String) -> Self {
        KeyRule::Fixed(key)
    }
}

/// Resolved key derivation for one wrapped function.
pub(crate) struct KeyDeriver<A> {
    pub(crate) prefix: String,
    pub(crate) rule: KeyRule<A>,
    pub(crate) function: FunctionInfo,
}

impl<A> KeyDeriver<A> {
    /// Derive the key for `args`, computed fresh on every call.
    pub(crate) async fn derive(&self, args: &A) -> Result<CacheKey> {
        let key = match &self.rule {
            KeyRule::Fixed(key) => CacheKey::Key(format!("{}{}", self.prefix, key)),
            KeyRule::Function(f) => match f(&self.function, args).await? {
                CacheKey::Key(key) => CacheKey::Key(format!("{}{}", self.prefix, key)),
                CacheKey::Skip => CacheKey::Skip,
            },
        };

        debug!("» Derived key {} for {}", key, self.display_name());
        Ok(key)
    }

    fn display_name(&self) -> &str {
        if self.function.name.is_empty() {
            "<anonymous>"
        } else {
            &self.function.name
        }
    }
}
