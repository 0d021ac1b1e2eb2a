//! Error types for memoization operations.

use std::fmt;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the memoizer, its hooks and its backends.
///
/// Configuration problems ([`Error::ConfigError`], [`Error::MissingDependency`])
/// are reported synchronously by `wrap`. Everything else surfaces at call time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Invalid options: empty key rule, zero ttl, malformed environment value.
    ConfigError(String),

    /// A required collaborator (the backend client) was never supplied.
    MissingDependency(String),

    /// A key function could not produce a usable key.
    KeyContract(String),

    /// The backend failed to read, write or delete.
    BackendError(String),

    /// A value could not be encoded for storage.
    SerializationError(String),

    /// Stored text could not be decoded back into a value.
    DeserializationError(String),
}

impl Error {
    /// Shorthand for key functions that need to reject their arguments.
    pub fn key_contract(msg: impl Into<String>) -> Self {
        Error::KeyContract(msg.into())
    }

    /// True for errors that `wrap` raises before any call is made.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::ConfigError(_) | Error::MissingDependency(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            Error::MissingDependency(msg) => write!(f, "Missing dependency: {}", msg),
            Error::KeyContract(msg) => write!(f, "Key contract violation: {}", msg),
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Error::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        if e.is_data() || e.is_syntax() || e.is_eof() {
            Error::DeserializationError(e.to_string())
        } else {
            Error::SerializationError(e.to_string())
        }
    }
}
