//! Text encoding of stored values.
//!
//! Values cross the hook boundary as [`serde_json::Value`] and reach the
//! backend as JSON text. JSON `null` is a value like any other; the absence
//! of a value is `Option::None` and is never encoded.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Encode a stored value as backend text.
pub fn encode(value: &Value) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::SerializationError(e.to_string()))
}

/// Decode backend text into a stored value.
pub fn decode(text: &str) -> Result<Value> {
    serde_json::from_str(text).map_err(|e| Error::DeserializationError(e.to_string()))
}

/// Convert a typed result into a stored value.
pub fn to_stored<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| Error::SerializationError(e.to_string()))
}

/// Convert a stored value back into the handle's result type.
pub fn from_stored<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| Error::DeserializationError(e.to_string()))
}
