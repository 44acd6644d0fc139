//! JSON codec using `serde_json`.
//!
//! Messages are encoded as compact single-line JSON. The session layer
//! frames them with a trailing newline, so encoded output must never
//! contain a literal newline - `serde_json::to_string` guarantees this
//! (newlines inside strings are escaped).

use serde_json::Value;

use crate::error::Result;

/// JSON codec for wire messages.
pub struct JsonCodec;

impl JsonCodec {
    /// Encode a value to a compact JSON string.
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<String> {
        Ok(serde_json::to_string(value)?)
    }

    /// Decode JSON bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes cannot be deserialized to type T.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Convert a serializable value into a generic JSON tree.
    #[inline]
    pub fn to_value<T: serde::Serialize>(value: &T) -> Result<Value> {
        Ok(serde_json::to_value(value)?)
    }
}
