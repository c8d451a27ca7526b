//! Value ⇄ stored string conversion
//!
//! JSON is the default encoding. [`StorageOptions`] can override either
//! direction with caller-supplied functions.
//!
//! Failure handling is asymmetric:
//! - Encode errors always propagate
//! - Custom decode errors propagate
//! - Default (JSON) decode errors are logged and treated as "no value",
//!   so stale or foreign data falls back to the initial value

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Result, StorageError};
use crate::options::StorageOptions;

/// Conversion strategy between a value and its stored form
pub trait Codec<T> {
    fn encode(&self, value: &T) -> Result<String>;

    /// Decode a stored value. `None` in means nothing stored and yields
    /// `Ok(None)` without decoding.
    fn decode(&self, raw: Option<&str>) -> Result<Option<T>>;
}

/// Plain `serde_json` encoding
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl<T: Serialize + DeserializeOwned> Codec<T> for JsonCodec {
    fn encode(&self, value: &T) -> Result<String> {
        json_encode(value)
    }

    fn decode(&self, raw: Option<&str>) -> Result<Option<T>> {
        Ok(raw.and_then(json_decode))
    }
}

impl<T: Serialize + DeserializeOwned> Codec<T> for StorageOptions<T> {
    fn encode(&self, value: &T) -> Result<String> {
        serialize(value, Some(self))
    }

    fn decode(&self, raw: Option<&str>) -> Result<Option<T>> {
        deserialize(raw, Some(self))
    }
}

fn json_encode<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

fn json_decode<T: DeserializeOwned>(raw: &str) -> Option<T> {
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!(
                "Could not deserialize JSON value. You might need to provide a serializer/deserializer option. {}",
                e
            );
            None
        }
    }
}

/// Encode `value` with the custom serializer if one is set, else JSON
pub fn serialize<T: Serialize>(value: &T, options: Option<&StorageOptions<T>>) -> Result<String> {
    match options.and_then(|o| o.serializer.as_ref()) {
        Some(serializer) => serializer(value).map_err(|e| StorageError::Serializer(e.to_string())),
        None => json_encode(value),
    }
}

/// Decode a stored value with the custom deserializer if one is set, else JSON
pub fn deserialize<T: DeserializeOwned>(
    raw: Option<&str>,
    options: Option<&StorageOptions<T>>,
) -> Result<Option<T>> {
    let Some(raw) = raw else {
        return Ok(None);
    };

    match options.and_then(|o| o.deserializer.as_ref()) {
        Some(deserializer) => deserializer(raw)
            .map(Some)
            .map_err(|e| StorageError::Deserializer(e.to_string())),
        None => Ok(json_decode(raw)),
    }
}
