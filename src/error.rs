//! Error types shared by the codec, backends and cells

use thiserror::Error;

/// Error type returned by caller-supplied serializer/deserializer functions
pub type CodecError = Box<dyn std::error::Error>;

/// Everything that can go wrong while reading, writing or converting a value
#[derive(Debug, Error)]
pub enum StorageError {
    /// Default JSON encoding could not represent the value
    #[error("could not encode value as JSON: {0}")]
    Encode(#[from] serde_json::Error),

    /// A custom serializer returned an error
    #[error("custom serializer failed: {0}")]
    Serializer(String),

    /// A custom deserializer returned an error
    #[error("custom deserializer failed: {0}")]
    Deserializer(String),

    /// The storage area could not be reached (no window, storage disabled)
    #[error("storage area unavailable: {0}")]
    Unavailable(String),

    /// The storage area rejected a write (e.g. quota exceeded)
    #[error("failed to write key `{key}`: {reason}")]
    Write { key: String, reason: String },
}

pub type Result<T> = std::result::Result<T, StorageError>;
