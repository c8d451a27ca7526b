//! use-storage - reactive state mirrored into browser storage
//!
//! Core modules:
//! - `cell`: Storage-backed state cell and the `use_storage` entry point
//! - `backend`: Session/local storage areas and change notifications
//! - `codec`: Value ⇄ string conversion (JSON or caller-supplied)
//! - `options`: Per-binding configuration
//! - `error`: Error types

pub mod backend;
pub mod cell;
pub mod codec;
pub mod error;
pub mod options;

pub use backend::{
    MemoryStorage, StorageArea, StorageEvent, StorageType, Subscription, storage_area,
};
pub use cell::{Setter, StorageCell, use_storage};
pub use codec::{Codec, JsonCodec, deserialize, serialize};
pub use error::{CodecError, StorageError};
pub use options::StorageOptions;

#[cfg(not(target_arch = "wasm32"))]
pub use backend::memory_area;
