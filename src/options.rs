//! Per-binding configuration
//!
//! Every field is optional; an absent field means the default behavior
//! for that concern (JSON encoding, JSON decoding, persistent storage).

use std::fmt;
use std::rc::Rc;

use crate::backend::StorageType;
use crate::error::CodecError;

/// Custom value → string conversion
pub type SerializeFn<T> = Rc<dyn Fn(&T) -> Result<String, CodecError>>;
/// Custom string → value conversion
pub type DeserializeFn<T> = Rc<dyn Fn(&str) -> Result<T, CodecError>>;

/// Options accepted by [`crate::use_storage`]
pub struct StorageOptions<T> {
    pub serializer: Option<SerializeFn<T>>,
    pub deserializer: Option<DeserializeFn<T>>,
    pub storage_type: Option<StorageType>,
}

impl<T> Default for StorageOptions<T> {
    fn default() -> Self {
        Self {
            serializer: None,
            deserializer: None,
            storage_type: None,
        }
    }
}

impl<T> Clone for StorageOptions<T> {
    fn clone(&self) -> Self {
        Self {
            serializer: self.serializer.clone(),
            deserializer: self.deserializer.clone(),
            storage_type: self.storage_type,
        }
    }
}

impl<T> StorageOptions<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serializer(mut self, f: impl Fn(&T) -> Result<String, CodecError> + 'static) -> Self {
        self.serializer = Some(Rc::new(f));
        self
    }

    pub fn deserializer(mut self, f: impl Fn(&str) -> Result<T, CodecError> + 'static) -> Self {
        self.deserializer = Some(Rc::new(f));
        self
    }

    pub fn storage_type(mut self, storage_type: StorageType) -> Self {
        self.storage_type = Some(storage_type);
        self
    }

    /// Select the area by tag (`"session"` or `"local"`); unknown tags mean local
    pub fn storage_tag(self, tag: &str) -> Self {
        self.storage_type(StorageType::from_tag(Some(tag)))
    }

    /// The area this binding uses
    pub fn selected_storage(&self) -> StorageType {
        self.storage_type.unwrap_or_default()
    }
}

impl<T> fmt::Debug for StorageOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageOptions")
            .field("serializer", &self.serializer.is_some())
            .field("deserializer", &self.deserializer.is_some())
            .field("storage_type", &self.storage_type)
            .finish()
    }
}
