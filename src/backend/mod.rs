//! Storage backends
//!
//! Two key/value areas exist per execution context:
//! - Session: cleared when the browsing session ends
//! - Local: persistent, scoped to the origin
//!
//! On the web they are `sessionStorage`/`localStorage` and change
//! notifications come from the window `storage` event. Native builds use
//! in-memory areas, one pair per thread.

pub mod memory;
#[cfg(target_arch = "wasm32")]
pub mod web;

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use memory::MemoryStorage;

/// Which storage area a binding reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    Session,
    #[default]
    Local,
}

impl StorageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageType::Session => "session",
            StorageType::Local => "local",
        }
    }

    /// Map a storage tag to its area. Anything other than `"session"`,
    /// including no tag at all, selects the persistent area.
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            Some("session") => StorageType::Session,
            _ => StorageType::Local,
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change notification for one storage area
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StorageEvent {
    /// Affected key, `None` when the whole area was cleared
    pub key: Option<String>,
    pub old_value: Option<String>,
    /// New stored value, `None` when the key was removed
    pub new_value: Option<String>,
}

/// Handler registered with [`StorageArea::subscribe`]
pub type StorageListener = Rc<dyn Fn(&StorageEvent) -> Result<()>>;

/// A string-keyed storage area with change notifications.
///
/// Writes made through an area are not reported back to listeners in the
/// same execution context; only writes from elsewhere are.
pub trait StorageArea {
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    fn remove_item(&self, key: &str) -> Result<()>;

    /// Register a listener until the returned guard is dropped
    fn subscribe(&self, listener: StorageListener) -> Subscription;
}

/// Listener registration guard. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A guard with nothing to release
    pub fn empty() -> Self {
        Self { cancel: None }
    }

    /// Keep the listener registered for the rest of the process
    pub fn forget(mut self) {
        self.cancel = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

#[cfg(not(target_arch = "wasm32"))]
thread_local! {
    static SESSION_AREA: Rc<MemoryStorage> = Rc::new(MemoryStorage::new());
    static LOCAL_AREA: Rc<MemoryStorage> = Rc::new(MemoryStorage::new());
}

/// The in-memory area backing `storage_type` on this thread
#[cfg(not(target_arch = "wasm32"))]
pub fn memory_area(storage_type: StorageType) -> Rc<MemoryStorage> {
    match storage_type {
        StorageType::Session => SESSION_AREA.with(Rc::clone),
        StorageType::Local => LOCAL_AREA.with(Rc::clone),
    }
}

/// Select the storage area for `storage_type`
#[cfg(not(target_arch = "wasm32"))]
pub fn storage_area(storage_type: StorageType) -> Rc<dyn StorageArea> {
    memory_area(storage_type)
}

/// Select the storage area for `storage_type`
#[cfg(target_arch = "wasm32")]
pub fn storage_area(storage_type: StorageType) -> Rc<dyn StorageArea> {
    Rc::new(web::WebStorage::new(storage_type))
}
