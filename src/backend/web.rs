//! Browser `sessionStorage`/`localStorage` areas

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use super::{StorageArea, StorageEvent, StorageListener, StorageType, Subscription};
use crate::error::{Result, StorageError};

/// Handle to one of the window's storage areas.
///
/// The underlying `web_sys::Storage` is looked up on every call, so creating
/// the handle never fails.
#[derive(Debug, Clone, Copy)]
pub struct WebStorage {
    storage_type: StorageType,
}

impl WebStorage {
    pub fn new(storage_type: StorageType) -> Self {
        Self { storage_type }
    }

    fn area(&self) -> Result<web_sys::Storage> {
        let window = web_sys::window()
            .ok_or_else(|| StorageError::Unavailable("no window".to_string()))?;
        let storage = match self.storage_type {
            StorageType::Session => window.session_storage(),
            StorageType::Local => window.local_storage(),
        };
        storage
            .map_err(|e| StorageError::Unavailable(format!("{:?}", e)))?
            .ok_or_else(|| StorageError::Unavailable(format!("{} storage disabled", self.storage_type)))
    }

    /// Whether a window `storage` event was raised by this area
    fn owns(&self, event: &web_sys::StorageEvent) -> bool {
        match (event.storage_area(), self.area()) {
            (Some(theirs), Ok(ours)) => js_sys::Object::is(theirs.as_ref(), ours.as_ref()),
            _ => false,
        }
    }
}

impl StorageArea for WebStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.area()?
            .get_item(key)
            .map_err(|e| StorageError::Unavailable(format!("{:?}", e)))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.area()?
            .set_item(key, value)
            .map_err(|e| StorageError::Write {
                key: key.to_string(),
                reason: format!("{:?}", e),
            })
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.area()?
            .remove_item(key)
            .map_err(|e| StorageError::Write {
                key: key.to_string(),
                reason: format!("{:?}", e),
            })
    }

    fn subscribe(&self, listener: StorageListener) -> Subscription {
        let Some(window) = web_sys::window() else {
            log::warn!("No window, {} storage changes will not be observed", self.storage_type);
            return Subscription::empty();
        };

        let this = *self;
        let closure = Closure::<dyn FnMut(_)>::new(move |event: web_sys::StorageEvent| {
            if !this.owns(&event) {
                return;
            }
            let event = StorageEvent {
                key: event.key(),
                old_value: event.old_value(),
                new_value: event.new_value(),
            };
            if let Err(e) = listener(&event) {
                log::error!("storage listener failed for {:?}: {}", event.key, e);
            }
        });

        if let Err(e) =
            window.add_event_listener_with_callback("storage", closure.as_ref().unchecked_ref())
        {
            log::warn!("Could not listen for storage events: {:?}", e);
            return Subscription::empty();
        }

        Subscription::new(move || {
            let _ = window
                .remove_event_listener_with_callback("storage", closure.as_ref().unchecked_ref());
        })
    }
}
