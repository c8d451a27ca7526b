//! In-memory storage area for native builds and tests

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use super::{StorageArea, StorageEvent, StorageListener, Subscription};
use crate::error::Result;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, StorageListener)>,
}

/// A storage area held in a `HashMap`.
///
/// Local writes (`set_item`, `remove_item`) are silent, like a browser tab
/// writing its own storage. Writes from another execution context are
/// modelled with [`MemoryStorage::apply_remote`], which also notifies
/// listeners.
#[derive(Default)]
pub struct MemoryStorage {
    items: RefCell<HashMap<String, String>>,
    listeners: Rc<RefCell<Listeners>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().entries.len()
    }

    /// Drop every entry without notifying anyone
    pub fn clear(&self) {
        self.items.borrow_mut().clear();
    }

    /// Apply a write made by another execution context and dispatch the
    /// matching change notification. `None` removes the key.
    ///
    /// Returns the first error raised by a listener; every listener still
    /// runs.
    pub fn apply_remote(&self, key: &str, value: Option<&str>) -> Result<()> {
        let old_value = {
            let mut items = self.items.borrow_mut();
            match value {
                Some(v) => items.insert(key.to_string(), v.to_string()),
                None => items.remove(key),
            }
        };

        self.dispatch(&StorageEvent {
            key: Some(key.to_string()),
            old_value,
            new_value: value.map(str::to_string),
        })
    }

    /// Clear the area on behalf of another execution context
    pub fn clear_remote(&self) -> Result<()> {
        self.clear();
        self.dispatch(&StorageEvent::default())
    }

    fn dispatch(&self, event: &StorageEvent) -> Result<()> {
        // Snapshot so listeners may subscribe or unsubscribe while running
        let listeners: Vec<StorageListener> = self
            .listeners
            .borrow()
            .entries
            .iter()
            .map(|(_, l)| l.clone())
            .collect();

        let mut first_err = None;
        for listener in listeners {
            if let Err(e) = listener(event) {
                log::error!("storage listener failed for {:?}: {}", event.key, e);
                first_err.get_or_insert(e);
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl StorageArea for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.borrow().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.items
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.items.borrow_mut().remove(key);
        Ok(())
    }

    fn subscribe(&self, listener: StorageListener) -> Subscription {
        let id = {
            let mut listeners = self.listeners.borrow_mut();
            let id = listeners.next_id;
            listeners.next_id += 1;
            listeners.entries.push((id, listener));
            id
        };

        let weak: Weak<RefCell<Listeners>> = Rc::downgrade(&self.listeners);
        Subscription::new(move || {
            if let Some(listeners) = weak.upgrade() {
                listeners.borrow_mut().entries.retain(|(i, _)| *i != id);
            }
        })
    }
}

impl fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStorage")
            .field("items", &self.items.borrow())
            .field("listeners", &self.listener_count())
            .finish()
    }
}
