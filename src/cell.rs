//! Storage-backed state cell
//!
//! A cell owns a reactive value mirrored into one key of a storage area:
//! - Creation reads the key and adopts the decoded value, else the initial value
//! - `set` replaces the value, then encodes and writes it through
//! - Change notifications for the same key from other execution contexts
//!   replace the value with the decoded payload (initial value when the
//!   payload is missing or undecodable)
//!
//! Dropping the cell removes its storage listener. The stored entry itself
//! belongs to the area and outlives the cell.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::backend::{StorageArea, StorageEvent, Subscription, storage_area};
use crate::codec::Codec;
use crate::error::Result;
use crate::options::StorageOptions;

type Watcher<T> = Rc<dyn Fn(&T)>;

struct Shared<T> {
    key: String,
    initial: T,
    value: RefCell<T>,
    codec: Box<dyn Codec<T>>,
    area: Rc<dyn StorageArea>,
    watchers: RefCell<Vec<(u64, Watcher<T>)>>,
    next_watcher: Cell<u64>,
}

impl<T: Clone + 'static> Shared<T> {
    fn replace(&self, value: T) {
        *self.value.borrow_mut() = value;

        let snapshot = self.value.borrow().clone();
        let watchers: Vec<Watcher<T>> = self
            .watchers
            .borrow()
            .iter()
            .map(|(_, w)| w.clone())
            .collect();
        for watcher in watchers {
            watcher(&snapshot);
        }
    }

    fn decode_or_initial(&self, raw: Option<&str>) -> Result<T> {
        Ok(self
            .codec
            .decode(raw)?
            .unwrap_or_else(|| self.initial.clone()))
    }

    fn set(&self, value: T) -> Result<()> {
        self.replace(value);
        let encoded = self.codec.encode(&self.value.borrow())?;
        self.area.set_item(&self.key, &encoded)?;
        log::debug!("Stored `{}` ({} bytes)", self.key, encoded.len());
        Ok(())
    }

    fn on_storage_event(&self, event: &StorageEvent) -> Result<()> {
        if event.key.as_deref() != Some(self.key.as_str()) {
            return Ok(());
        }
        let next = self.decode_or_initial(event.new_value.as_deref())?;
        log::debug!("`{}` changed in another context", self.key);
        self.replace(next);
        Ok(())
    }
}

/// Reactive value synchronized with one storage key
pub struct StorageCell<T> {
    shared: Rc<Shared<T>>,
    _subscription: Subscription,
}

impl<T: Clone + 'static> StorageCell<T> {
    /// Bind `key` in `area` using an explicit codec.
    ///
    /// Fails only if the area cannot be read or a custom decoder rejects
    /// the stored value.
    pub fn bind(
        key: impl Into<String>,
        initial: T,
        codec: impl Codec<T> + 'static,
        area: Rc<dyn StorageArea>,
    ) -> Result<Self> {
        let key = key.into();
        let stored = area.get_item(&key)?;
        let value = match codec.decode(stored.as_deref())? {
            Some(value) => {
                log::debug!("Hydrated `{}` from storage", key);
                value
            }
            None => initial.clone(),
        };

        let shared = Rc::new(Shared {
            key,
            initial,
            value: RefCell::new(value),
            codec: Box::new(codec),
            area,
            watchers: RefCell::new(Vec::new()),
            next_watcher: Cell::new(0),
        });

        let weak = Rc::downgrade(&shared);
        let subscription = shared
            .area
            .subscribe(Rc::new(move |event: &StorageEvent| -> Result<()> {
                match weak.upgrade() {
                    Some(shared) => shared.on_storage_event(event),
                    None => Ok(()),
                }
            }));

        Ok(Self {
            shared,
            _subscription: subscription,
        })
    }

    pub fn key(&self) -> &str {
        &self.shared.key
    }

    /// Current value
    pub fn get(&self) -> T {
        self.shared.value.borrow().clone()
    }

    /// Borrow the current value without cloning
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.shared.value.borrow())
    }

    /// Replace the value and write it through to storage.
    ///
    /// The in-memory value is updated before encoding, so it holds `value`
    /// even when encoding or the write fails.
    pub fn set(&self, value: T) -> Result<()> {
        self.shared.set(value)
    }

    /// Re-read the key from storage, adopting the stored value or the
    /// initial value when nothing decodable is stored
    pub fn refresh(&self) -> Result<()> {
        let stored = self.shared.area.get_item(&self.shared.key)?;
        let next = self.shared.decode_or_initial(stored.as_deref())?;
        self.shared.replace(next);
        Ok(())
    }

    /// A detached handle that sets this cell's value
    pub fn setter(&self) -> Setter<T> {
        Setter {
            shared: self.shared.clone(),
        }
    }

    /// Current value plus setter
    pub fn pair(&self) -> (T, Setter<T>) {
        (self.get(), self.setter())
    }

    /// Call `f` with the new value after every change, until the returned
    /// guard is dropped
    pub fn watch(&self, f: impl Fn(&T) + 'static) -> Subscription {
        let id = self.shared.next_watcher.get();
        self.shared.next_watcher.set(id + 1);
        self.shared.watchers.borrow_mut().push((id, Rc::new(f)));

        let weak: Weak<Shared<T>> = Rc::downgrade(&self.shared);
        Subscription::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.watchers.borrow_mut().retain(|(i, _)| *i != id);
            }
        })
    }
}

impl<T: fmt::Debug> fmt::Debug for StorageCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageCell")
            .field("key", &self.shared.key)
            .field("value", &self.shared.value.borrow())
            .finish()
    }
}

/// Setter handle returned by [`StorageCell::setter`]
pub struct Setter<T> {
    shared: Rc<Shared<T>>,
}

impl<T: Clone + 'static> Setter<T> {
    pub fn set(&self, value: T) -> Result<()> {
        self.shared.set(value)
    }
}

impl<T> Clone for Setter<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> fmt::Debug for Setter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Setter").field("key", &self.shared.key).finish()
    }
}

/// Bind `key` in the area selected by `options` (local by default),
/// encoding with JSON unless the options override it.
///
/// ```no_run
/// use use_storage::{StorageOptions, use_storage};
///
/// let theme = use_storage("theme", "light".to_string(), None)?;
/// theme.set("dark".to_string())?;
///
/// let draft = use_storage(
///     "draft",
///     String::new(),
///     Some(StorageOptions::new().storage_tag("session")),
/// )?;
/// assert_eq!(draft.get(), "");
/// # Ok::<(), use_storage::StorageError>(())
/// ```
pub fn use_storage<T>(
    key: impl Into<String>,
    initial: T,
    options: Option<StorageOptions<T>>,
) -> Result<StorageCell<T>>
where
    T: Clone + Serialize + DeserializeOwned + 'static,
{
    let options = options.unwrap_or_default();
    let area = storage_area(options.selected_storage());
    StorageCell::bind(key, initial, options, area)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryStorage, StorageType, memory_area};
    use crate::codec::{JsonCodec, serialize};
    use crate::error::StorageError;
    use proptest::prelude::*;
    use std::collections::HashMap;

    const KEY: &str = "key";
    const INITIAL: &str = "initial value";
    const CHANGED: &str = "changed value";

    fn local() -> Rc<MemoryStorage> {
        memory_area(StorageType::Local)
    }

    fn session() -> Rc<MemoryStorage> {
        memory_area(StorageType::Session)
    }

    #[test]
    fn test_returns_initial_value() {
        let cell = use_storage(KEY, INITIAL.to_string(), None).unwrap();
        assert_eq!(cell.get(), INITIAL);
        assert_eq!(cell.key(), KEY);
    }

    #[test]
    fn test_empty_initial_value() {
        let cell = use_storage(KEY, String::new(), None).unwrap();
        assert_eq!(cell.get(), "");
    }

    #[test]
    fn test_set_updates_value_and_local_storage() {
        let cell = use_storage(KEY, INITIAL.to_string(), None).unwrap();
        cell.set(CHANGED.to_string()).unwrap();

        assert_eq!(cell.get(), CHANGED);
        assert_eq!(
            local().get_item(KEY).unwrap().as_deref(),
            Some("\"changed value\"")
        );
        assert_eq!(session().get_item(KEY).unwrap(), None);
    }

    #[test]
    fn test_session_storage_is_used_when_selected() {
        let options = StorageOptions::new().storage_type(StorageType::Session);
        let cell = use_storage(KEY, INITIAL.to_string(), Some(options)).unwrap();
        cell.set(CHANGED.to_string()).unwrap();

        assert_eq!(
            session().get_item(KEY).unwrap(),
            Some(serde_json::to_string(CHANGED).unwrap())
        );
        assert_eq!(local().get_item(KEY).unwrap(), None);
    }

    #[test]
    fn test_session_reads_ignore_local() {
        local().set_item(KEY, "\"from local\"").unwrap();
        let options = StorageOptions::new().storage_tag("session");
        let cell = use_storage(KEY, INITIAL.to_string(), Some(options)).unwrap();
        assert_eq!(cell.get(), INITIAL);
    }

    #[test]
    fn test_custom_codec_is_used() {
        fn encode(map: &HashMap<String, String>) -> String {
            let mut pairs: Vec<String> = map.iter().map(|(k, v)| format!("{k}={v}")).collect();
            pairs.sort();
            pairs.join(";")
        }

        let options = StorageOptions::new()
            .serializer(|map: &HashMap<String, String>| Ok(encode(map)))
            .deserializer(|raw| {
                Ok(raw
                    .split(';')
                    .filter_map(|pair| pair.split_once('='))
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect())
            });

        let initial = HashMap::from([("a".to_string(), "b".to_string())]);
        let changed = HashMap::from([("a".to_string(), "c".to_string())]);

        let cell = use_storage(KEY, initial, Some(options)).unwrap();
        cell.set(changed.clone()).unwrap();

        assert_eq!(local().get_item(KEY).unwrap().as_deref(), Some("a=c"));
        assert_ne!(
            local().get_item(KEY).unwrap(),
            Some(serde_json::to_string(&changed).unwrap())
        );

        // A fresh binding decodes with the same custom pair
        let options = StorageOptions::new().deserializer(|raw: &str| {
            Ok(raw
                .split_once('=')
                .map(|(k, v)| HashMap::from([(k.to_string(), v.to_string())]))
                .unwrap_or_default())
        });
        let other = use_storage(KEY, HashMap::new(), Some(options)).unwrap();
        assert_eq!(other.get(), changed);
    }

    #[test]
    fn test_hydrates_from_stored_value() {
        local().set_item(KEY, "\"stored\"").unwrap();
        let cell = use_storage(KEY, INITIAL.to_string(), None).unwrap();
        assert_eq!(cell.get(), "stored");
    }

    #[test]
    fn test_stored_zero_is_adopted() {
        local().set_item("count", "0").unwrap();
        let cell = use_storage("count", 5u32, None).unwrap();
        assert_eq!(cell.get(), 0);
    }

    #[test]
    fn test_undecodable_stored_value_falls_back_to_initial() {
        local().set_item(KEY, "not json").unwrap();
        let cell = use_storage(KEY, INITIAL.to_string(), None).unwrap();
        assert_eq!(cell.get(), INITIAL);
        // Nothing is written until the first set
        assert_eq!(local().get_item(KEY).unwrap().as_deref(), Some("not json"));
    }

    #[test]
    fn test_custom_decoder_failure_on_creation_propagates() {
        local().set_item(KEY, "x").unwrap();
        let options = StorageOptions::new().deserializer(|raw: &str| Ok(raw.parse::<u32>()?));
        let result = use_storage(KEY, 1u32, Some(options));
        assert!(matches!(result, Err(StorageError::Deserializer(_))));
    }

    #[test]
    fn test_encode_failure_propagates_after_state_update() {
        let cell = use_storage(KEY, HashMap::<Vec<u8>, u8>::new(), None).unwrap();
        let bad = HashMap::from([(vec![1u8], 1u8)]);

        let result = cell.set(bad.clone());
        assert!(matches!(result, Err(StorageError::Encode(_))));
        assert_eq!(cell.get(), bad);
        assert_eq!(local().get_item(KEY).unwrap(), None);
    }

    #[test]
    fn test_external_change_for_same_key_is_adopted() {
        let cell = use_storage(KEY, INITIAL.to_string(), None).unwrap();
        local().apply_remote(KEY, Some("\"from elsewhere\"")).unwrap();
        assert_eq!(cell.get(), "from elsewhere");
    }

    #[test]
    fn test_external_change_for_other_key_is_ignored() {
        let cell = use_storage(KEY, INITIAL.to_string(), None).unwrap();
        cell.set(CHANGED.to_string()).unwrap();

        local().apply_remote("other", Some("\"noise\"")).unwrap();
        local().clear_remote().unwrap();
        assert_eq!(cell.get(), CHANGED);
    }

    #[test]
    fn test_external_removal_reverts_to_initial() {
        let cell = use_storage(KEY, INITIAL.to_string(), None).unwrap();
        cell.set(CHANGED.to_string()).unwrap();

        local().apply_remote(KEY, None).unwrap();
        assert_eq!(cell.get(), INITIAL);
    }

    #[test]
    fn test_external_garbage_reverts_to_initial() {
        let cell = use_storage(KEY, INITIAL.to_string(), None).unwrap();
        cell.set(CHANGED.to_string()).unwrap();

        local().apply_remote(KEY, Some("{broken")).unwrap();
        assert_eq!(cell.get(), INITIAL);
    }

    #[test]
    fn test_external_change_in_other_area_is_ignored() {
        let cell = use_storage(KEY, INITIAL.to_string(), None).unwrap();
        session().apply_remote(KEY, Some("\"session value\"")).unwrap();
        assert_eq!(cell.get(), INITIAL);
    }

    #[test]
    fn test_custom_decoder_failure_on_notification_propagates() {
        let options = StorageOptions::new().deserializer(|raw: &str| Ok(raw.parse::<u32>()?));
        let cell = use_storage(KEY, 1u32, Some(options)).unwrap();
        cell.set(2).unwrap();

        let result = local().apply_remote(KEY, Some("x"));
        assert!(matches!(result, Err(StorageError::Deserializer(_))));
        assert_eq!(cell.get(), 2);
    }

    #[test]
    fn test_cells_on_same_key_sync_through_notifications() {
        let a = use_storage(KEY, INITIAL.to_string(), None).unwrap();
        let b = use_storage(KEY, INITIAL.to_string(), None).unwrap();

        // Same-context writes are not broadcast
        a.set(CHANGED.to_string()).unwrap();
        assert_eq!(b.get(), INITIAL);

        // `b` catches up on its next read of storage
        b.refresh().unwrap();
        assert_eq!(b.get(), CHANGED);

        local().apply_remote(KEY, Some("\"remote\"")).unwrap();
        assert_eq!(a.get(), "remote");
        assert_eq!(b.get(), "remote");
    }

    #[test]
    fn test_refresh_without_stored_value_reverts_to_initial() {
        let cell = use_storage(KEY, INITIAL.to_string(), None).unwrap();
        cell.set(CHANGED.to_string()).unwrap();
        local().remove_item(KEY).unwrap();

        cell.refresh().unwrap();
        assert_eq!(cell.get(), INITIAL);
    }

    #[test]
    fn test_dropping_cell_unsubscribes() {
        let cell = use_storage(KEY, INITIAL.to_string(), None).unwrap();
        assert_eq!(local().listener_count(), 1);

        drop(cell);
        assert_eq!(local().listener_count(), 0);
        local().apply_remote(KEY, Some("\"after drop\"")).unwrap();
    }

    #[test]
    fn test_setter_outlives_cell() {
        let cell = use_storage(KEY, INITIAL.to_string(), None).unwrap();
        let (value, setter) = cell.pair();
        assert_eq!(value, INITIAL);

        setter.set(CHANGED.to_string()).unwrap();
        assert_eq!(cell.get(), CHANGED);

        drop(cell);
        setter.clone().set("later".to_string()).unwrap();
        assert_eq!(local().get_item(KEY).unwrap().as_deref(), Some("\"later\""));
    }

    #[test]
    fn test_watchers_see_every_change() {
        let cell = use_storage(KEY, 0i32, None).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let guard = {
            let seen = seen.clone();
            cell.watch(move |v| seen.borrow_mut().push(*v))
        };

        cell.set(1).unwrap();
        local().apply_remote(KEY, Some("2")).unwrap();
        local().apply_remote(KEY, None).unwrap();
        drop(guard);
        cell.set(3).unwrap();

        assert_eq!(*seen.borrow(), vec![1, 2, 0]);
        assert_eq!(cell.with(|v| *v), 3);
    }

    #[test]
    fn test_watcher_may_read_the_cell() {
        let cell = Rc::new(use_storage(KEY, 0i32, None).unwrap());
        let seen = Rc::new(Cell::new(-1));
        let _guard = {
            let weak = Rc::downgrade(&cell);
            let seen = seen.clone();
            cell.watch(move |_| {
                if let Some(cell) = weak.upgrade() {
                    seen.set(cell.get());
                }
            })
        };

        cell.set(9).unwrap();
        assert_eq!(seen.get(), 9);
    }

    #[test]
    fn test_bind_with_explicit_area() {
        let area = Rc::new(MemoryStorage::new());
        area.set_item("n", "41").unwrap();

        let cell = StorageCell::bind("n", 0u64, JsonCodec, area.clone()).unwrap();
        assert_eq!(cell.get(), 41);

        cell.set(42).unwrap();
        assert_eq!(area.get_item("n").unwrap().as_deref(), Some("42"));
        assert_eq!(local().get_item("n").unwrap(), None);
    }

    proptest! {
        #[test]
        fn test_read_after_write(values in prop::collection::vec(any::<(String, i32)>(), 1..6)) {
            let area = Rc::new(MemoryStorage::new());
            let cell = StorageCell::bind("k", (String::new(), 0), JsonCodec, area.clone()).unwrap();

            for value in values {
                cell.set(value.clone()).unwrap();
                prop_assert_eq!(cell.get(), value.clone());
                prop_assert_eq!(
                    area.get_item("k").unwrap(),
                    Some(serialize(&value, None).unwrap())
                );
            }
        }
    }
}
