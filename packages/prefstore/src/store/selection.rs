//! Key routing policy between the default and the selected store.
//!
//! [`SelectionPolicy`] decides, per key, which of two backing stores is
//! authoritative, and lazily migrates values that linger in the selected
//! store after their key left the selection set.

use std::collections::HashSet;

use super::pref_store::PersistentPrefStore;

/// Fixed partition of the key space between two backing stores.
///
/// Keys in the selection set belong to the selected store; everything
/// else belongs to the default store. A key that was selected in an
/// earlier run may still be resident in the selected store: reads honor
/// that residency, writes move the value home first.
pub struct SelectionPolicy {
    selected_keys: HashSet<String>,
}

impl SelectionPolicy {
    /// Creates a policy routing `selected_keys` to the selected store.
    #[must_use]
    pub fn new(selected_keys: HashSet<String>) -> Self {
        Self { selected_keys }
    }

    /// Whether `key` belongs to the selected store.
    #[must_use]
    pub fn is_selected(&self, key: &str) -> bool {
        self.selected_keys.contains(key)
    }

    /// Resolves the store to read `key` from. Never mutates either store.
    ///
    /// The selected store wins when the key is selected or when it still
    /// holds a value for it (legacy residency).
    pub fn resolve_for_read<'a>(
        &self,
        key: &str,
        default_store: &'a dyn PersistentPrefStore,
        selected_store: &'a dyn PersistentPrefStore,
    ) -> &'a dyn PersistentPrefStore {
        if self.is_selected(key) || selected_store.get_value(key).is_some() {
            selected_store
        } else {
            default_store
        }
    }

    /// Resolves the store to write `key` to, migrating first if needed.
    ///
    /// When an unselected key is still resident in the selected store, its
    /// value is copied into the default store and removed from the
    /// selected store before the default store is returned. A failed
    /// removal is logged and tolerated; the stale copy is re-migrated on
    /// the next write.
    pub fn resolve_for_write<'a>(
        &self,
        key: &str,
        default_store: &'a dyn PersistentPrefStore,
        selected_store: &'a dyn PersistentPrefStore,
    ) -> &'a dyn PersistentPrefStore {
        if self.is_selected(key) {
            return selected_store;
        }
        if let Some(value) = selected_store.get_value(key) {
            default_store.set_value(key, value);
            if !selected_store.remove_value(key) {
                tracing::warn!(
                    key = %key,
                    "Stale value could not be removed from the selected store \
                     during migration; leaving duplicate for the next write"
                );
            }
        }
        default_store
    }
}

#[cfg(test)]
mod tests {
    use std::ptr;

    use super::super::memory::MemoryPrefStore;
    use super::super::pref_store::PrefStore;
    use super::*;
    use crate::value::Value;

    fn policy(keys: &[&str]) -> SelectionPolicy {
        SelectionPolicy::new(keys.iter().map(ToString::to_string).collect())
    }

    fn is_same_store(a: &dyn PersistentPrefStore, b: &dyn PersistentPrefStore) -> bool {
        ptr::addr_eq(ptr::from_ref(a), ptr::from_ref(b))
    }

    #[test]
    fn selected_key_resolves_to_selected_store() {
        let policy = policy(&["tracked"]);
        let default_store = MemoryPrefStore::new();
        let selected_store = MemoryPrefStore::new();

        let read = policy.resolve_for_read("tracked", &default_store, &selected_store);
        let write = policy.resolve_for_write("tracked", &default_store, &selected_store);

        assert!(is_same_store(read, &selected_store));
        assert!(is_same_store(write, &selected_store));
    }

    #[test]
    fn unselected_key_without_residency_resolves_to_default_store() {
        let policy = policy(&["tracked"]);
        let default_store = MemoryPrefStore::new();
        let selected_store = MemoryPrefStore::new();

        let read = policy.resolve_for_read("plain", &default_store, &selected_store);
        let write = policy.resolve_for_write("plain", &default_store, &selected_store);

        assert!(is_same_store(read, &default_store));
        assert!(is_same_store(write, &default_store));
    }

    #[test]
    fn read_resolution_honors_legacy_residency_without_mutating() {
        let policy = policy(&["tracked"]);
        let default_store = MemoryPrefStore::new();
        let selected_store = MemoryPrefStore::new();
        selected_store.set_value("legacy", Value::Int(1));

        let read = policy.resolve_for_read("legacy", &default_store, &selected_store);

        assert!(is_same_store(read, &selected_store));
        // Still resident where it was; read resolution never migrates.
        assert_eq!(selected_store.get_value("legacy"), Some(Value::Int(1)));
        assert_eq!(default_store.get_value("legacy"), None);
    }

    #[test]
    fn write_resolution_migrates_legacy_resident() {
        let policy = policy(&["tracked"]);
        let default_store = MemoryPrefStore::new();
        let selected_store = MemoryPrefStore::new();
        selected_store.set_value("legacy", Value::Int(1));

        let write = policy.resolve_for_write("legacy", &default_store, &selected_store);

        assert!(is_same_store(write, &default_store));
        assert_eq!(default_store.get_value("legacy"), Some(Value::Int(1)));
        assert_eq!(selected_store.get_value("legacy"), None);

        // A second resolution finds nothing left to migrate.
        let write = policy.resolve_for_write("legacy", &default_store, &selected_store);
        assert!(is_same_store(write, &default_store));
        assert_eq!(default_store.get_value("legacy"), Some(Value::Int(1)));
    }

    #[test]
    fn failed_removal_leaves_tolerated_duplicate() {
        let policy = policy(&["tracked"]);
        let default_store = MemoryPrefStore::new();
        let selected_store = MemoryPrefStore::new();
        selected_store.set_value("legacy", Value::Int(1));
        selected_store.set_read_only(true);

        let write = policy.resolve_for_write("legacy", &default_store, &selected_store);

        // The write still lands in the default store; the stale copy stays.
        assert!(is_same_store(write, &default_store));
        assert_eq!(default_store.get_value("legacy"), Some(Value::Int(1)));
        assert_eq!(selected_store.get_value("legacy"), Some(Value::Int(1)));

        // Once the selected store is writable again, the next write heals.
        selected_store.set_read_only(false);
        policy.resolve_for_write("legacy", &default_store, &selected_store);
        assert_eq!(selected_store.get_value("legacy"), None);
    }
}
