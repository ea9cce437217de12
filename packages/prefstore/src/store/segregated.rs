//! Composite [`PersistentPrefStore`] that segregates keys between two
//! backing stores.
//!
//! [`SegregatedPrefStore`] routes every operation to one of two
//! independently owned stores according to a fixed selection set
//! ([`SelectionPolicy`]), lazily migrating values whose keys left the set,
//! and synthesizes the two stores' read errors, initialization progress,
//! and read-only flags into one coherent view. It implements the same
//! store capability it consumes, so any holder of a plain store handle
//! can be given the composite instead.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use super::aggregator::AggregatingObserver;
use super::observer_list::ObserverList;
use super::pref_store::{
    InitCallback, MutableValue, PersistentPrefStore, PrefReadError, PrefStore, PrefStoreObserver,
    ReadErrorDelegate,
};
use super::selection::SelectionPolicy;
use crate::value::Value;

/// Composite persistent preference store over a default and a selected
/// backing store.
///
/// Reads resolve to the store that currently holds the key; writes
/// resolve to the store that should hold it, migrating stale residents of
/// the selected store back to the default store first. Change
/// notifications from either store are re-emitted unchanged to this
/// store's own observers, and the two initialization completions are
/// collapsed into one.
///
/// Combined state follows the backing stores live:
/// initialization-complete and read-only are the boolean OR of the two
/// stores' flags, and the read error follows
/// [`PrefReadError::combine`].
pub struct SegregatedPrefStore {
    default_store: Arc<dyn PersistentPrefStore>,
    selected_store: Arc<dyn PersistentPrefStore>,
    selection: SelectionPolicy,
    observers: ObserverList<dyn PrefStoreObserver>,
    on_initialization: Mutex<Option<InitCallback>>,
    read_error_delegate: Mutex<Option<ReadErrorDelegate>>,
    aggregator: Arc<AggregatingObserver>,
}

impl SegregatedPrefStore {
    /// Creates a composite store routing `selected_keys` to
    /// `selected_store` and every other key to `default_store`.
    ///
    /// `on_initialization`, if supplied, runs exactly once, after both
    /// backing stores have reported initialization and before this
    /// store's observers are notified.
    ///
    /// The composite subscribes to both backing stores before returning;
    /// dropping it detaches again. The backing store handles are shared —
    /// they may outlive the composite and may be held elsewhere.
    #[must_use]
    pub fn new(
        default_store: Arc<dyn PersistentPrefStore>,
        selected_store: Arc<dyn PersistentPrefStore>,
        selected_keys: HashSet<String>,
        on_initialization: Option<InitCallback>,
    ) -> Arc<Self> {
        let store = Arc::new_cyclic(|weak| Self {
            default_store,
            selected_store,
            selection: SelectionPolicy::new(selected_keys),
            observers: ObserverList::new(),
            on_initialization: Mutex::new(on_initialization),
            read_error_delegate: Mutex::new(None),
            aggregator: Arc::new(AggregatingObserver::new(weak.clone())),
        });
        let aggregator = store.aggregator.clone() as Arc<dyn PrefStoreObserver>;
        store.default_store.add_observer(&aggregator);
        store.selected_store.add_observer(&aggregator);
        store
    }

    fn store_for_read(&self, key: &str) -> &dyn PersistentPrefStore {
        self.selection.resolve_for_read(
            key,
            self.default_store.as_ref(),
            self.selected_store.as_ref(),
        )
    }

    fn store_for_write(&self, key: &str) -> &dyn PersistentPrefStore {
        self.selection.resolve_for_write(
            key,
            self.default_store.as_ref(),
            self.selected_store.as_ref(),
        )
    }

    /// Re-emits a sub-store's change notification as this store's own.
    pub(crate) fn forward_pref_value_changed(&self, key: &str) {
        self.observers
            .notify(|observer| observer.on_pref_value_changed(key));
    }

    /// Runs once when the second sub-store completes initialization:
    /// one-shot callback, then the pending read-error delegate, then the
    /// observers.
    pub(crate) fn complete_initialization(&self, succeeded: bool) {
        // Bind before invoking: the slot guards must not be held while
        // user code runs, which may re-enter this store.
        let callback = self.on_initialization.lock().take();
        if let Some(callback) = callback {
            callback();
        }
        let delegate = self.read_error_delegate.lock().take();
        if let Some(delegate) = delegate {
            delegate(self.get_read_error());
        }
        self.observers
            .notify(|observer| observer.on_initialization_completed(succeeded));
    }
}

impl PrefStore for SegregatedPrefStore {
    fn add_observer(&self, observer: &Arc<dyn PrefStoreObserver>) {
        self.observers.add(observer);
    }

    fn remove_observer(&self, observer: &Arc<dyn PrefStoreObserver>) {
        self.observers.remove(observer);
    }

    fn has_observers(&self) -> bool {
        self.observers.has_observers()
    }

    fn is_initialization_complete(&self) -> bool {
        self.default_store.is_initialization_complete()
            || self.selected_store.is_initialization_complete()
    }

    fn get_value(&self, key: &str) -> Option<Value> {
        self.store_for_read(key).get_value(key)
    }
}

impl PersistentPrefStore for SegregatedPrefStore {
    fn set_value(&self, key: &str, value: Value) {
        self.store_for_write(key).set_value(key, value);
    }

    fn set_value_silently(&self, key: &str, value: Value) {
        self.store_for_write(key).set_value_silently(key, value);
    }

    fn remove_value(&self, key: &str) -> bool {
        self.store_for_write(key).remove_value(key)
    }

    fn get_mutable_value(&self, key: &str) -> Option<MutableValue<'_>> {
        self.store_for_write(key).get_mutable_value(key)
    }

    fn report_value_changed(&self, key: &str) {
        self.store_for_write(key).report_value_changed(key);
    }

    fn read_only(&self) -> bool {
        self.default_store.read_only() || self.selected_store.read_only()
    }

    fn get_read_error(&self) -> PrefReadError {
        PrefReadError::combine(
            self.default_store.get_read_error(),
            self.selected_store.get_read_error(),
        )
    }

    fn read_prefs(&self) -> PrefReadError {
        // Fixed order: default first, then selected.
        let default_error = self.default_store.read_prefs();
        let selected_error = self.selected_store.read_prefs();
        PrefReadError::combine(default_error, selected_error)
    }

    fn read_prefs_async(&self, delegate: Option<ReadErrorDelegate>) {
        *self.read_error_delegate.lock() = delegate;
        self.default_store.read_prefs_async(None);
        self.selected_store.read_prefs_async(None);
        // When both stores finished in an earlier read, their completions
        // above were absorbed by the barrier; deliver directly. The slot
        // guard is dropped before the delegate runs.
        if self.aggregator.is_barrier_complete() {
            let delegate = self.read_error_delegate.lock().take();
            if let Some(delegate) = delegate {
                delegate(self.get_read_error());
            }
        }
    }

    fn commit_pending_write(&self) {
        self.default_store.commit_pending_write();
        self.selected_store.commit_pending_write();
    }
}

impl Drop for SegregatedPrefStore {
    fn drop(&mut self) {
        // Detach from both backing stores before the handles go away; a
        // store that outlives the composite must not notify into it.
        let aggregator = self.aggregator.clone() as Arc<dyn PrefStoreObserver>;
        self.default_store.remove_observer(&aggregator);
        self.selected_store.remove_observer(&aggregator);
    }
}
