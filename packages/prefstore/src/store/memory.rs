//! In-memory [`PersistentPrefStore`] implementation.
//!
//! [`MemoryPrefStore`] keeps all preference values in a `BTreeMap` and
//! completes loads synchronously, or deferred on demand to exercise
//! asynchronous completion ordering. It is the concrete store embedders
//! reach for when no file-backed implementation is wired up, and the
//! backing store used throughout this crate's tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock, RwLockWriteGuard};

use super::observer_list::ObserverList;
use super::pref_store::{
    MutableValue, PersistentPrefStore, PrefReadError, PrefStore, PrefStoreObserver,
    ReadErrorDelegate,
};
use crate::value::Value;

/// Load and persistence state, separate from the value map so reads never
/// contend with state changes.
struct LoadState {
    init_complete: bool,
    read_error: PrefReadError,
    read_only: bool,
    pending_write: bool,
    block_async_read: bool,
    pending_delegate: Option<ReadErrorDelegate>,
    async_read_pending: bool,
}

/// In-memory preference store with controllable load behavior.
///
/// Mutations are rejected while [`read_only`](PrefStore) is set;
/// `remove_value` then returns `false`. Every accepted mutation marks a
/// pending write that [`commit_pending_write`](PersistentPrefStore::commit_pending_write)
/// clears.
///
/// Loads complete synchronously unless
/// [`set_block_async_read`](MemoryPrefStore::set_block_async_read) has
/// deferred them, which lets a caller decide the order in which several
/// stores finish their asynchronous reads.
pub struct MemoryPrefStore {
    values: RwLock<BTreeMap<String, Value>>,
    observers: ObserverList<dyn PrefStoreObserver>,
    state: Mutex<LoadState>,
}

impl MemoryPrefStore {
    /// Creates an empty store that loads cleanly.
    #[must_use]
    pub fn new() -> Self {
        Self {
            values: RwLock::new(BTreeMap::new()),
            observers: ObserverList::new(),
            state: Mutex::new(LoadState {
                init_complete: false,
                read_error: PrefReadError::None,
                read_only: false,
                pending_write: false,
                block_async_read: false,
                pending_delegate: None,
                async_read_pending: false,
            }),
        }
    }

    /// Sets the read error the next (or current) load reports.
    ///
    /// An `Other` error also makes the load count as failed.
    pub fn set_read_error(&self, error: PrefReadError) {
        self.state.lock().read_error = error;
    }

    /// Puts the store into or out of read-only mode.
    pub fn set_read_only(&self, read_only: bool) {
        self.state.lock().read_only = read_only;
    }

    /// Defers or releases asynchronous read completion.
    ///
    /// While blocked, `read_prefs_async` records the request and returns
    /// without completing. Unblocking completes any deferred read
    /// immediately.
    pub fn set_block_async_read(&self, block: bool) {
        let complete_now = {
            let mut state = self.state.lock();
            state.block_async_read = block;
            !block && state.async_read_pending
        };
        if complete_now {
            self.complete_read();
        }
    }

    /// Whether a mutation since the last commit is still unflushed.
    #[must_use]
    pub fn pending_write(&self) -> bool {
        self.state.lock().pending_write
    }

    /// Marks initialization complete and delivers the delegate and the
    /// observer notification outside the state lock.
    fn complete_read(&self) {
        let (error, succeeded, delegate) = {
            let mut state = self.state.lock();
            state.init_complete = true;
            state.async_read_pending = false;
            let error = state.read_error;
            (
                error,
                !matches!(error, PrefReadError::Other(_)),
                state.pending_delegate.take(),
            )
        };
        if let Some(delegate) = delegate {
            delegate(error);
        }
        self.observers
            .notify(|observer| observer.on_initialization_completed(succeeded));
    }

    /// Applies a mutation if the store is writable, marking the pending
    /// write. Returns `false` (and leaves everything untouched) in
    /// read-only mode.
    fn mutate(&self, apply: impl FnOnce(&mut BTreeMap<String, Value>) -> bool) -> bool {
        let mut state = self.state.lock();
        if state.read_only {
            return false;
        }
        let changed = apply(&mut self.values.write());
        if changed {
            state.pending_write = true;
        }
        changed
    }
}

impl Default for MemoryPrefStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PrefStore for MemoryPrefStore {
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
        self.state.lock().init_complete
    }

    fn get_value(&self, key: &str) -> Option<Value> {
        self.values.read().get(key).cloned()
    }
}

impl PersistentPrefStore for MemoryPrefStore {
    fn set_value(&self, key: &str, value: Value) {
        let changed = self.mutate(|values| {
            if values.get(key) == Some(&value) {
                return false;
            }
            values.insert(key.to_string(), value);
            true
        });
        if changed {
            self.observers
                .notify(|observer| observer.on_pref_value_changed(key));
        }
    }

    fn set_value_silently(&self, key: &str, value: Value) {
        self.mutate(|values| {
            values.insert(key.to_string(), value);
            true
        });
    }

    fn remove_value(&self, key: &str) -> bool {
        let removed = self.mutate(|values| values.remove(key).is_some());
        if removed {
            self.observers
                .notify(|observer| observer.on_pref_value_changed(key));
        }
        removed
    }

    fn get_mutable_value(&self, key: &str) -> Option<MutableValue<'_>> {
        if self.state.lock().read_only {
            return None;
        }
        let guard = self.values.write();
        RwLockWriteGuard::try_map(guard, |values| values.get_mut(key))
            .ok()
            .map(|mapped| Box::new(mapped) as MutableValue<'_>)
    }

    fn report_value_changed(&self, key: &str) {
        self.state.lock().pending_write = true;
        self.observers
            .notify(|observer| observer.on_pref_value_changed(key));
    }

    fn read_only(&self) -> bool {
        self.state.lock().read_only
    }

    fn get_read_error(&self) -> PrefReadError {
        self.state.lock().read_error
    }

    fn read_prefs(&self) -> PrefReadError {
        self.complete_read();
        self.state.lock().read_error
    }

    fn read_prefs_async(&self, delegate: Option<ReadErrorDelegate>) {
        let deferred = {
            let mut state = self.state.lock();
            if let Some(delegate) = delegate {
                state.pending_delegate = Some(delegate);
            }
            if state.block_async_read {
                state.async_read_pending = true;
                true
            } else {
                false
            }
        };
        if !deferred {
            self.complete_read();
        }
    }

    fn commit_pending_write(&self) {
        self.state.lock().pending_write = false;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Observer that records changed keys and completion flags.
    struct RecordingObserver {
        changed_keys: Mutex<Vec<String>>,
        completions: Mutex<Vec<bool>>,
    }

    impl RecordingObserver {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                changed_keys: Mutex::new(Vec::new()),
                completions: Mutex::new(Vec::new()),
            })
        }
    }

    impl PrefStoreObserver for RecordingObserver {
        fn on_pref_value_changed(&self, key: &str) {
            self.changed_keys.lock().push(key.to_string());
        }

        fn on_initialization_completed(&self, succeeded: bool) {
            self.completions.lock().push(succeeded);
        }
    }

    #[test]
    fn set_get_remove_round_trip() {
        let store = MemoryPrefStore::new();

        assert_eq!(store.get_value("theme"), None);

        store.set_value("theme", Value::from("dark"));
        assert_eq!(store.get_value("theme"), Some(Value::from("dark")));

        assert!(store.remove_value("theme"));
        assert_eq!(store.get_value("theme"), None);
        assert!(!store.remove_value("theme"));
    }

    #[test]
    fn set_value_notifies_only_on_change() {
        let store = MemoryPrefStore::new();
        let observer = RecordingObserver::new();
        store.add_observer(&(observer.clone() as Arc<dyn PrefStoreObserver>));

        store.set_value("a", Value::Int(1));
        store.set_value("a", Value::Int(1));
        store.set_value("a", Value::Int(2));

        assert_eq!(*observer.changed_keys.lock(), vec!["a", "a"]);
    }

    #[test]
    fn set_value_silently_suppresses_notification() {
        let store = MemoryPrefStore::new();
        let observer = RecordingObserver::new();
        store.add_observer(&(observer.clone() as Arc<dyn PrefStoreObserver>));

        store.set_value_silently("a", Value::Int(1));

        assert!(observer.changed_keys.lock().is_empty());
        assert_eq!(store.get_value("a"), Some(Value::Int(1)));
    }

    #[test]
    fn mutable_value_round_trip_with_report() {
        let store = MemoryPrefStore::new();
        let observer = RecordingObserver::new();
        store.add_observer(&(observer.clone() as Arc<dyn PrefStoreObserver>));

        store.set_value_silently("counter", Value::Int(1));
        {
            let mut handle = store.get_mutable_value("counter").expect("value exists");
            **handle = Value::Int(2);
        }
        store.report_value_changed("counter");

        assert_eq!(store.get_value("counter"), Some(Value::Int(2)));
        assert_eq!(*observer.changed_keys.lock(), vec!["counter"]);
    }

    #[test]
    fn get_mutable_value_absent_key_is_none() {
        let store = MemoryPrefStore::new();
        assert!(store.get_mutable_value("missing").is_none());
    }

    #[test]
    fn read_only_rejects_mutations() {
        let store = MemoryPrefStore::new();
        store.set_value("keep", Value::Bool(true));
        store.set_read_only(true);

        store.set_value("keep", Value::Bool(false));
        store.set_value_silently("new", Value::Int(1));
        assert!(!store.remove_value("keep"));
        assert!(store.get_mutable_value("keep").is_none());

        assert_eq!(store.get_value("keep"), Some(Value::Bool(true)));
        assert_eq!(store.get_value("new"), None);
    }

    #[test]
    fn read_prefs_completes_initialization() {
        let store = MemoryPrefStore::new();
        let observer = RecordingObserver::new();
        store.add_observer(&(observer.clone() as Arc<dyn PrefStoreObserver>));

        assert!(!store.is_initialization_complete());
        assert_eq!(store.read_prefs(), PrefReadError::None);
        assert!(store.is_initialization_complete());
        assert_eq!(*observer.completions.lock(), vec![true]);
    }

    #[test]
    fn read_prefs_reports_configured_error() {
        let store = MemoryPrefStore::new();
        let observer = RecordingObserver::new();
        store.add_observer(&(observer.clone() as Arc<dyn PrefStoreObserver>));

        store.set_read_error(PrefReadError::Other(9));
        assert_eq!(store.read_prefs(), PrefReadError::Other(9));
        assert_eq!(store.get_read_error(), PrefReadError::Other(9));
        // A hard error still completes initialization, unsuccessfully.
        assert!(store.is_initialization_complete());
        assert_eq!(*observer.completions.lock(), vec![false]);
    }

    #[test]
    fn no_file_counts_as_successful_initialization() {
        let store = MemoryPrefStore::new();
        let observer = RecordingObserver::new();
        store.add_observer(&(observer.clone() as Arc<dyn PrefStoreObserver>));

        store.set_read_error(PrefReadError::NoFile);
        assert_eq!(store.read_prefs(), PrefReadError::NoFile);
        assert_eq!(*observer.completions.lock(), vec![true]);
    }

    #[test]
    fn unblocked_async_read_completes_immediately() {
        let store = MemoryPrefStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        store.read_prefs_async(Some(Box::new(move |error| {
            assert_eq!(error, PrefReadError::None);
            calls_clone.fetch_add(1, Ordering::Relaxed);
        })));

        assert!(store.is_initialization_complete());
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn blocked_async_read_defers_until_unblocked() {
        let store = MemoryPrefStore::new();
        let observer = RecordingObserver::new();
        store.add_observer(&(observer.clone() as Arc<dyn PrefStoreObserver>));
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        store.set_block_async_read(true);
        store.read_prefs_async(Some(Box::new(move |_| {
            calls_clone.fetch_add(1, Ordering::Relaxed);
        })));

        assert!(!store.is_initialization_complete());
        assert_eq!(calls.load(Ordering::Relaxed), 0);
        assert!(observer.completions.lock().is_empty());

        store.set_block_async_read(false);

        assert!(store.is_initialization_complete());
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert_eq!(*observer.completions.lock(), vec![true]);
    }

    #[test]
    fn pending_write_set_by_mutation_cleared_by_commit() {
        let store = MemoryPrefStore::new();
        assert!(!store.pending_write());

        store.set_value("a", Value::Int(1));
        assert!(store.pending_write());

        store.commit_pending_write();
        assert!(!store.pending_write());

        // Commit with nothing pending is a no-op.
        store.commit_pending_write();
        assert!(!store.pending_write());

        store.report_value_changed("a");
        assert!(store.pending_write());
    }

    #[test]
    fn unchanged_set_does_not_mark_pending_write() {
        let store = MemoryPrefStore::new();
        store.set_value("a", Value::Int(1));
        store.commit_pending_write();

        store.set_value("a", Value::Int(1));
        assert!(!store.pending_write());
    }
}
