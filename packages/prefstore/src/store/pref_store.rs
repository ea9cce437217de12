//! Preference store trait hierarchy and shared types.
//!
//! Defines [`PrefStore`] (read side: values, observers, initialization
//! state) and [`PersistentPrefStore`] (write side: mutation, persistence,
//! synchronous and asynchronous loading), plus [`PrefStoreObserver`] for
//! change and initialization notifications and [`PrefReadError`] with its
//! combination rule for composite stores.

use std::ops::DerefMut;
use std::sync::Arc;

use crate::value::Value;

/// Outcome of loading a store's persisted contents.
///
/// `None` is the normal case. A missing backing file is a distinct,
/// recoverable condition: the store initializes empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PrefReadError {
    /// The read succeeded.
    #[error("no error")]
    None,
    /// No backing file existed; the store starts empty.
    #[error("backing file not found")]
    NoFile,
    /// Any other failure, identified by a store-specific code.
    #[error("read failed with code {0}")]
    Other(u32),
}

impl PrefReadError {
    /// Combines the read errors of a default and a selected store into the
    /// single error a composite store reports:
    ///
    /// | default \ selected | `None`   | `NoFile` | `Other(x)` |
    /// |--------------------|----------|----------|------------|
    /// | `None`             | `None`   | `None`   | `Other(x)` |
    /// | `NoFile`           | `NoFile` | `NoFile` | `NoFile`   |
    /// | `Other(d)`         | `Other(d)` | `Other(d)` | `Other(d)` |
    ///
    /// The default store's `Other` error dominates everything, then its
    /// `NoFile`; only when the default store read cleanly does the selected
    /// store's code surface — and then only if it is `Other`.
    #[must_use]
    pub fn combine(default: PrefReadError, selected: PrefReadError) -> PrefReadError {
        match (default, selected) {
            (PrefReadError::None, PrefReadError::Other(code)) => PrefReadError::Other(code),
            (PrefReadError::None, _) => PrefReadError::None,
            (default, _) => default,
        }
    }
}

/// Observer of a single preference store.
///
/// Used as `Arc<dyn PrefStoreObserver>`; registration is weak, so the
/// registrant must keep its own `Arc` alive for as long as it wants
/// notifications.
pub trait PrefStoreObserver: Send + Sync {
    /// Called after the value for `key` changed (set, removed, or reported
    /// changed in place).
    fn on_pref_value_changed(&self, key: &str);

    /// Called once the store has finished loading its persisted contents.
    ///
    /// `succeeded` is false when the load failed outright; a missing
    /// backing file still counts as success.
    fn on_initialization_completed(&self, succeeded: bool);
}

/// Mutable handle into a store's value for a key.
///
/// A boxed guard dereferencing to the stored [`Value`]. After mutating
/// through it, the caller must drop the handle and call
/// [`PersistentPrefStore::report_value_changed`] so observers hear about
/// the change.
pub type MutableValue<'a> = Box<dyn DerefMut<Target = Value> + 'a>;

/// One-shot callback receiving the final read error of an asynchronous
/// load. Invoked exactly once per [`PersistentPrefStore::read_prefs_async`]
/// call that supplied it.
pub type ReadErrorDelegate = Box<dyn FnOnce(PrefReadError) + Send>;

/// One-shot callback invoked when initialization completes, before any
/// registered observer is notified.
pub type InitCallback = Box<dyn FnOnce() + Send>;

/// Read side of a preference store: value lookup, observers, and
/// initialization state.
///
/// Used as `Arc<dyn PrefStore>` / `Arc<dyn PersistentPrefStore>`; handles
/// are shared, and no holder may assume exclusive ownership.
pub trait PrefStore: Send + Sync {
    /// Registers an observer. The list holds a weak reference.
    fn add_observer(&self, observer: &Arc<dyn PrefStoreObserver>);

    /// Unregisters a previously added observer (pointer identity).
    fn remove_observer(&self, observer: &Arc<dyn PrefStoreObserver>);

    /// Whether any live observer is currently registered.
    fn has_observers(&self) -> bool;

    /// Whether the store has finished loading its persisted contents.
    fn is_initialization_complete(&self) -> bool;

    /// Returns the value for `key`, or `None` if the store does not hold
    /// one. Absence is not an error.
    fn get_value(&self, key: &str) -> Option<Value>;
}

/// A preference store whose contents persist across restarts.
///
/// Adds mutation, in-place mutable access, read-only state, and the
/// synchronous/asynchronous load protocol on top of [`PrefStore`].
pub trait PersistentPrefStore: PrefStore {
    /// Stores `value` for `key` and notifies observers if it changed.
    fn set_value(&self, key: &str, value: Value);

    /// Stores `value` for `key` without notifying observers.
    fn set_value_silently(&self, key: &str, value: Value);

    /// Removes the value for `key`, notifying observers.
    ///
    /// Returns `false` when nothing was removed — the key was absent or
    /// the store rejected the mutation (e.g. read-only).
    fn remove_value(&self, key: &str) -> bool;

    /// Returns a mutable handle to the value for `key`, or `None` if the
    /// store holds no value for it.
    ///
    /// The caller must call [`report_value_changed`](Self::report_value_changed)
    /// after mutating through the handle.
    fn get_mutable_value(&self, key: &str) -> Option<MutableValue<'_>>;

    /// Notifies observers that the value for `key` was changed in place.
    fn report_value_changed(&self, key: &str);

    /// Whether mutations are currently rejected.
    fn read_only(&self) -> bool;

    /// The read error of the most recent load, `PrefReadError::None` if it
    /// succeeded or no load has happened yet.
    fn get_read_error(&self) -> PrefReadError;

    /// Loads the persisted contents synchronously, blocking the caller.
    ///
    /// Fires `on_initialization_completed` on observers before returning.
    fn read_prefs(&self) -> PrefReadError;

    /// Starts an asynchronous load and returns immediately.
    ///
    /// `delegate`, if supplied, is invoked exactly once with the final
    /// read error; initialization completion additionally reaches
    /// registered observers. There is no cancellation.
    fn read_prefs_async(&self, delegate: Option<ReadErrorDelegate>);

    /// Schedules a write of any pending mutations to the backing storage.
    /// Idempotent; a store with nothing pending does nothing.
    fn commit_pending_write(&self);
}
