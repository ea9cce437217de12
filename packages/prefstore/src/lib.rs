//! `prefstore` — composite preference storage with key-segregated routing.
//!
//! A [`SegregatedPrefStore`](store::SegregatedPrefStore) splits one
//! persistent key-value surface across two independently owned backing
//! stores: a fixed selection set of keys lives in the selected store,
//! everything else in the default store. Values whose keys fall out of
//! the selection set migrate back lazily on write access. The composite
//! presents the two stores' read errors, initialization progress, and
//! read-only flags as a single coherent view, and implements the same
//! [`PersistentPrefStore`](store::PersistentPrefStore) capability it
//! consumes, so it drops in wherever a plain store handle is expected.

pub mod store;
pub mod value;

pub use store::{
    InitCallback, MemoryPrefStore, MutableValue, ObserverList, PersistentPrefStore, PrefReadError,
    PrefStore, PrefStoreObserver, ReadErrorDelegate, SegregatedPrefStore, SelectionPolicy,
};
pub use value::Value;
