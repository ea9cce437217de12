//! Preference store layer.
//!
//! Provides the trait hierarchy and the concrete stores:
//!
//! - [`PrefStore`] / [`PersistentPrefStore`]: the capability every backing
//!   store implements
//! - [`MemoryPrefStore`]: in-memory backing store
//! - [`SegregatedPrefStore`]: composite store routing keys between two
//!   backing stores by a fixed selection set
//!
//! Additionally defines [`PrefStoreObserver`] for change and
//! initialization notifications, [`ObserverList`] as the reentrancy-safe
//! notification primitive, and [`SelectionPolicy`] for key routing.

mod aggregator;
pub mod memory;
pub mod observer_list;
pub mod pref_store;
pub mod segregated;
pub mod selection;

pub use memory::*;
pub use observer_list::*;
pub use pref_store::*;
pub use segregated::*;
pub use selection::*;
