//! Notification adapter between the two backing stores and the composite.
//!
//! [`AggregatingObserver`] is the private observer half of
//! [`SegregatedPrefStore`](super::SegregatedPrefStore): it subscribes to
//! both backing stores, forwards per-key change events unchanged, and
//! collapses the two independent initialization completions into exactly
//! one combined completion.

use std::sync::Weak;

use parking_lot::Mutex;

use super::pref_store::PrefStoreObserver;
use super::segregated::SegregatedPrefStore;

/// Completion barrier over the two expected sub-store initializations.
struct BarrierState {
    successful: u8,
    failed: u8,
}

impl BarrierState {
    fn seen(&self) -> u8 {
        self.successful + self.failed
    }
}

/// Observer registered with both backing stores on behalf of the
/// composite.
///
/// Holds the composite weakly: once the composite is gone, notifications
/// from a still-live backing store degrade to no-ops instead of reaching
/// a dead object. Keeping the observer role in its own type also keeps
/// the composite's public surface free of observer methods.
pub(crate) struct AggregatingObserver {
    outer: Weak<SegregatedPrefStore>,
    state: Mutex<BarrierState>,
}

impl AggregatingObserver {
    pub(crate) fn new(outer: Weak<SegregatedPrefStore>) -> Self {
        Self {
            outer,
            state: Mutex::new(BarrierState {
                successful: 0,
                failed: 0,
            }),
        }
    }

    /// Whether both expected completions have already been seen.
    pub(crate) fn is_barrier_complete(&self) -> bool {
        self.state.lock().seen() >= 2
    }
}

impl PrefStoreObserver for AggregatingObserver {
    fn on_pref_value_changed(&self, key: &str) {
        if let Some(outer) = self.outer.upgrade() {
            outer.forward_pref_value_changed(key);
        }
    }

    fn on_initialization_completed(&self, succeeded: bool) {
        let fire = {
            let mut state = self.state.lock();
            if state.seen() >= 2 {
                // A sub-store fired completion more than once; the barrier
                // already released and must not release again.
                tracing::warn!(
                    succeeded,
                    "Ignoring initialization completion after both \
                     sub-stores already reported"
                );
                return;
            }
            if succeeded {
                state.successful += 1;
            } else {
                state.failed += 1;
            }
            state.seen() == 2
        };
        // Lock released before re-entering the composite: the completion
        // hook runs user callbacks which may call back into this store.
        if fire {
            let combined_success = self.state.lock().successful > 0;
            if let Some(outer) = self.outer.upgrade() {
                outer.complete_initialization(combined_success);
            }
        }
    }
}
