//! Reentrancy-safe observer list.
//!
//! [`ObserverList`] is the notification primitive shared by every store in
//! this crate. It holds observers weakly and snapshots the list before
//! dispatching, so observers may register or unregister observers
//! (including themselves) from inside a notification callback.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Weak list of observers with copy-on-notify iteration.
///
/// Registration stores a `Weak`; the registrant keeps its own `Arc` alive
/// for as long as it wants notifications. Entries whose last `Arc` was
/// dropped are skipped and pruned opportunistically.
///
/// Reentrancy contract: [`notify`](ObserverList::notify) upgrades a
/// snapshot of the list and releases the lock before invoking any
/// callback. Mutations made during a notification take effect for the
/// next one; an observer added mid-notification does not receive the
/// in-flight notification.
pub struct ObserverList<T: ?Sized> {
    observers: Mutex<Vec<Weak<T>>>,
}

impl<T: ?Sized> ObserverList<T> {
    /// Creates an empty observer list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Registers an observer. Double registration yields double
    /// notification; callers are expected not to do that.
    pub fn add(&self, observer: &Arc<T>) {
        let mut observers = self.observers.lock();
        observers.retain(|weak| weak.strong_count() > 0);
        observers.push(Arc::downgrade(observer));
    }

    /// Unregisters an observer by pointer identity. Unknown observers are
    /// ignored.
    pub fn remove(&self, observer: &Arc<T>) {
        let target = Arc::as_ptr(observer).cast::<()>();
        self.observers
            .lock()
            .retain(|weak| weak.as_ptr().cast::<()>() != target && weak.strong_count() > 0);
    }

    /// Whether any registered observer is still alive.
    #[must_use]
    pub fn has_observers(&self) -> bool {
        self.observers
            .lock()
            .iter()
            .any(|weak| weak.strong_count() > 0)
    }

    /// Invokes `f` on every live observer registered at the time of the
    /// call. The internal lock is not held during the callbacks.
    pub fn notify(&self, f: impl Fn(&T)) {
        let live: Vec<Arc<T>> = {
            let mut observers = self.observers.lock();
            observers.retain(|weak| weak.strong_count() > 0);
            observers.iter().filter_map(Weak::upgrade).collect()
        };
        for observer in &live {
            f(observer);
        }
    }
}

impl<T: ?Sized> Default for ObserverList<T> {
    fn default() -> Self {
        Self::new()
    }
}
