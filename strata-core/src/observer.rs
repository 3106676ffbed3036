//! Observer registration for stateful components.
//!
//! Links, configurations, graphs and executors each own an [`ObserverList`].
//! Registration and removal are thread-safe; notification iterates over a
//! snapshot so observers may (un)register from inside a callback.

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

impl ObserverId {
    /// Create a new unique observer ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ObserverId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer_{}", self.0)
    }
}

/// Snapshot of the registered observers.
pub type ObserverSnapshot<T> = Arc<Vec<(ObserverId, Arc<T>)>>;

/// Callback observer receiving events of type `E`.
pub type Callback<E> = dyn Fn(&E) + Send + Sync;

/// Copy-on-write list of observers.
///
/// Writers clone the backing vector; readers take an `Arc` to the current
/// vector and never hold the lock while calling out.
pub struct ObserverList<T: ?Sized> {
    entries: RwLock<ObserverSnapshot<T>>,
}

impl<T: ?Sized> ObserverList<T> {
    /// Create an empty list.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Register an observer, returning its ID for later removal.
    pub fn add(&self, observer: Arc<T>) -> ObserverId {
        let id = ObserverId::new();
        let mut entries = self.entries.write();
        let mut next = Vec::with_capacity(entries.len() + 1);
        next.extend(entries.iter().cloned());
        next.push((id, observer));
        *entries = Arc::new(next);
        id
    }

    /// Remove an observer. Returns `false` if the ID was not registered.
    pub fn remove(&self, id: ObserverId) -> bool {
        let mut entries = self.entries.write();
        if !entries.iter().any(|(existing, _)| *existing == id) {
            return false;
        }
        let next: Vec<_> = entries
            .iter()
            .filter(|(existing, _)| *existing != id)
            .cloned()
            .collect();
        *entries = Arc::new(next);
        true
    }

    /// Remove every observer.
    pub fn clear(&self) {
        *self.entries.write() = Arc::new(Vec::new());
    }

    /// Take a snapshot of the current observers.
    pub fn snapshot(&self) -> ObserverSnapshot<T> {
        Arc::clone(&self.entries.read())
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no observer is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E> ObserverList<Callback<E>> {
    /// Register a callback.
    pub fn subscribe(&self, callback: impl Fn(&E) + Send + Sync + 'static) -> ObserverId {
        self.add(Arc::new(callback))
    }

    /// Invoke every callback registered at the time of the call.
    pub fn notify(&self, event: &E) {
        for (_, callback) in self.snapshot().iter() {
            callback(event);
        }
    }
}

impl<T: ?Sized> Default for ObserverList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for ObserverList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverList")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn observer_id_uniqueness() {
        let id1 = ObserverId::new();
        let id2 = ObserverId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn subscribe_notify_remove() {
        let list: ObserverList<Callback<u32>> = ObserverList::new();
        let total = Arc::new(AtomicUsize::new(0));

        let total_clone = Arc::clone(&total);
        let id = list.subscribe(move |value| {
            total_clone.fetch_add(*value as usize, Ordering::SeqCst);
        });

        list.notify(&3);
        list.notify(&4);
        assert_eq!(total.load(Ordering::SeqCst), 7);

        assert!(list.remove(id));
        assert!(!list.remove(id));
        list.notify(&100);
        assert_eq!(total.load(Ordering::SeqCst), 7);
        assert!(list.is_empty());
    }

    #[test]
    fn snapshot_is_isolated_from_later_registration() {
        let list: ObserverList<Callback<()>> = ObserverList::new();
        list.subscribe(|_| {});
        let snapshot = list.snapshot();
        list.subscribe(|_| {});

        assert_eq!(snapshot.len(), 1);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn callback_may_unsubscribe_itself() {
        let list: Arc<ObserverList<Callback<()>>> = Arc::new(ObserverList::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let own_id = Arc::new(parking_lot::Mutex::new(None));

        let list_clone = Arc::clone(&list);
        let calls_clone = Arc::clone(&calls);
        let own_id_clone = Arc::clone(&own_id);
        let id = list.subscribe(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = *own_id_clone.lock() {
                list_clone.remove(id);
            }
        });
        *own_id.lock() = Some(id);

        list.notify(&());
        list.notify(&());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
