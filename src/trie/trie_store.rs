use std::any::Any;
use std::ops::Deref;
use std::sync::Arc;

use parking_lot::Mutex;

use super::Trie;

/// Scoped handle returned by [`TrieStore::get`]. It keeps the trie snapshot
/// it was resolved against alive, so the borrowed value stays valid no
/// matter how many writes land after the lookup.
pub struct ValueGuard<T> {
    /// Pins every node of the snapshot for the guard's lifetime
    _snapshot: Trie,
    value: Arc<T>,
}

impl<T> ValueGuard<T> {
    fn new(snapshot: Trie, value: Arc<T>) -> Self {
        Self {
            _snapshot: snapshot,
            value,
        }
    }
}

impl<T> Deref for ValueGuard<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

/// Concurrent facade over a [`Trie`].
///
/// Readers copy the current root under a short-lived root lock and then run
/// the lookup entirely on their private snapshot; writers serialise on a
/// separate writer lock and swap in the rebuilt root under the root lock.
/// Readers therefore never block writers and vice versa.
pub struct TrieStore {
    /// Guards loads and stores of the current root handle, nothing more
    root: Mutex<Trie>,
    /// Held for the full duration of a mutation, one writer at a time
    write_lock: Mutex<()>,
}

impl TrieStore {
    /// Creates a store holding an empty trie.
    pub fn new() -> Self {
        Self {
            root: Mutex::new(Trie::new()),
            write_lock: Mutex::new(()),
        }
    }

    /// Looks up `key` in the current snapshot. Returns a guard that carries
    /// both the snapshot and the value; `None` on a missing key or a value
    /// of a different type.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<ValueGuard<T>> {
        let snapshot = self.root.lock().clone();
        // the walk happens outside the root lock, on our own handle
        let value = snapshot.get_value(key)?;
        let value = value.downcast::<T>().ok()?;
        Some(ValueGuard::new(snapshot, value))
    }

    /// Maps `key` to `value`. Concurrent readers keep observing the snapshot
    /// they started from.
    pub fn put<T: Any + Send + Sync>(&self, key: &str, value: T) {
        let _writer = self.write_lock.lock();
        let snapshot = self.root.lock().clone();
        let updated = snapshot.put(key, value);
        *self.root.lock() = updated;
    }

    /// Removes `key` if present.
    pub fn remove(&self, key: &str) {
        let _writer = self.write_lock.lock();
        let snapshot = self.root.lock().clone();
        let updated = snapshot.remove(key);
        *self.root.lock() = updated;
    }
}

impl Default for TrieStore {
    fn default() -> Self {
        Self::new()
    }
}
