//! Thread-safe handle registry for stateful resources
//!
//! Hands out numeric ids for resources that outlive a single native call,
//! such as running child processes. Ids start at 1 and are never reused.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Id -> shared resource map, safe to use from any thread
pub struct HandleRegistry<T> {
    map: DashMap<u64, Arc<T>>,
    next_id: AtomicU64,
}

impl<T> HandleRegistry<T> {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            map: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Insert a value and return its id
    pub fn insert(&self, value: T) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.map.insert(id, Arc::new(value));
        id
    }

    /// Shared reference to a value.
    ///
    /// The map shard is not held after this returns, so callers may block
    /// on the value without stalling other ids.
    pub fn get(&self, id: u64) -> Option<Arc<T>> {
        self.map.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Remove a value, returning it
    pub fn remove(&self, id: u64) -> Option<Arc<T>> {
        self.map.remove(&id).map(|(_, value)| value)
    }

    /// Whether `id` is registered
    pub fn contains(&self, id: u64) -> bool {
        self.map.contains_key(&id)
    }

    /// Number of registered values
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl<T> Default for HandleRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
