//! LRU (Least Recently Used) cache implementation
//!
//! Keeps a key index and a circular recency list in bijection. Once the
//! cache is full every insertion recycles the oldest slot, so the arena
//! holds exactly `capacity + 1` nodes for the rest of its life.

use std::hash::Hash;
use std::num::NonZeroUsize;

use crate::list::RecencyList;
use crate::store::CacheStore;

/// Outcome of [`LruCache::insert`]
#[derive(Debug, PartialEq, Eq)]
pub enum Insert<K, V> {
    /// Key was already cached; the offered value is handed back unstored
    Rejected(V),
    /// Stored in a fresh slot
    Added,
    /// Stored by replacing the least-recently-used entry
    Evicted(K, V),
}

/// LRU cache with fixed capacity
pub struct LruCache<K, V> {
    store: CacheStore<K>,
    list: RecencyList<K, V>,
    capacity: NonZeroUsize,
    full: bool,
}

impl<K, V> LruCache<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Create a new LRU cache with the given capacity
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            store: CacheStore::with_capacity(capacity.get()),
            list: RecencyList::with_capacity(capacity.get()),
            capacity,
            full: false,
        }
    }

    /// Get a value and mark it most recently used
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let id = self.store.get(key)?;
        self.list.move_to_front(id);
        self.list.value(id)
    }

    /// Check for a key without touching recency
    pub fn contains(&self, key: &K) -> bool {
        self.store.contains(key)
    }

    /// Insert a key that is not cached yet
    pub fn insert(&mut self, key: K, mut value: V) -> Insert<K, V> {
        if self.store.contains(&key) {
            return Insert::Rejected(value);
        }

        if self.full {
            // The root takes the new entry; the oldest slot becomes the root
            match self.list.rotate_root(key.clone(), value) {
                Ok((id, old_key, old_value)) => {
                    self.store.remove(&old_key);
                    self.store.insert(key, id);
                    return Insert::Evicted(old_key, old_value);
                }
                Err((_, rejected)) => value = rejected,
            }
        }

        let id = self.list.insert_front(key.clone(), value);
        self.store.insert(key, id);
        self.full = self.store.len() >= self.capacity.get();
        Insert::Added
    }

    /// Get the current size of the cache
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Iterate entries from most to least recently used
    pub fn iter(&self) -> crate::list::Iter<'_, K, V> {
        self.list.iter()
    }

    /// Clear the cache, handing back the removed entries oldest first
    pub fn clear(&mut self) -> Vec<(K, V)> {
        let mut drained = Vec::with_capacity(self.list.len());
        while let Some(entry) = self.list.evict_back() {
            drained.push(entry);
        }
        self.store.clear();
        self.list.reset();
        self.full = false;
        drained
    }

    #[cfg(test)]
    fn debug_validate_invariants(&self)
    where
        K: std::fmt::Debug,
    {
        self.list.debug_validate_invariants();
        assert_eq!(self.list.len(), self.store.len());
        assert!(self.store.len() <= self.capacity.get());
        for (key, _) in self.list.iter() {
            let id = self.store.get(key).expect("listed key missing from store");
            assert_eq!(self.list.key(id), Some(key));
        }
    }
}
