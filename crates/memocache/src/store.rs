//! Key index for the bounded cache

use std::collections::HashMap;
use std::hash::Hash;
use ahash::RandomState;

use crate::list::EntryId;

/// Maps each cached key to its slot in the recency list
pub struct CacheStore<K> {
    map: HashMap<K, EntryId, RandomState>,
}

impl<K: Hash + Eq> CacheStore<K> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: HashMap::with_capacity_and_hasher(capacity, RandomState::new()),
        }
    }

    pub fn get(&self, key: &K) -> Option<EntryId> {
        self.map.get(key).copied()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    pub fn insert(&mut self, key: K, id: EntryId) {
        self.map.insert(key, id);
    }

    pub fn remove(&mut self, key: &K) -> Option<EntryId> {
        self.map.remove(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_basic() {
        let mut store = CacheStore::with_capacity(4);
        store.insert("a", 1);
        store.insert("b", 2);

        assert_eq!(store.get(&"a"), Some(1));
        assert!(store.contains(&"b"));
        assert_eq!(store.len(), 2);

        assert_eq!(store.remove(&"a"), Some(1));
        assert_eq!(store.get(&"a"), None);

        store.clear();
        assert_eq!(store.len(), 0);
    }
}
