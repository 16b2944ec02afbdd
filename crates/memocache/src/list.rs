//! Circular recency list
//!
//! Entries live in an index arena and are linked by slot index. One slot is
//! the sentinel (`root`): its `prev` is the most-recently-used entry and its
//! `next` the least-recently-used one. An empty list is a root linked to
//! itself.
//!
//! ```text
//!        ┌──────────────────────────────────────────┐
//!        ▼                                          │
//!   [root] ──next──► [LRU] ◄──► ... ◄──► [MRU] ──next┘
//! ```
//!
//! The root moves: [`RecencyList::rotate_root`] stores a new entry in the
//! current root and turns the least-recently-used entry into the new root,
//! so a full cache replaces its oldest entry without touching the arena.

/// Slot index of an entry in the arena
pub type EntryId = usize;

struct Node<K, V> {
    key: Option<K>,
    value: Option<V>,
    prev: EntryId,
    next: EntryId,
}

impl<K, V> Node<K, V> {
    fn vacant(idx: EntryId) -> Self {
        Self {
            key: None,
            value: None,
            prev: idx,
            next: idx,
        }
    }
}

/// Doubly-linked recency order over arena slots
pub struct RecencyList<K, V> {
    nodes: Vec<Node<K, V>>,
    root: EntryId,
    free_list: Vec<EntryId>,
    len: usize,
}

impl<K, V> RecencyList<K, V> {
    /// Create an empty list
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an empty list with room for `capacity` entries plus the root
    pub fn with_capacity(capacity: usize) -> Self {
        let mut nodes = Vec::with_capacity(capacity + 1);
        nodes.push(Node::vacant(0));

        Self {
            nodes,
            root: 0,
            free_list: Vec::new(),
            len: 0,
        }
    }

    /// Number of entries, excluding the root
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the list holds no entries
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Arena slots in use, root included
    #[cfg(test)]
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free_list.len()
    }

    /// Key stored at `id`
    #[cfg(test)]
    pub fn key(&self, id: EntryId) -> Option<&K> {
        self.nodes.get(id).and_then(|node| node.key.as_ref())
    }

    /// Value stored at `id`
    pub fn value(&self, id: EntryId) -> Option<&V> {
        self.nodes.get(id).and_then(|node| node.value.as_ref())
    }

    /// Move an entry to the most-recently-used end
    pub fn move_to_front(&mut self, id: EntryId) {
        debug_assert_ne!(id, self.root, "the root is not an entry");
        if self.nodes[self.root].prev == id {
            return; // Already most recent
        }

        self.unlink(id);
        self.link_front(id);
    }

    /// Add a new entry at the most-recently-used end
    pub fn insert_front(&mut self, key: K, value: V) -> EntryId {
        let id = self.alloc_node();
        {
            let node = &mut self.nodes[id];
            node.key = Some(key);
            node.value = Some(value);
        }
        self.link_front(id);
        self.len += 1;
        id
    }

    /// Remove and return the least-recently-used entry
    pub fn evict_back(&mut self) -> Option<(K, V)> {
        let oldest = self.nodes[self.root].next;
        if oldest == self.root {
            return None;
        }

        let node = &mut self.nodes[oldest];
        let (key, value) = (node.key.take()?, node.value.take()?);
        self.unlink(oldest);
        self.free_list.push(oldest);
        self.len -= 1;
        Some((key, value))
    }

    /// Store `key`/`value` in the root and make the least-recently-used
    /// entry the new, empty root.
    ///
    /// Returns the slot now holding `key` with the evicted pair. An empty
    /// list is left untouched and the pair is handed back.
    pub fn rotate_root(&mut self, key: K, value: V) -> Result<(EntryId, K, V), (K, V)> {
        let old_root = self.root;
        let oldest = self.nodes[old_root].next;
        if oldest == old_root {
            return Err((key, value));
        }

        let node = &mut self.nodes[oldest];
        let (old_key, old_value) = match (node.key.take(), node.value.take()) {
            (Some(k), Some(v)) => (k, v),
            _ => return Err((key, value)),
        };

        let node = &mut self.nodes[old_root];
        node.key = Some(key);
        node.value = Some(value);
        self.root = oldest;

        Ok((old_root, old_key, old_value))
    }

    /// Drop every entry and return to the self-linked empty state
    pub fn reset(&mut self) {
        self.nodes.clear();
        self.nodes.push(Node::vacant(0));
        self.free_list.clear();
        self.root = 0;
        self.len = 0;
    }

    /// Iterate entries from most to least recently used
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            list: self,
            current: self.nodes[self.root].prev,
        }
    }

    /// Panics if links, root or length are inconsistent
    #[cfg(test)]
    pub fn debug_validate_invariants(&self) {
        let root = &self.nodes[self.root];
        assert!(root.key.is_none() && root.value.is_none(), "root holds data");

        let mut seen = std::collections::HashSet::new();
        let mut count = 0usize;
        let mut current = self.root;
        loop {
            let next = self.nodes[current].next;
            assert_eq!(self.nodes[next].prev, current, "broken back link");
            if next == self.root {
                break;
            }
            assert!(seen.insert(next), "entry linked twice");
            assert!(self.nodes[next].key.is_some(), "entry without key");
            count += 1;
            assert!(count <= self.len, "list longer than len");
            current = next;
        }
        assert_eq!(count, self.len);
        assert_eq!(self.node_count(), self.len + 1);
    }

    fn unlink(&mut self, id: EntryId) {
        let (prev, next) = (self.nodes[id].prev, self.nodes[id].next);
        self.nodes[prev].next = next;
        self.nodes[next].prev = prev;
    }

    fn link_front(&mut self, id: EntryId) {
        let root = self.root;
        let last = self.nodes[root].prev;
        self.nodes[last].next = id;
        self.nodes[id].prev = last;
        self.nodes[id].next = root;
        self.nodes[root].prev = id;
    }

    fn alloc_node(&mut self) -> EntryId {
        if let Some(idx) = self.free_list.pop() {
            idx
        } else {
            let idx = self.nodes.len();
            self.nodes.push(Node::vacant(idx));
            idx
        }
    }
}

impl<K, V> Default for RecencyList<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator from most to least recently used
pub struct Iter<'a, K, V> {
    list: &'a RecencyList<K, V>,
    current: EntryId,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.current == self.list.root {
            return None;
        }
        let node = &self.list.nodes[self.current];
        self.current = node.prev;
        match (&node.key, &node.value) {
            (Some(k), Some(v)) => Some((k, v)),
            _ => None,
        }
    }
}
