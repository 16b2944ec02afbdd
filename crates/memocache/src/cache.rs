//! MemoCache: thread-safe memoizing cache engine
//!
//! All state lives behind one reentrant lock per instance. Computations run
//! with the lock released, so a slow computation never blocks lookups for
//! other keys, and a computation may call back into the same cache. Values
//! are stored behind `Arc`, so the inner state is only borrowed for index
//! work: cloning or dropping a `V` always happens outside the borrow.

use std::cell::RefCell;
use std::collections::HashMap;
use std::convert::Infallible;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use ahash::RandomState;
use parking_lot::{Condvar, Mutex, ReentrantMutex};
use tracing::{debug, trace};

use crate::config::MaxSize;
use crate::lru::{Insert, LruCache};
use crate::stats::{CacheInfo, CacheStats};

enum Storage<K, V> {
    Disabled,
    Unbounded(HashMap<K, Arc<V>, RandomState>),
    Bounded(LruCache<K, Arc<V>>),
}

impl<K, V> Storage<K, V>
where
    K: Hash + Eq + Clone,
{
    fn new(maxsize: MaxSize) -> Self {
        match maxsize {
            MaxSize::Disabled => Storage::Disabled,
            MaxSize::Unbounded => Storage::Unbounded(HashMap::with_hasher(RandomState::new())),
            MaxSize::Bounded(n) => Storage::Bounded(LruCache::new(n)),
        }
    }

    fn len(&self) -> usize {
        match self {
            Storage::Disabled => 0,
            Storage::Unbounded(map) => map.len(),
            Storage::Bounded(lru) => lru.len(),
        }
    }
}

/// Memoizing cache with disabled, unbounded and bounded LRU modes
///
/// Misses are race-tolerant by default: two threads missing the same key
/// both compute, the first to finish stores its value and both values are
/// returned to their own callers. With single-flight enabled the second
/// caller waits for the first computation instead.
pub struct MemoCache<K, V> {
    state: ReentrantMutex<RefCell<Storage<K, V>>>,
    stats: CacheStats,
    maxsize: MaxSize,
    // Mirrors the storage length so statistics never borrow the storage
    size: AtomicUsize,
    flights: Option<FlightTable<K, V>>,
}

impl<K, V> MemoCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Create a race-tolerant cache
    pub fn new(maxsize: MaxSize) -> Self {
        Self::build(maxsize, false)
    }

    /// Create a bounded cache; `0` disables caching
    pub fn with_capacity(maxsize: usize) -> Self {
        Self::new(MaxSize::bounded(maxsize))
    }

    /// Create a cache without size limit
    pub fn unbounded() -> Self {
        Self::new(MaxSize::Unbounded)
    }

    /// Create a cache whose concurrent misses on one key compute once
    ///
    /// A computation that requests its own key from the same cache waits
    /// for itself forever.
    pub fn single_flight(maxsize: MaxSize) -> Self {
        Self::build(maxsize, true)
    }

    fn build(maxsize: MaxSize, single_flight: bool) -> Self {
        let single_flight = single_flight && maxsize != MaxSize::Disabled;
        debug!(
            "Creating memo cache (maxsize: {}, single_flight: {})",
            maxsize, single_flight
        );

        Self {
            state: ReentrantMutex::new(RefCell::new(Storage::new(maxsize))),
            stats: CacheStats::new(),
            maxsize,
            size: AtomicUsize::new(0),
            flights: single_flight.then(|| Mutex::new(HashMap::with_hasher(RandomState::new()))),
        }
    }

    /// Return the cached value for `key` or compute and cache it
    pub fn get_or_compute<F>(&self, key: K, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        match self.try_get_or_compute(key, || Ok::<V, Infallible>(compute())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Like [`get_or_compute`](Self::get_or_compute) for fallible computations
    ///
    /// An error is returned unchanged; nothing is cached and no miss is
    /// counted for that call.
    pub fn try_get_or_compute<F, E>(&self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if self.maxsize == MaxSize::Disabled {
            let value = compute()?;
            self.stats.record_miss();
            return Ok(value);
        }

        if let Some(value) = self.lookup(&key) {
            return Ok(value);
        }

        if let Some(flights) = &self.flights {
            return self.compute_single_flight(flights, key, compute);
        }

        let value = compute()?;
        self.commit(key, &value);
        Ok(value)
    }

    /// Snapshot of hits, misses, capacity and current size
    pub fn cache_info(&self) -> CacheInfo {
        let _guard = self.state.lock();
        self.stats
            .snapshot(self.maxsize.as_option(), self.size.load(Ordering::Relaxed))
    }

    /// Drop every entry and zero the statistics
    pub fn cache_clear(&self) {
        let drained = {
            let guard = self.state.lock();
            let drained = {
                let mut storage = guard.borrow_mut();
                match &mut *storage {
                    Storage::Disabled => Vec::new(),
                    Storage::Unbounded(map) => std::mem::take(map).into_iter().collect(),
                    Storage::Bounded(lru) => lru.clear(),
                }
            };
            self.size.store(0, Ordering::Relaxed);
            self.stats.reset();
            drained
        };

        debug!("Cleared memo cache ({} entries)", drained.len());
        drop(drained);
    }

    /// Check for a key without touching recency or statistics
    pub fn contains(&self, key: &K) -> bool {
        let guard = self.state.lock();
        let storage = guard.borrow();
        match &*storage {
            Storage::Disabled => false,
            Storage::Unbounded(map) => map.contains_key(key),
            Storage::Bounded(lru) => lru.contains(key),
        }
    }

    /// Configured capacity mode
    pub fn maxsize(&self) -> MaxSize {
        self.maxsize
    }

    /// Cached keys, most recently used first (insertion order is not kept
    /// for unbounded caches)
    pub fn keys(&self) -> Vec<K> {
        let guard = self.state.lock();
        let storage = guard.borrow();
        match &*storage {
            Storage::Disabled => Vec::new(),
            Storage::Unbounded(map) => map.keys().cloned().collect(),
            Storage::Bounded(lru) => lru.iter().map(|(k, _)| k.clone()).collect(),
        }
    }

    fn lookup(&self, key: &K) -> Option<V> {
        let stored = {
            let guard = self.state.lock();
            let stored = {
                let mut storage = guard.borrow_mut();
                match &mut *storage {
                    Storage::Disabled => None,
                    Storage::Unbounded(map) => map.get(key).map(Arc::clone),
                    Storage::Bounded(lru) => lru.get(key).map(Arc::clone),
                }
            };
            if stored.is_some() {
                self.stats.record_hit();
                trace!("Cache hit (maxsize: {})", self.maxsize);
            }
            stored
        };

        stored.map(|value| V::clone(&value))
    }

    /// Store a freshly computed value unless a concurrent caller got there first
    fn commit(&self, key: K, value: &V) {
        let value = Arc::new(value.clone());

        // Whatever the storage hands back is dropped after the lock is released
        let (leftover, evicted, size) = {
            let guard = self.state.lock();
            let mut evicted = false;
            let (leftover, size) = {
                let mut storage = guard.borrow_mut();
                let leftover = match &mut *storage {
                    Storage::Disabled => None,
                    Storage::Unbounded(map) => {
                        if map.contains_key(&key) {
                            trace!("Cache miss lost race; keeping stored value");
                            Some((Some(key), value))
                        } else {
                            map.insert(key, value);
                            None
                        }
                    }
                    Storage::Bounded(lru) => {
                        if lru.contains(&key) {
                            trace!("Cache miss lost race; keeping stored value");
                            Some((Some(key), value))
                        } else {
                            match lru.insert(key, value) {
                                Insert::Evicted(old_key, old_value) => {
                                    evicted = true;
                                    Some((Some(old_key), old_value))
                                }
                                Insert::Rejected(value) => Some((None, value)),
                                Insert::Added => None,
                            }
                        }
                    }
                };
                (leftover, storage.len())
            };
            self.size.store(size, Ordering::Relaxed);
            self.stats.record_miss();
            (leftover, evicted, size)
        };

        if evicted {
            debug!("Evicted least-recently-used entry (size: {})", size);
        }
        trace!("Cache miss (size: {})", size);
        drop(leftover);
    }

    fn compute_single_flight<F, E>(
        &self,
        flights: &FlightTable<K, V>,
        key: K,
        compute: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let (flight, leader) = {
            let mut table = flights.lock();
            match table.get(&key) {
                Some(flight) => (Arc::clone(flight), false),
                None => {
                    let flight = Arc::new(Flight::new());
                    table.insert(key.clone(), Arc::clone(&flight));
                    (flight, true)
                }
            }
        };

        if !leader {
            trace!("Waiting for in-flight computation");
            if let Some(value) = flight.wait() {
                let _guard = self.state.lock();
                self.stats.record_hit();
                return Ok(value);
            }
            // Leader failed; compute for ourselves
            let value = compute()?;
            self.commit(key, &value);
            return Ok(value);
        }

        let mut landing = Landing {
            flights,
            key: key.clone(),
            flight,
            value: None,
        };

        // A previous leader may have committed between our miss and our flight
        if let Some(value) = self.lookup(&key) {
            landing.value = Some(value.clone());
            return Ok(value);
        }

        let value = compute()?;
        self.commit(key, &value);
        landing.value = Some(value.clone());
        Ok(value)
    }
}

type FlightTable<K, V> = Mutex<HashMap<K, Arc<Flight<V>>, RandomState>>;

enum Outcome<V> {
    Pending,
    Ready(V),
    Failed,
}

/// One in-progress computation that other callers can wait on
struct Flight<V> {
    outcome: Mutex<Outcome<V>>,
    done: Condvar,
}

impl<V: Clone> Flight<V> {
    fn new() -> Self {
        Self {
            outcome: Mutex::new(Outcome::Pending),
            done: Condvar::new(),
        }
    }

    fn finish(&self, value: Option<V>) {
        let mut outcome = self.outcome.lock();
        *outcome = match value {
            Some(value) => Outcome::Ready(value),
            None => Outcome::Failed,
        };
        self.done.notify_all();
    }

    fn wait(&self) -> Option<V> {
        let mut outcome = self.outcome.lock();
        loop {
            match &*outcome {
                Outcome::Pending => self.done.wait(&mut outcome),
                Outcome::Ready(value) => return Some(value.clone()),
                Outcome::Failed => return None,
            }
        }
    }
}

/// Completes the leader's flight on every exit path, panics included
struct Landing<'a, K: Hash + Eq, V: Clone> {
    flights: &'a FlightTable<K, V>,
    key: K,
    flight: Arc<Flight<V>>,
    value: Option<V>,
}

impl<K: Hash + Eq, V: Clone> Drop for Landing<'_, K, V> {
    fn drop(&mut self) {
        self.flights.lock().remove(&self.key);
        self.flight.finish(self.value.take());
    }
}
