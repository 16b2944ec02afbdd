//! # memocache
//!
//! Memoizing function cache with optional bounded LRU eviction.
//!
//! ## Architecture
//! - **Key**: call arguments flattened into one hashable [`CacheKey`]
//! - **HashMap**: AHash index from key to list slot (O(1))
//! - **Recency list**: circular doubly-linked arena with a moving root (O(1))
//! - **Engine**: [`MemoCache`] with disabled, unbounded and bounded modes
//!   behind one reentrant lock; computations run unlocked
//! - **Wrapper**: [`Memoized`] binds a function to its own cache
//!
//! ## Example
//!
//! ```
//! use memocache::MemoCache;
//!
//! let cache = MemoCache::with_capacity(2);
//! assert_eq!(cache.get_or_compute("a", || 1), 1);
//! assert_eq!(cache.get_or_compute("a", || 2), 1);
//!
//! let info = cache.cache_info();
//! assert_eq!((info.hits, info.misses), (1, 1));
//! ```

#![warn(missing_docs)]

mod cache;
mod config;
mod error;
mod key;
mod list;
mod lru;
mod memoize;
mod stats;
mod store;

pub use cache::MemoCache;
pub use config::{CacheConfig, MaxSize, DEFAULT_MAXSIZE};
pub use error::{Error, Result};
pub use key::{make_key, Arg, ArgType, CacheKey, CallArgs};
pub use memoize::Memoized;
pub use stats::{CacheInfo, CacheStats};
