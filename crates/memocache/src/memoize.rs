//! Memoized: a callable bound to its own cache
//!
//! ```
//! use memocache::{Arg, CacheConfig, CallArgs, Memoized};
//!
//! let square = Memoized::new(CacheConfig::new().capacity(32), |call: &CallArgs| {
//!     let n = call.get(0).and_then(Arg::as_i64).unwrap_or(0);
//!     n * n
//! });
//!
//! assert_eq!(square.call(&CallArgs::new().arg(12)), 144);
//! assert_eq!(square.call(&CallArgs::new().arg(12)), 144);
//! assert_eq!(square.cache_info().hits, 1);
//! ```

use std::convert::Infallible;
use std::fmt;

use crate::cache::MemoCache;
use crate::config::CacheConfig;
use crate::key::{make_key, CacheKey, CallArgs};
use crate::stats::CacheInfo;

type BoxedFn<V, E> = Box<dyn Fn(&CallArgs) -> Result<V, E> + Send + Sync>;

/// A function whose results are memoized by call arguments
pub struct Memoized<V, E = Infallible> {
    func: BoxedFn<V, E>,
    cache: MemoCache<CacheKey, V>,
    config: CacheConfig,
}

impl<V: Clone> Memoized<V, Infallible> {
    /// Wrap an infallible function
    pub fn new<F>(config: CacheConfig, func: F) -> Self
    where
        F: Fn(&CallArgs) -> V + Send + Sync + 'static,
    {
        Self::fallible(config, move |call: &CallArgs| Ok(func(call)))
    }

    /// Call the function, answering from the cache when possible
    pub fn call(&self, call: &CallArgs) -> V {
        match self.try_call(call) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }
}

impl<V: Clone, E> Memoized<V, E> {
    /// Wrap a fallible function; errors are returned but never cached
    pub fn fallible<F>(config: CacheConfig, func: F) -> Self
    where
        F: Fn(&CallArgs) -> Result<V, E> + Send + Sync + 'static,
    {
        let cache = if config.single_flight {
            MemoCache::single_flight(config.maxsize)
        } else {
            MemoCache::new(config.maxsize)
        };

        Self {
            func: Box::new(func),
            cache,
            config,
        }
    }

    /// Call the function, answering from the cache when possible
    pub fn try_call(&self, call: &CallArgs) -> Result<V, E> {
        let key = make_key(call, self.config.typed);
        self.cache.try_get_or_compute(key, || (self.func)(call))
    }

    /// Call the wrapped function directly, bypassing the cache
    pub fn call_uncached(&self, call: &CallArgs) -> Result<V, E> {
        (self.func)(call)
    }

    /// Get cache statistics
    pub fn cache_info(&self) -> CacheInfo {
        self.cache.cache_info()
    }

    /// Clear cached results and statistics
    pub fn cache_clear(&self) {
        self.cache.cache_clear();
    }

    /// Configuration this function was wrapped with
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

impl<V: Clone, E> fmt::Debug for Memoized<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memoized")
            .field("config", &self.config)
            .field("cache_info", &self.cache_info())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Arg;
    use crate::config::MaxSize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_identity(config: CacheConfig) -> (Memoized<String>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let memo = Memoized::new(config, move |call: &CallArgs| {
            counter.fetch_add(1, Ordering::SeqCst);
            call.args()
                .iter()
                .map(|arg| arg.to_string())
                .collect::<Vec<_>>()
                .join(",")
        });
        (memo, calls)
    }

    fn one(arg: impl Into<Arg>) -> CallArgs {
        CallArgs::new().arg(arg)
    }

    #[test]
    fn test_bounded_eviction() {
        let (memo, _) = counting_identity(CacheConfig::new().capacity(3));

        for k in 1..=4 {
            memo.call(&one(k));
        }

        assert_eq!(memo.cache_info().current_size, 3);
        let before = memo.cache_info().misses;
        for k in 2..=4 {
            memo.call(&one(k));
        }
        assert_eq!(memo.cache_info().misses, before);

        memo.call(&one(1));
        assert_eq!(memo.cache_info().misses, before + 1);
    }

    #[test]
    fn test_recency_promotion() {
        let (memo, calls) = counting_identity(CacheConfig::new().capacity(2));

        memo.call(&one("k1"));
        memo.call(&one("k2"));
        memo.call(&one("k1"));
        memo.call(&one("k3")); // Evicts k2

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        memo.call(&one("k1"));
        memo.call(&one("k3"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        memo.call(&one("k2"));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_typed_keys() {
        let (untyped, calls) = counting_identity(CacheConfig::new());
        assert_eq!(untyped.call(&one(3)), "3");
        assert_eq!(untyped.call(&one(3.0)), "3");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(untyped.cache_info().current_size, 1);

        let (typed, calls) = counting_identity(CacheConfig::new().typed(true));
        assert_eq!(typed.call(&one(3)), "3");
        assert_eq!(typed.call(&one(3.0)), "3.0");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(typed.cache_info().current_size, 2);
    }

    #[test]
    fn test_named_args() {
        let (memo, calls) = counting_identity(CacheConfig::new());

        memo.call(&CallArgs::new().arg(1).kwarg("scale", 2));
        memo.call(&CallArgs::new().arg(1).kwarg("scale", 2));
        memo.call(&CallArgs::new().arg(1).kwarg("scale", 3));

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_disabled() {
        let (memo, calls) = counting_identity(CacheConfig::new().capacity(0));

        for _ in 0..4 {
            memo.call(&one(1));
        }

        let info = memo.cache_info();
        assert_eq!((info.hits, info.misses, info.current_size), (0, 4, 0));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_unbounded() {
        let (memo, _) = counting_identity(CacheConfig::new().unbounded());

        for k in 0..500 {
            memo.call(&one(k));
        }

        let info = memo.cache_info();
        assert_eq!(info.current_size, 500);
        assert_eq!(info.maxsize, None);
    }

    #[test]
    fn test_accounting_matches_calls() {
        let (memo, _) = counting_identity(CacheConfig::new().capacity(4));
        let pattern = [1, 2, 1, 3, 4, 5, 1, 2, 2, 6, 1, 7, 3];

        for k in pattern {
            memo.call(&one(k));
        }

        let info = memo.cache_info();
        assert_eq!(info.hits + info.misses, pattern.len() as u64);
        assert!(info.current_size <= 4);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let (memo, _) = counting_identity(CacheConfig::new());
        memo.call(&one(1));
        memo.call(&one(1));

        memo.cache_clear();
        let once = memo.cache_info();
        memo.cache_clear();
        let twice = memo.cache_info();

        assert_eq!(once, twice);
        assert_eq!((twice.hits, twice.misses, twice.current_size), (0, 0, 0));
    }

    #[test]
    fn test_errors_propagate_uncached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let parse = Memoized::fallible(CacheConfig::new(), move |call: &CallArgs| {
            counter.fetch_add(1, Ordering::SeqCst);
            match call.get(0) {
                Some(Arg::Str(s)) => s.parse::<i64>().map_err(|e| e.to_string()),
                _ => Err("expected a string".to_string()),
            }
        });

        assert!(parse.try_call(&one("x")).is_err());
        assert!(parse.try_call(&one("x")).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(parse.cache_info().current_size, 0);
        assert_eq!(parse.cache_info().misses, 0);

        assert_eq!(parse.try_call(&one("42")), Ok(42));
        assert_eq!(parse.try_call(&one("42")), Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_call_uncached_bypasses_cache() {
        let (memo, calls) = counting_identity(CacheConfig::new());
        memo.call(&one(5));

        assert_eq!(memo.call_uncached(&one(5)), Ok("5".to_string()));
        assert_eq!(memo.call_uncached(&one(6)), Ok("6".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let info = memo.cache_info();
        assert_eq!((info.hits, info.misses, info.current_size), (0, 1, 1));
    }

    #[test]
    fn test_single_flight_config() {
        let (memo, calls) = counting_identity(CacheConfig::new().single_flight(true));
        memo.call(&one(1));
        memo.call(&one(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(memo.config().single_flight);
        assert_eq!(memo.config().maxsize, MaxSize::default());
    }

    #[test]
    fn test_memoized_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Memoized<String>>();
        assert_send_sync::<Memoized<u64, String>>();
    }

    #[test]
    fn test_debug_format() {
        let (memo, _) = counting_identity(CacheConfig::new().capacity(2));
        let debug = format!("{:?}", memo);
        assert!(debug.contains("Memoized"));
        assert!(debug.contains("hits: 0"));
    }
}
