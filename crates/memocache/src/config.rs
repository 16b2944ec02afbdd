//! Cache configuration
//!
//! Configurations are built in code or deserialized from JSON:
//!
//! ```json
//! { "maxsize": 256, "typed": true }
//! ```
//!
//! `maxsize` may be omitted (128 entries), `null` (unbounded) or any
//! non-negative integer (`0` disables caching).

use std::fmt;
use std::num::NonZeroUsize;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Capacity used when none is configured
pub const DEFAULT_MAXSIZE: usize = 128;

/// Capacity mode of a cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaxSize {
    /// No size limit and no recency tracking
    Unbounded,
    /// Nothing is stored; every call recomputes
    Disabled,
    /// At most this many entries, least-recently-used evicted first
    Bounded(NonZeroUsize),
}

impl MaxSize {
    /// Build a capacity from a signed count, rejecting negative values
    pub fn from_signed(maxsize: i64) -> Result<Self> {
        usize::try_from(maxsize).map(Self::bounded).map_err(|_| {
            Error::InvalidConfiguration(format!(
                "maxsize must be a non-negative integer, got {}",
                maxsize
            ))
        })
    }

    /// Bounded capacity of `maxsize` entries; `0` disables caching
    pub fn bounded(maxsize: usize) -> Self {
        match NonZeroUsize::new(maxsize) {
            Some(n) => MaxSize::Bounded(n),
            None => MaxSize::Disabled,
        }
    }

    /// Capacity as reported by `cache_info`: `None` when unbounded
    pub fn as_option(&self) -> Option<usize> {
        match self {
            MaxSize::Unbounded => None,
            MaxSize::Disabled => Some(0),
            MaxSize::Bounded(n) => Some(n.get()),
        }
    }
}

impl Default for MaxSize {
    fn default() -> Self {
        Self::bounded(DEFAULT_MAXSIZE)
    }
}

impl From<usize> for MaxSize {
    fn from(maxsize: usize) -> Self {
        Self::bounded(maxsize)
    }
}

impl From<Option<usize>> for MaxSize {
    fn from(maxsize: Option<usize>) -> Self {
        maxsize.map_or(MaxSize::Unbounded, Self::bounded)
    }
}

impl fmt::Display for MaxSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxSize::Unbounded => f.write_str("unbounded"),
            MaxSize::Disabled => f.write_str("disabled"),
            MaxSize::Bounded(n) => write!(f, "{}", n),
        }
    }
}

/// Construction parameters for a memoizing cache
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawConfig")]
pub struct CacheConfig {
    /// Capacity mode
    pub maxsize: MaxSize,

    /// Treat equal arguments of different types as distinct keys
    pub typed: bool,

    /// Make concurrent callers of the same key wait for one computation
    pub single_flight: bool,
}

impl CacheConfig {
    /// Default configuration: 128 entries, untyped, race-tolerant
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration from an optional signed capacity (`None` = unbounded)
    pub fn with_maxsize(maxsize: Option<i64>) -> Result<Self> {
        let maxsize = match maxsize {
            Some(n) => MaxSize::from_signed(n)?,
            None => MaxSize::Unbounded,
        };
        Ok(Self::default().maxsize(maxsize))
    }

    /// Parse a JSON configuration document
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set the capacity mode
    pub fn maxsize(mut self, maxsize: MaxSize) -> Self {
        self.maxsize = maxsize;
        self
    }

    /// Bound the cache to `maxsize` entries; `0` disables caching
    pub fn capacity(self, maxsize: usize) -> Self {
        self.maxsize(MaxSize::bounded(maxsize))
    }

    /// Remove the size limit
    pub fn unbounded(self) -> Self {
        self.maxsize(MaxSize::Unbounded)
    }

    /// Set key type sensitivity
    pub fn typed(mut self, typed: bool) -> Self {
        self.typed = typed;
        self
    }

    /// Enable or disable single-flight computation
    pub fn single_flight(mut self, single_flight: bool) -> Self {
        self.single_flight = single_flight;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            maxsize: MaxSize::default(),
            typed: false,
            single_flight: false,
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default = "default_maxsize")]
    maxsize: serde_json::Value,
    #[serde(default)]
    typed: bool,
    #[serde(default)]
    single_flight: bool,
}

fn default_maxsize() -> serde_json::Value {
    serde_json::Value::from(DEFAULT_MAXSIZE)
}

impl TryFrom<RawConfig> for CacheConfig {
    type Error = Error;

    fn try_from(raw: RawConfig) -> Result<Self> {
        let maxsize = match &raw.maxsize {
            serde_json::Value::Null => MaxSize::Unbounded,
            serde_json::Value::Number(n) => match (n.as_u64(), n.as_i64()) {
                (Some(n), _) => usize::try_from(n).map(MaxSize::bounded).map_err(|_| {
                    Error::InvalidConfiguration(format!("maxsize {} is too large", n))
                })?,
                (None, Some(n)) => MaxSize::from_signed(n)?,
                (None, None) => {
                    return Err(Error::InvalidConfiguration(format!(
                        "expected an integer or null for maxsize, got {}",
                        n
                    )))
                }
            },
            other => {
                return Err(Error::InvalidConfiguration(format!(
                    "expected an integer or null for maxsize, got {}",
                    other
                )))
            }
        };

        Ok(Self {
            maxsize,
            typed: raw.typed,
            single_flight: raw.single_flight,
        })
    }
}
