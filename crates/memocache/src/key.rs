//! Cache keys built from call arguments
//!
//! A call is described by [`CallArgs`]: positional [`Arg`] values followed
//! by named ones. [`make_key`] flattens a call into one [`CacheKey`]:
//!
//! ```text
//!   f(1, 2.5, x=3)              -> [1, 2.5, <kw>, "x", 3]
//!   f(1, 2.5, x=3)  typed=true  -> [1, 2.5, <kw>, "x", 3, int, float, int]
//! ```
//!
//! Integers and floats with the same numeric value compare and hash equal,
//! so `f(3)` and `f(3.0)` share a key unless `typed` is set.

use std::fmt;
use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::Arc;
use ahash::RandomState;

/// A dynamically-typed argument value
#[derive(Debug, Clone)]
pub enum Arg {
    /// Absent value
    None,
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Floating point number
    Float(f64),
    /// Text
    Str(String),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// Ordered group of values
    Tuple(Vec<Arg>),
}

/// Type tag of an [`Arg`], used by typed keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgType {
    /// [`Arg::None`]
    None,
    /// [`Arg::Bool`]
    Bool,
    /// [`Arg::Int`]
    Int,
    /// [`Arg::Float`]
    Float,
    /// [`Arg::Str`]
    Str,
    /// [`Arg::Bytes`]
    Bytes,
    /// [`Arg::Tuple`]
    Tuple,
}

impl Arg {
    /// Type tag of this value
    pub fn arg_type(&self) -> ArgType {
        match self {
            Arg::None => ArgType::None,
            Arg::Bool(_) => ArgType::Bool,
            Arg::Int(_) => ArgType::Int,
            Arg::Float(_) => ArgType::Float,
            Arg::Str(_) => ArgType::Str,
            Arg::Bytes(_) => ArgType::Bytes,
            Arg::Tuple(_) => ArgType::Tuple,
        }
    }

    /// Integer value, if this is an integer or an integral float
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Arg::Int(i) => Some(*i),
            Arg::Float(f) => integral(*f),
            _ => None,
        }
    }

    /// Numeric value as a float
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Arg::Int(i) => Some(*i as f64),
            Arg::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Text value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// `f` as an `i64` when it has no fractional part and fits
fn integral(f: f64) -> Option<i64> {
    // 2^63 is the first float above i64::MAX
    const BOUND: f64 = 9_223_372_036_854_775_808.0;
    if f.fract() == 0.0 && (-BOUND..BOUND).contains(&f) {
        Some(f as i64)
    } else {
        None
    }
}

impl PartialEq for Arg {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Arg::None, Arg::None) => true,
            (Arg::Bool(a), Arg::Bool(b)) => a == b,
            (Arg::Int(a), Arg::Int(b)) => a == b,
            (Arg::Float(a), Arg::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Arg::Int(i), Arg::Float(f)) | (Arg::Float(f), Arg::Int(i)) => integral(*f) == Some(*i),
            (Arg::Str(a), Arg::Str(b)) => a == b,
            (Arg::Bytes(a), Arg::Bytes(b)) => a == b,
            (Arg::Tuple(a), Arg::Tuple(b)) => a == b,
            _ => false,
        }
    }
}

// NaN is treated as equal to itself so keys stay usable in a map
impl Eq for Arg {}

impl Hash for Arg {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Arg::None => state.write_u8(0),
            Arg::Bool(b) => {
                state.write_u8(1);
                b.hash(state);
            }
            Arg::Int(i) => {
                state.write_u8(2);
                i.hash(state);
            }
            Arg::Float(f) => match integral(*f) {
                // Same bytes as the equal `Int`
                Some(i) => {
                    state.write_u8(2);
                    i.hash(state);
                }
                None => {
                    state.write_u8(3);
                    let bits = if f.is_nan() { f64::NAN.to_bits() } else { f.to_bits() };
                    bits.hash(state);
                }
            },
            Arg::Str(s) => {
                state.write_u8(4);
                s.hash(state);
            }
            Arg::Bytes(b) => {
                state.write_u8(5);
                b.hash(state);
            }
            Arg::Tuple(items) => {
                state.write_u8(6);
                items.hash(state);
            }
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::None => f.write_str("None"),
            Arg::Bool(b) => write!(f, "{}", b),
            Arg::Int(i) => write!(f, "{}", i),
            Arg::Float(x) => write!(f, "{:?}", x),
            Arg::Str(s) => write!(f, "{:?}", s),
            Arg::Bytes(b) => write!(f, "b{:?}", String::from_utf8_lossy(b)),
            Arg::Tuple(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str(")")
            }
        }
    }
}

impl From<()> for Arg {
    fn from(_: ()) -> Self {
        Arg::None
    }
}

impl From<bool> for Arg {
    fn from(b: bool) -> Self {
        Arg::Bool(b)
    }
}

impl From<i64> for Arg {
    fn from(i: i64) -> Self {
        Arg::Int(i)
    }
}

impl From<i32> for Arg {
    fn from(i: i32) -> Self {
        Arg::Int(i64::from(i))
    }
}

impl From<u32> for Arg {
    fn from(i: u32) -> Self {
        Arg::Int(i64::from(i))
    }
}

impl From<f64> for Arg {
    fn from(f: f64) -> Self {
        Arg::Float(f)
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::Str(s.to_string())
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Arg::Str(s)
    }
}

impl From<Vec<u8>> for Arg {
    fn from(b: Vec<u8>) -> Self {
        Arg::Bytes(b)
    }
}

impl From<Vec<Arg>> for Arg {
    fn from(items: Vec<Arg>) -> Self {
        Arg::Tuple(items)
    }
}

impl<T: Into<Arg>> From<Option<T>> for Arg {
    fn from(value: Option<T>) -> Self {
        value.map_or(Arg::None, Into::into)
    }
}

/// Arguments of one call: positional values, then named values in call order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    args: Vec<Arg>,
    kwargs: Vec<(String, Arg)>,
}

impl CallArgs {
    /// A call with no arguments
    pub fn new() -> Self {
        Self::default()
    }

    /// A call with the given positional arguments
    pub fn positional<I, A>(args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Arg>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            kwargs: Vec::new(),
        }
    }

    /// Append a positional argument
    pub fn arg(mut self, value: impl Into<Arg>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Append a named argument
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Arg>) -> Self {
        self.kwargs.push((name.into(), value.into()));
        self
    }

    /// Positional arguments
    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    /// Named arguments in call order
    pub fn kwargs(&self) -> &[(String, Arg)] {
        &self.kwargs
    }

    /// Positional argument at `index`
    pub fn get(&self, index: usize) -> Option<&Arg> {
        self.args.get(index)
    }

    /// Named argument `name`
    pub fn named(&self, name: &str) -> Option<&Arg> {
        self.kwargs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyPart {
    Value(Arg),
    // Separates positional from named arguments
    KwMark,
    Name(String),
    Type(ArgType),
}

/// Canonical, hashable key for one call
///
/// The hash is computed once when the key is built; clones share the parts.
#[derive(Clone)]
pub struct CacheKey {
    parts: Arc<[KeyPart]>,
    hash: u64,
}

impl CacheKey {
    /// Build the key for `call`
    pub fn new(call: &CallArgs, typed: bool) -> Self {
        let mut parts = Vec::with_capacity(key_len(call, typed));
        parts.extend(call.args.iter().cloned().map(KeyPart::Value));

        if !call.kwargs.is_empty() {
            parts.push(KeyPart::KwMark);
            for (name, value) in &call.kwargs {
                parts.push(KeyPart::Name(name.clone()));
                parts.push(KeyPart::Value(value.clone()));
            }
        }

        if typed {
            parts.extend(call.args.iter().map(|v| KeyPart::Type(v.arg_type())));
            parts.extend(call.kwargs.iter().map(|(_, v)| KeyPart::Type(v.arg_type())));
        }

        let mut hasher = key_hasher().build_hasher();
        parts.hash(&mut hasher);
        let hash = hasher.finish();

        Self {
            parts: parts.into(),
            hash,
        }
    }

    /// Number of flattened parts (values, names, markers and type tags)
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Check if the key describes a call without arguments
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

fn key_len(call: &CallArgs, typed: bool) -> usize {
    let mut len = call.args.len();
    if !call.kwargs.is_empty() {
        len += 1 + 2 * call.kwargs.len();
    }
    if typed {
        len += call.args.len() + call.kwargs.len();
    }
    len
}

// Fixed seeds: equal keys must hash equal for the life of the process
fn key_hasher() -> RandomState {
    RandomState::with_seeds(
        0x243f_6a88_85a3_08d3,
        0x1319_8a2e_0370_7344,
        0xa409_3822_299f_31d0,
        0x082e_fa98_ec4e_6c89,
    )
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.parts == other.parts
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.parts.iter()).finish()
    }
}

/// Build the cache key for a call
pub fn make_key(call: &CallArgs, typed: bool) -> CacheKey {
    CacheKey::new(call, typed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = RandomState::with_seeds(1, 2, 3, 4).build_hasher();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_int_float_equality() {
        assert_eq!(Arg::Int(3), Arg::Float(3.0));
        assert_eq!(hash_of(&Arg::Int(3)), hash_of(&Arg::Float(3.0)));
        assert_ne!(Arg::Int(3), Arg::Float(3.5));
        assert_eq!(Arg::Float(0.0), Arg::Float(-0.0));
        assert_eq!(hash_of(&Arg::Float(0.0)), hash_of(&Arg::Float(-0.0)));
        assert_eq!(Arg::Float(f64::NAN), Arg::Float(f64::NAN));
        assert_ne!(Arg::Int(i64::MAX), Arg::Float(9_223_372_036_854_775_808.0));
        assert_ne!(Arg::Int(1), Arg::Bool(true));
    }

    #[test]
    fn test_untyped_key_merges_numeric_types() {
        let a = make_key(&CallArgs::new().arg(3), false);
        let b = make_key(&CallArgs::new().arg(3.0), false);
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_typed_key_separates_types() {
        let a = make_key(&CallArgs::new().arg(3), true);
        let b = make_key(&CallArgs::new().arg(3.0), true);
        assert_ne!(a, b);

        let a = make_key(&CallArgs::new().kwarg("x", 3), true);
        let b = make_key(&CallArgs::new().kwarg("x", 3.0), true);
        assert_ne!(a, b);
    }

    #[test]
    fn test_named_args_are_distinct_from_positional() {
        let positional = make_key(&CallArgs::new().arg("x").arg(1), false);
        let named = make_key(&CallArgs::new().kwarg("x", 1), false);
        assert_ne!(positional, named);
    }

    #[test]
    fn test_named_arg_order_matters() {
        let ab = make_key(&CallArgs::new().kwarg("a", 1).kwarg("b", 2), false);
        let ba = make_key(&CallArgs::new().kwarg("b", 2).kwarg("a", 1), false);
        assert_ne!(ab, ba);
    }

    #[test]
    fn test_key_layout() {
        let call = CallArgs::positional([1, 2]).kwarg("x", 3.5);
        assert_eq!(make_key(&call, false).len(), 5);
        assert_eq!(make_key(&call, true).len(), 8);
        assert!(make_key(&CallArgs::new(), false).is_empty());
    }

    #[test]
    fn test_keys_in_set() {
        let mut set = HashSet::new();
        set.insert(make_key(&CallArgs::new().arg(1).arg("a"), false));
        set.insert(make_key(&CallArgs::new().arg(1.0).arg("a"), false));
        set.insert(make_key(&CallArgs::new().arg(Arg::Tuple(vec![1.into(), 2.into()])), false));
        set.insert(make_key(&CallArgs::new().arg(Arg::Tuple(vec![1.0.into(), 2.into()])), false));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_call_args_accessors() {
        let call = CallArgs::new().arg(7).kwarg("name", "bob").kwarg("flag", Option::<bool>::None);
        assert_eq!(call.get(0).and_then(Arg::as_i64), Some(7));
        assert_eq!(call.named("name").and_then(Arg::as_str), Some("bob"));
        assert_eq!(call.named("flag"), Some(&Arg::None));
        assert_eq!(call.named("missing"), None);
        assert_eq!(call.args().len(), 1);
        assert_eq!(call.kwargs().len(), 2);
    }

    #[test]
    fn test_arg_display() {
        let arg = Arg::Tuple(vec![Arg::Int(1), Arg::Float(2.0), Arg::from("x"), Arg::None]);
        assert_eq!(arg.to_string(), "(1, 2.0, \"x\", None)");
    }
}
