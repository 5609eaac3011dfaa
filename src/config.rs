//! Immutable, deduplicated configuration stores.
//!
//! Options are named `<Prefix>.<name>.<kind>`, where the kind suffix (`b` for booleans,
//! `i` for integers, `s` for strings, `m` for maps, `c` for class lists) documents the
//! expected value. Stores are built once and shared through an [`Arc`]. Building two
//! stores with the same content returns the same `Arc`.
//!
//! # Example
//!
//! ```
//! use marshal::config::*;
//! use std::sync::Arc;
//!
//! let a = PropertyStore::builder().set(SERIALIZER_MAX_DEPTH, 10).build();
//! let b = PropertyStore::builder().set(SERIALIZER_MAX_DEPTH, 10).build();
//!
//! assert!(Arc::ptr_eq(&a, &b));
//! assert_eq!(a.get_int(SERIALIZER_MAX_DEPTH, 100), Ok(10));
//! assert_eq!(a.get_bool(SERIALIZER_SORT_MAPS, false), Ok(false));
//! ```

use crate::{context::ParserListener, errors::ConfigError, from_fn, number::*, util::split_list};
use dashmap::DashMap;
use num_traits::ToPrimitive;
use std::{
    collections::{hash_map::DefaultHasher, BTreeMap},
    fmt,
    hash::{Hash, Hasher},
    sync::{Arc, OnceLock, Weak},
};

/// Downgrade unknown record properties to listener notifications.
pub const BEAN_IGNORE_UNKNOWN_PROPERTIES: &str = "BeanContext.ignoreUnknownBeanProperties.b";
/// Type name to comma-delimited list of the only properties to use.
pub const BEAN_INCLUDE_PROPERTIES: &str = "BeanContext.includeProperties.m";
/// Type name to comma-delimited list of properties to skip.
pub const BEAN_EXCLUDE_PROPERTIES: &str = "BeanContext.excludeProperties.m";
/// Depth limit for serialization.
pub const SERIALIZER_MAX_DEPTH: &str = "Serializer.maxDepth.i";
/// Pretty-print output.
pub const SERIALIZER_USE_WHITESPACE: &str = "Serializer.useWhitespace.b";
/// Omit null-valued record properties.
pub const SERIALIZER_TRIM_NULL_PROPERTIES: &str = "Serializer.trimNullProperties.b";
/// Emit mapping entries sorted by key.
pub const SERIALIZER_SORT_MAPS: &str = "Serializer.sortMaps.b";
/// Depth limit for parsing.
pub const PARSER_MAX_DEPTH: &str = "Parser.maxDepth.i";
/// Trim parsed text scalars and keys.
pub const PARSER_TRIM_STRINGS: &str = "Parser.trimStrings.b";
/// Comma-delimited list of listener classes to instantiate for every parser session.
pub const PARSER_LISTENERS: &str = "Parser.listeners.c";
/// Single quotes, and unquoted keys where possible.
pub const JSON_SIMPLE_MODE: &str = "JsonSerializer.simpleMode.b";
/// Percent-encode UON output.
pub const UON_ENCODE_CHARS: &str = "UonSerializer.encodeChars.b";
/// Percent-decode UON input.
pub const UON_DECODE_CHARS: &str = "UonParser.decodeChars.b";

/// The default for both depth limits.
pub const DEFAULT_MAX_DEPTH: i64 = 100;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
/// A single option value.
pub enum PropertyValue {
    /// A boolean.
    Bool(bool),
    /// A string.
    Str(String),
    /// A number.
    Num(Number),
    /// The name of a registered class.
    Class(String),
    /// A nested map, e.g. type name to property list.
    Map(BTreeMap<String, PropertyValue>),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PropertyValue::Bool(b) => write!(f, "{}", b),
            PropertyValue::Str(s) | PropertyValue::Class(s) => f.write_str(s),
            PropertyValue::Num(n) => write!(f, "{}", n),
            PropertyValue::Map(m) => {
                f.write_str("{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}={}", k, v)?;
                }
                f.write_str("}")
            }
        }
    }
}

from_fn!(PropertyValue, bool, PropertyValue::Bool);
from_fn!(PropertyValue, String, PropertyValue::Str);
from_fn!(PropertyValue, &str, |s: &str| PropertyValue::Str(s.to_owned()));
from_fn!(PropertyValue, i32, |i: i32| PropertyValue::Num(Number::from(i)));
from_fn!(PropertyValue, i64, |i: i64| PropertyValue::Num(Number::from(i)));
from_fn!(PropertyValue, usize, |i: usize| PropertyValue::Num(Number::from(i)));
from_fn!(PropertyValue, Number, PropertyValue::Num);
from_fn!(PropertyValue, BTreeMap<String, PropertyValue>, PropertyValue::Map);

impl<'a> From<Vec<(&'a str, &'a str)>> for PropertyValue {
    fn from(v: Vec<(&'a str, &'a str)>) -> Self {
        PropertyValue::Map(
            v.into_iter()
                .map(|(k, v)| (k.to_owned(), PropertyValue::from(v)))
                .collect(),
        )
    }
}

/// An immutable set of options.
///
/// Equality is by content; the content hash is computed once, at build time.
#[derive(Debug)]
pub struct PropertyStore {
    map: BTreeMap<String, PropertyValue>,
    hash: u64,
}

impl PartialEq for PropertyStore {
    fn eq(&self, other: &Self) -> bool { self.hash == other.hash && self.map == other.map }
}

impl Eq for PropertyStore {}

impl Hash for PropertyStore {
    fn hash<H: Hasher>(&self, state: &mut H) { state.write_u64(self.hash) }
}

fn content_hash(map: &BTreeMap<String, PropertyValue>) -> u64 {
    let mut h = DefaultHasher::new();
    map.hash(&mut h);
    h.finish()
}

fn stores() -> &'static DashMap<u64, Vec<Weak<PropertyStore>>> {
    static STORES: OnceLock<DashMap<u64, Vec<Weak<PropertyStore>>>> = OnceLock::new();
    STORES.get_or_init(DashMap::new)
}

impl PropertyStore {
    /// Creates an empty builder.
    pub fn builder() -> PropertyStoreBuilder { PropertyStoreBuilder::default() }

    /// The store with no options set.
    pub fn empty() -> Arc<PropertyStore> { Self::builder().build() }

    /// Creates a builder initialized with this store's options.
    pub fn to_builder(&self) -> PropertyStoreBuilder {
        PropertyStoreBuilder {
            map: self.map.clone(),
        }
    }

    /// The precomputed content hash.
    pub fn hash_code(&self) -> u64 { self.hash }

    /// Returns the raw value of an option.
    pub fn get(&self, name: &str) -> Option<&PropertyValue> { self.map.get(name) }

    /// Returns the raw value of an option, or `default` if it is not set.
    pub fn get_or<'a>(&'a self, name: &str, default: &'a PropertyValue) -> &'a PropertyValue {
        self.map.get(name).unwrap_or(default)
    }

    /// Iterates over all options in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> { self.map.iter().map(|(k, v)| (k.as_str(), v)) }

    /// Reads a boolean option. Strings `true` and `false` are accepted.
    pub fn get_bool(&self, name: &str, default: bool) -> Result<bool, ConfigError> {
        match self.map.get(name) {
            None => Ok(default),
            Some(PropertyValue::Bool(b)) => Ok(*b),
            Some(PropertyValue::Str(s)) if s.eq_ignore_ascii_case("true") => Ok(true),
            Some(PropertyValue::Str(s)) if s.eq_ignore_ascii_case("false") => Ok(false),
            Some(other) => Err(wrong_kind(name, "boolean", other)),
        }
    }

    /// Reads an integer option. Numeric strings are accepted.
    pub fn get_int(&self, name: &str, default: i64) -> Result<i64, ConfigError> {
        match self.map.get(name) {
            None => Ok(default),
            Some(PropertyValue::Num(n)) if n.is_integer() => n.to_i64().ok_or_else(|| ConfigError::Invalid {
                name: name.to_owned(),
                reason: format!("{} does not fit in 64 bits", n),
            }),
            Some(PropertyValue::Str(s)) => {
                parse_integer::<i64>(s).map_err(|_| wrong_kind(name, "integer", &PropertyValue::Str(s.clone())))
            }
            Some(other) => Err(wrong_kind(name, "integer", other)),
        }
    }

    /// Reads a string option. Any scalar is rendered as text.
    pub fn get_str(&self, name: &str, default: &str) -> Result<String, ConfigError> {
        match self.map.get(name) {
            None => Ok(default.to_owned()),
            Some(v @ PropertyValue::Map(_)) => Err(wrong_kind(name, "string", v)),
            Some(other) => Ok(other.to_string()),
        }
    }

    /// Reads a map option. An empty string counts as an empty map.
    pub fn get_map(&self, name: &str) -> Result<BTreeMap<String, PropertyValue>, ConfigError> {
        match self.map.get(name) {
            None => Ok(BTreeMap::new()),
            Some(PropertyValue::Map(m)) => Ok(m.clone()),
            Some(PropertyValue::Str(s)) if s.trim().is_empty() => Ok(BTreeMap::new()),
            Some(other) => Err(wrong_kind(name, "map", other)),
        }
    }

    /// Reads a comma-delimited list option.
    pub fn get_list(&self, name: &str) -> Result<Vec<String>, ConfigError> {
        match self.map.get(name) {
            None => Ok(Vec::new()),
            Some(PropertyValue::Str(s)) => Ok(split_list(s)),
            Some(PropertyValue::Class(c)) => Ok(vec![c.clone()]),
            Some(other) => Err(wrong_kind(name, "list", other)),
        }
    }

    /// Reads a class-list option, resolving every name against the class registry.
    pub fn get_listeners(&self, name: &str) -> Result<Vec<Arc<dyn ParserListener>>, ConfigError> {
        self.get_list(name)?
            .iter()
            .map(|class| -> Result<Arc<dyn ParserListener>, ConfigError> {
                let factory = classes()
                    .get(class.as_str())
                    .map(|f| *f.value())
                    .ok_or_else(|| ConfigError::UnknownClass {
                        name: name.to_owned(),
                        class: class.clone(),
                    })?;
                Ok(factory())
            })
            .collect()
    }
}

fn wrong_kind(name: &str, expected: &'static str, found: &PropertyValue) -> ConfigError {
    ConfigError::WrongKind {
        name: name.to_owned(),
        expected,
        found: found.to_string(),
    }
}

#[derive(Clone, Debug, Default)]
/// Collects options for a [`PropertyStore`].
pub struct PropertyStoreBuilder {
    map: BTreeMap<String, PropertyValue>,
}

impl PropertyStoreBuilder {
    /// Sets an option, replacing any previous value.
    pub fn set<V: Into<PropertyValue>>(mut self, name: &str, value: V) -> Self {
        self.map.insert(name.to_owned(), value.into());
        self
    }

    /// Sets a class-reference option.
    pub fn set_class(self, name: &str, class: &str) -> Self { self.set(name, PropertyValue::Class(class.to_owned())) }

    /// Removes an option.
    pub fn remove(mut self, name: &str) -> Self {
        self.map.remove(name);
        self
    }

    /// Copies every option of `other` into this builder, overriding existing values.
    pub fn merge(mut self, other: &PropertyStore) -> Self {
        for (k, v) in other.map.iter() {
            self.map.insert(k.clone(), v.clone());
        }
        self
    }

    /// Freezes the options, reusing an existing store with the same content if one is
    /// still alive.
    pub fn build(self) -> Arc<PropertyStore> {
        let hash = content_hash(&self.map);
        // drop buckets whose stores are all gone, before any entry guard is held
        stores().retain(|_, bucket| {
            bucket.retain(|w| w.strong_count() > 0);
            !bucket.is_empty()
        });
        let mut bucket = stores().entry(hash).or_insert_with(Vec::new);
        bucket.retain(|w| w.strong_count() > 0);

        for weak in bucket.iter() {
            if let Some(existing) = weak.upgrade() {
                if existing.map == self.map {
                    log::debug!("reusing property store {:016x}", hash);
                    return existing;
                }
            }
        }

        let store = Arc::new(PropertyStore { map: self.map, hash });
        bucket.push(Arc::downgrade(&store));
        store
    }
}

/// Creates a listener instance for a class named in [`PARSER_LISTENERS`].
pub type ListenerFactory = fn() -> Arc<dyn ParserListener>;

fn classes() -> &'static DashMap<String, ListenerFactory> {
    static CLASSES: OnceLock<DashMap<String, ListenerFactory>> = OnceLock::new();
    CLASSES.get_or_init(DashMap::new)
}

/// Registers a listener class under `name`, so that stores can refer to it.
pub fn register_class(name: &str, factory: ListenerFactory) {
    if classes().insert(name.to_owned(), factory).is_some() {
        log::warn!("listener class `{}` registered twice; keeping the latest", name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_by_content() {
        let a = PropertyStore::builder()
            .set(PARSER_TRIM_STRINGS, true)
            .set(PARSER_MAX_DEPTH, 5)
            .build();
        let b = PropertyStore::builder()
            .set(PARSER_MAX_DEPTH, 5)
            .set(PARSER_TRIM_STRINGS, true)
            .build();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.hash_code(), b.hash_code());

        let c = a.to_builder().remove(PARSER_MAX_DEPTH).build();
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(c.get(PARSER_MAX_DEPTH), None);
    }

    #[test]
    fn dropped_stores_leave_the_cache() {
        for i in 0..200i64 {
            drop(PropertyStore::builder().set("Test.dropped.i", i).build());
        }
        let kept = PropertyStore::builder().set("Test.dropped.i", -1i64).build();
        // other tests may hold a few stores of their own
        assert!(stores().len() < 50, "{} buckets left", stores().len());
        assert!(stores().get(&kept.hash_code()).is_some());
    }

    #[test]
    fn typed_getters() {
        let s = PropertyStore::builder()
            .set("x.b", "true")
            .set("x.i", "0x10")
            .set("bad.i", "x")
            .build();
        assert_eq!(s.get_bool("x.b", false), Ok(true));
        assert_eq!(s.get_int("x.i", 0), Ok(16));
        assert_eq!(s.get_int("missing.i", 7), Ok(7));
        match s.get_int("bad.i", 0) {
            Err(ConfigError::WrongKind { name, expected, .. }) => {
                assert_eq!(name, "bad.i");
                assert_eq!(expected, "integer");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(s.get_map("x.b").is_err());
        assert_eq!(s.get_str("x.i", ""), Ok("0x10".to_owned()));
    }

    #[test]
    fn merge_overrides() {
        let base = PropertyStore::builder().set("a.i", 1).set("b.i", 2).build();
        let merged = PropertyStore::builder().set("a.i", 5).set("c.i", 3).merge(&base).build();
        assert_eq!(merged.get_int("a.i", 0), Ok(1));
        assert_eq!(merged.get_int("c.i", 0), Ok(3));
    }

    #[test]
    fn unknown_class_is_config_error() {
        let s = PropertyStore::builder()
            .set(PARSER_LISTENERS, "no.such.Listener")
            .build();
        match s.get_listeners(PARSER_LISTENERS) {
            Err(ConfigError::UnknownClass { class, .. }) => assert_eq!(class, "no.such.Listener"),
            other => panic!("unexpected {:?}", other.map(|v| v.len())),
        }
    }
}
