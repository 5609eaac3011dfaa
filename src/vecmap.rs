//! The containers behind dynamic [`Value`]s: [`ObjectMap`] and [`ObjectList`].
//!
//! An [`ObjectMap`] is a vector of key/value pairs in first-insertion order, with a hash
//! index over the keys. Inserting an existing key replaces its value in place, so the
//! key keeps the position it was first seen at.
//!
//! # Example
//!
//! ```
//! use marshal::prelude::*;
//!
//! let mut map = ObjectMap::new();
//! map.insert("b", 1);
//! map.insert("a", 2);
//! map.insert("b", 3);
//!
//! let keys: Vec<&str> = map.keys().collect();
//! assert_eq!(keys, vec!["b", "a"]);
//! assert_eq!(map.get("b"), Some(&Value::from(3)));
//! ```

use crate::Value;
use hashbrown::HashMap;
use std::{
    collections::BTreeMap,
    hash::{Hash, Hasher},
    iter::FromIterator,
    ops::{Deref, DerefMut, Index},
    slice::Iter,
    vec::IntoIter,
};

#[derive(Clone, Debug, Default)]
/// A string-keyed map of [`Value`]s that remembers insertion order.
///
/// Equality and hashing consider entries in order.
///
/// See also: [module level documentation](`crate::vecmap`).
pub struct ObjectMap {
    entries: Vec<(String, Value)>,
    index: HashMap<String, usize>,
}

impl ObjectMap {
    /// Creates an empty map.
    pub fn new() -> Self { Self::default() }

    /// Creates an empty map with room for `cap` entries.
    pub fn with_capacity(cap: usize) -> Self {
        ObjectMap {
            entries: Vec::with_capacity(cap),
            index: HashMap::with_capacity(cap),
        }
    }

    /// Returns length.
    pub fn len(&self) -> usize { self.entries.len() }

    /// Indicates whether the map is empty.
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Inserts a value, returning the previous value under `key` if there was one.
    ///
    /// A replaced key keeps its original position.
    ///
    /// # Example
    ///
    /// ```
    /// use marshal::prelude::*;
    ///
    /// let mut map = ObjectMap::new();
    /// assert_eq!(map.insert("a", true), None);
    /// assert_eq!(map.insert("a", false), Some(Value::Bool(true)));
    /// assert_eq!(map.len(), 1);
    /// ```
    pub fn insert<K: Into<String>, V: Into<Value>>(&mut self, key: K, value: V) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.index.get(&key) {
            Some(&i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Returns the value under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> { self.index.get(key).map(|&i| &self.entries[i].1) }

    /// Returns a mutable reference to the value under `key`.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        let i = *self.index.get(key)?;
        Some(&mut self.entries[i].1)
    }

    /// Indicates whether `key` is present.
    pub fn contains_key(&self, key: &str) -> bool { self.index.contains_key(key) }

    /// Removes `key`, shifting later entries down by one.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let i = self.index.remove(key)?;
        let (_, v) = self.entries.remove(i);
        for slot in self.index.values_mut() {
            if *slot > i {
                *slot -= 1;
            }
        }
        Some(v)
    }

    /// Returns an [`Iter`] of the key value pairs, in insertion order.
    pub fn iter(&self) -> Iter<(String, Value)> { self.entries.iter() }

    /// Returns a mutable iterator over the values, with their keys, in insertion order.
    /// Keys stay read-only so the index cannot go stale.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Value)> {
        self.entries.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    /// The keys, in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> { self.entries.iter().map(|(k, _)| k.as_str()) }

    /// The values, in insertion order.
    pub fn values(&self) -> impl Iterator<Item = &Value> { self.entries.iter().map(|(_, v)| v) }

    /// The entries as a slice.
    pub fn as_slice(&self) -> &[(String, Value)] { &self.entries }
}

impl PartialEq for ObjectMap {
    fn eq(&self, other: &Self) -> bool { self.entries == other.entries }
}

impl Eq for ObjectMap {}

impl Hash for ObjectMap {
    fn hash<H: Hasher>(&self, state: &mut H) { self.entries.hash(state) }
}

impl Index<&str> for ObjectMap {
    type Output = Value;

    fn index(&self, key: &str) -> &Value { self.get(key).unwrap_or(&Value::Null) }
}

impl IntoIterator for ObjectMap {
    type IntoIter = IntoIter<(String, Value)>;
    type Item = (String, Value);

    fn into_iter(self) -> IntoIter<(String, Value)> { self.entries.into_iter() }
}

impl<'a> IntoIterator for &'a ObjectMap {
    type IntoIter = Iter<'a, (String, Value)>;
    type Item = &'a (String, Value);

    fn into_iter(self) -> Self::IntoIter { self.entries.iter() }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ObjectMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> ObjectMap {
        let iter = iter.into_iter();
        let mut map = ObjectMap::with_capacity(iter.size_hint().0);
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<K: Into<String>, V: Into<Value>> Extend<(K, V)> for ObjectMap {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K: Into<String>, V: Into<Value>> From<Vec<(K, V)>> for ObjectMap {
    fn from(v: Vec<(K, V)>) -> Self { Self::from_iter(v) }
}

impl<K: Into<String> + Ord, V: Into<Value>> From<BTreeMap<K, V>> for ObjectMap {
    fn from(bt: BTreeMap<K, V>) -> Self { Self::from_iter(bt) }
}

#[derive(Eq, PartialEq, Clone, Hash, Debug, Default)]
/// A growable, index-addressable list of [`Value`]s.
pub struct ObjectList(Vec<Value>);

impl ObjectList {
    /// Creates an empty list.
    pub fn new() -> Self { Self::default() }

    /// Consumes the list, returning the underlying vector.
    pub fn into_vec(self) -> Vec<Value> { self.0 }
}

impl Deref for ObjectList {
    type Target = Vec<Value>;

    fn deref(&self) -> &Vec<Value> { &self.0 }
}

impl DerefMut for ObjectList {
    fn deref_mut(&mut self) -> &mut Vec<Value> { &mut self.0 }
}

impl From<Vec<Value>> for ObjectList {
    fn from(v: Vec<Value>) -> Self { ObjectList(v) }
}

impl<V: Into<Value>> FromIterator<V> for ObjectList {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self { ObjectList(iter.into_iter().map(Into::into).collect()) }
}

impl IntoIterator for ObjectList {
    type IntoIter = IntoIter<Value>;
    type Item = Value;

    fn into_iter(self) -> IntoIter<Value> { self.0.into_iter() }
}

impl<'a> IntoIterator for &'a ObjectList {
    type IntoIter = Iter<'a, Value>;
    type Item = &'a Value;

    fn into_iter(self) -> Self::IntoIter { self.0.iter() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_change_in_place() {
        let mut m = ObjectMap::new();
        m.insert("a", 1);
        m.insert("b", 2);
        for (k, v) in m.iter_mut() {
            if k == "b" {
                *v = Value::from("two");
            }
        }
        assert_eq!(m.get("a"), Some(&Value::from(1)));
        assert_eq!(m.get("b"), Some(&Value::from("two")));
        assert_eq!(m.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn replacement_keeps_slot() {
        let mut m = ObjectMap::new();
        m.insert("x", 1);
        m.insert("y", 2);
        m.insert("z", 3);
        m.insert("x", 4);
        let entries: Vec<(&str, &Value)> = m.iter().map(|(k, v)| (k.as_str(), v)).collect();
        assert_eq!(
            entries,
            vec![("x", &Value::from(4)), ("y", &Value::from(2)), ("z", &Value::from(3))]
        );
    }

    #[test]
    fn remove_reindexes() {
        let mut m: ObjectMap = vec![("a", 1), ("b", 2), ("c", 3)].into();
        assert_eq!(m.remove("a"), Some(Value::from(1)));
        assert_eq!(m.get("c"), Some(&Value::from(3)));
        assert_eq!(m.remove("a"), None);
        m.insert("a", 5);
        assert_eq!(m.keys().collect::<Vec<_>>(), vec!["b", "c", "a"]);
        assert_eq!(m["missing"], Value::Null);
    }

    #[test]
    fn order_matters_for_equality() {
        let ab: ObjectMap = vec![("a", 1), ("b", 2)].into();
        let ba: ObjectMap = vec![("b", 2), ("a", 1)].into();
        assert_ne!(ab, ba);
        assert_eq!(ab, ab.clone());
    }

    #[test]
    fn list_is_a_vec() {
        let mut l: ObjectList = vec![1, 2].into_iter().collect();
        l.push(Value::from("three"));
        assert_eq!(l.len(), 3);
        assert_eq!(l[2], Value::from("three"));
    }
}
