//! # marshal
//!
//! `marshal` converts structured Rust values to and from JSON, XML, UON and URL-encoded
//! form syntax. All formats share one model of types ([`descriptor`]), one serialization
//! traversal and one parsing traversal; each format only supplies its token layer.
//!
//! # Usage
//!
//! The trait [`Describe`] tells the engines how to traverse a type. It can usually be
//! derived:
//!
//! ```
//! use marshal::prelude::*;
//!
//! #[derive(Describe, Default, Debug, PartialEq)]
//! struct Person {
//!     name: String,
//!     age: u32,
//!     nicknames: Vec<String>,
//! }
//!
//! let ada = Person {
//!     name: "Ada".into(),
//!     age: 36,
//!     nicknames: vec!["Enchantress of Numbers".into()],
//! };
//!
//! let json = to_string(Format::Json, &ada).unwrap();
//! assert_eq!(json, r#"{"name":"Ada","age":36,"nicknames":["Enchantress of Numbers"]}"#);
//!
//! let back: Person = from_str(Format::Json, &json).unwrap();
//! assert_eq!(back, ada);
//!
//! let form = to_string(Format::UrlEncoding, &ada).unwrap();
//! assert_eq!(form, "name=Ada&age=36&nicknames=@(Enchantress+of+Numbers)");
//! ```
//!
//! # Configuration
//!
//! Every entry point takes its options from a [`PropertyStore`](config::PropertyStore).
//! Stores are immutable and shared; a [`Serializer`](context::Serializer) or
//! [`Parser`](context::Parser) resolves its options once, when it is created, and can
//! then be used from any number of threads. Each call runs in its own short-lived
//! session.
//!
//! ```
//! use marshal::prelude::*;
//!
//! let store = PropertyStore::builder()
//!     .set(SERIALIZER_USE_WHITESPACE, true)
//!     .build();
//! let ser = Serializer::new(Format::Json, store).unwrap();
//!
//! let v: Value = vec![1, 2].into_iter().collect::<ObjectList>().into();
//! assert_eq!(ser.to_string(&v).unwrap(), "[\n  1,\n  2\n]");
//! ```
//!
//! # Dynamic values
//!
//! Input of unknown shape can be parsed into a [`Value`]: a tree of nulls, booleans,
//! [`Number`]s, strings, [`ObjectList`]s and [`ObjectMap`]s.
//!
//! ```
//! use marshal::prelude::*;
//!
//! let v: Value = from_str(Format::Uon, "(a=1,b=@(true,null),c='x')").unwrap();
//! assert_eq!(v.get("a"), Some(&Value::from(1)));
//! assert_eq!(v.get("c").and_then(Value::as_str), Some("x"));
//! ```
//!
//! # Implementing `Describe`
//!
//! When deriving does not fit, build the descriptor by hand with
//! [`DescriptorBuilder`](descriptor::DescriptorBuilder); see the [`descriptor`] module.

#![warn(
    deprecated_in_future,
    unsafe_code,
    unused_labels,
    keyword_idents,
    missing_copy_implementations,
    macro_use_extern_crate,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces
)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::type_complexity)]

/// Procedural macros for deriving [`Describe`].
pub extern crate marshal_macro;

pub mod config;
pub mod context;
pub mod descriptor;
pub mod encoding;
pub mod errors;
pub mod number;
pub mod prelude;
pub mod rep;
pub mod util;
pub mod vecmap;

pub use descriptor::Describe;
pub use marshal_macro::Describe;

use std::fmt;
use vecmap::*;

#[derive(Eq, PartialEq, Clone, Hash, Debug)]
/// A value whose shape is only known at runtime.
///
/// # Example
///
/// ```
/// use marshal::prelude::*;
///
/// let v = Value::from(vec![("a", Value::from(1)), ("b", Value::Null)].into_iter().collect::<ObjectMap>());
///
/// assert_eq!(v.kind_name(), "object");
/// assert!(v.get("b").unwrap().is_null());
/// ```
pub enum Value {
    /// Null. Corresponds to [`None`].
    Null,
    /// Boolean.
    Bool(bool),
    /// Any number.
    Number(number::Number),
    /// A string.
    Text(String),
    /// A list of values.
    List(ObjectList),
    /// A string-keyed map of values, in insertion order.
    Map(ObjectMap),
}

use Value::*;

impl Default for Value {
    fn default() -> Self { Null }
}

impl Value {
    /// Indicates whether the value is [`Null`].
    ///
    /// # Example
    ///
    /// ```
    /// use marshal::Value::Null;
    ///
    /// assert!(Null.is_null());
    /// ```
    pub fn is_null(&self) -> bool {
        match self {
            Null => true,
            _ => false,
        }
    }

    /// Returns the boolean, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the number, if this is one.
    pub fn as_number(&self) -> Option<&number::Number> {
        match self {
            Number(n) => Some(n),
            _ => None,
        }
    }

    /// Returns the string, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the list, if this is one.
    pub fn as_list(&self) -> Option<&ObjectList> {
        match self {
            List(l) => Some(l),
            _ => None,
        }
    }

    /// Returns the map, if this is one.
    pub fn as_map(&self) -> Option<&ObjectMap> {
        match self {
            Map(m) => Some(m),
            _ => None,
        }
    }

    /// Looks up `key` if this is a map.
    pub fn get(&self, key: &str) -> Option<&Value> { self.as_map()?.get(key) }

    /// The name XML uses for this kind of value.
    ///
    /// # Example
    ///
    /// ```
    /// use marshal::prelude::*;
    ///
    /// assert_eq!(Value::from(1.5).kind_name(), "number");
    /// assert_eq!(Value::from("x").kind_name(), "string");
    /// ```
    pub fn kind_name(&self) -> &'static str {
        match self {
            Null => "null",
            Bool(_) => "boolean",
            Number(_) => "number",
            Text(_) => "string",
            List(_) => "array",
            Map(_) => "object",
        }
    }
}

impl fmt::Display for Value {
    /// Compact JSON.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Null => f.write_str("null"),
            Bool(b) => write!(f, "{}", b),
            Number(n) => write!(f, "{}", n),
            Text(s) => write!(f, "\"{}\"", encoding::json::escape(s, '"')),
            List(l) => {
                f.write_str("[")?;
                for (i, v) in l.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", v)?;
                }
                f.write_str("]")
            }
            Map(m) => {
                f.write_str("{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "\"{}\":{}", encoding::json::escape(k, '"'), v)?;
                }
                f.write_str("}")
            }
        }
    }
}

from_fn!(Value, bool, Bool);
from_fn!(Value, number::Number, Number);
from_fn!(Value, String, Text);
from_fn!(Value, &str, |s: &str| Text(s.to_owned()));
from_fn!(Value, char, |c: char| Text(c.to_string()));
from_fn!(Value, ObjectList, List);
from_fn!(Value, ObjectMap, Map);
from_fn!(Value, Vec<Value>, |v: Vec<Value>| List(ObjectList::from(v)));
from_fn!(Value, (), |_: ()| Null);

macro_rules! value_from_number {
    ($($t:ty),*) => {
        $(from_fn!(Value, $t, |n: $t| Number(number::Number::from(n)));)*
    };
}

value_from_number!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, half::f16);
value_from_number!(num_bigint::BigInt);

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(o: Option<T>) -> Value { o.map_or(Null, Into::into) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_compact_json() {
        let mut m = ObjectMap::new();
        m.insert("a\"b", vec![Value::from(1), Value::Null, Value::from(0.5)]);
        m.insert("t", "line\nbreak");
        assert_eq!(Value::from(m).to_string(), r#"{"a\"b":[1,null,0.5],"t":"line\nbreak"}"#);
    }

    #[test]
    fn option_into_value() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::Text("x".into()));
    }
}
