//! # Serializing and parsing
//!
//! One-call entry points over [`Serializer`] and [`Parser`]. Each call builds a
//! context from the store, runs one session and drops both; callers doing many calls
//! with the same options should build the context once instead.
//!
//! # Example
//!
//! ```
//! use marshal::prelude::*;
//!
//! #[derive(Describe, Default, PartialEq, Debug)]
//! struct Point {
//!     x: i32,
//!     y: i32,
//! }
//!
//! let p = Point { x: 1, y: -2 };
//!
//! let mut out = Vec::new();
//! let written = serialize(Format::Xml, &p, &mut out, PropertyStore::empty()).unwrap();
//! assert_eq!(written, out.len());
//! assert_eq!(
//!     String::from_utf8(out).unwrap(),
//!     r#"<object><x _type="number">1</x><y _type="number">-2</y></object>"#
//! );
//!
//! let back: Point = parse(Format::Uon, "(x=1,y=-2)".as_bytes(), PropertyStore::empty()).unwrap();
//! assert_eq!(back, p);
//!
//! // the shape of the input does not need to be known
//! let v = parse_value(Format::Json, r#"{"x":1,"y":-2}"#.as_bytes(), PropertyStore::empty()).unwrap();
//! assert_eq!(v.get("y"), Some(&Value::from(-2)));
//! ```

pub mod json;
pub mod uon;
pub mod xml;

pub(crate) mod constants;
pub(crate) mod de;
pub(crate) mod ser;

use crate::{
    config::PropertyStore,
    context::{Format, Parser, Serializer},
    descriptor::Describe,
    errors::*,
    Value,
};
use std::{
    io::{Read, Write},
    sync::Arc,
};

/// Writes `value` to `sink` in `format`, returning the number of bytes written.
pub fn serialize<T: Describe, W: Write>(
    format: Format,
    value: &T,
    sink: W,
    store: Arc<PropertyStore>,
) -> Result<usize, Error> {
    Ok(Serializer::new(format, store)?.serialize(value, sink)?)
}

/// Writes `value` as a string in `format`, with default options.
pub fn to_string<T: Describe>(format: Format, value: &T) -> Result<String, Error> {
    Ok(Serializer::new(format, PropertyStore::empty())?.to_string(value)?)
}

/// Reads a `T` from `source`.
pub fn parse<T: Describe, R: Read>(format: Format, source: R, store: Arc<PropertyStore>) -> Result<T, Error> {
    Ok(Parser::new(format, store)?.parse(source)?)
}

/// Reads a `T` from `text`, with default options.
pub fn from_str<T: Describe>(format: Format, text: &str) -> Result<T, Error> {
    Ok(Parser::new(format, PropertyStore::empty())?.parse_str(text)?)
}

/// Reads a dynamic value from `source`.
pub fn parse_value<R: Read>(format: Format, source: R, store: Arc<PropertyStore>) -> Result<Value, Error> {
    parse::<Value, R>(format, source, store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::*, vecmap::*};

    fn sample() -> Value {
        let inner: ObjectList = vec![Value::from(true), Value::Null, Value::from("a b")].into_iter().collect();
        vec![
            ("n", Value::from(1.5)),
            ("s", Value::from("x")),
            ("l", Value::from(inner)),
        ]
        .into_iter()
        .collect::<ObjectMap>()
        .into()
    }

    #[test]
    fn every_format_writes_the_same_tree() {
        let v = sample();
        assert_eq!(
            to_string(Format::Json, &v).unwrap(),
            r#"{"n":1.5,"s":"x","l":[true,null,"a b"]}"#
        );
        assert_eq!(to_string(Format::Uon, &v).unwrap(), "(n=1.5,s=x,l=@(true,null,a b))");
        assert_eq!(
            to_string(Format::UrlEncoding, &v).unwrap(),
            "n=1.5&s=x&l=@(true,null,a+b)"
        );
        assert_eq!(
            to_string(Format::Xml, &v).unwrap(),
            concat!(
                r#"<object><n _type="number">1.5</n><s>x</s>"#,
                r#"<l _type="array"><boolean>true</boolean><null/><string>a b</string></l></object>"#
            )
        );
    }

    #[test]
    fn every_format_reads_it_back() {
        let v = sample();
        for &format in &[Format::Json, Format::Xml, Format::Uon, Format::UrlEncoding] {
            let text = to_string(format, &v).unwrap();
            let back = parse_value(format, text.as_bytes(), PropertyStore::empty()).unwrap();
            assert_eq!(back, v, "{} through {}", text, format);
        }
    }

    #[test]
    fn errors_are_wrapped() {
        match from_str::<Vec<i32>>(Format::Json, "[1") {
            Err(Error::Parse(e)) => assert_eq!(e.kind, ParseErrorKind::Unterminated("array")),
            other => panic!("unexpected {:?}", other),
        }

        let bad = PropertyStore::builder().set(SERIALIZER_MAX_DEPTH, 0).build();
        match serialize(Format::Json, &1, Vec::new(), bad) {
            Err(Error::Config(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }
}
