//! The serialization traversal shared by every format.
//!
//! [`write_value`] walks a value through its [`TypeDescriptor`] and drives a
//! [`FormatWriter`], which only knows how to put tokens into its buffer.

use crate::{
    context::SerializerSession,
    descriptor::{Category, ScalarKind, TypeDescriptor},
    errors::SerializeError,
    number::Number,
    Value,
};
use bytes::BytesMut;
use std::any::{Any, TypeId};

#[derive(Copy, Clone, Debug, PartialEq)]
/// A scalar token.
pub(crate) enum Scalar<'a> {
    Bool(bool),
    Number(&'a Number),
    Text(&'a str),
}

impl<'a> Scalar<'a> {
    /// The scalar form of a dynamic value, if it has one.
    pub(crate) fn of(v: &'a Value) -> Option<Scalar<'a>> {
        match v {
            Value::Bool(b) => Some(Scalar::Bool(*b)),
            Value::Number(n) => Some(Scalar::Number(n)),
            Value::Text(s) => Some(Scalar::Text(s)),
            _ => None,
        }
    }
}

/// The token layer of one output format.
///
/// Writers own their buffer. Keys are always followed by exactly one value.
pub(crate) trait FormatWriter {
    /// Puts a null.
    fn put_null(&mut self);
    /// Puts a boolean, number or string.
    fn put_scalar(&mut self, v: Scalar);
    /// Opens a sequence.
    fn start_seq(&mut self);
    /// Closes the innermost sequence.
    fn end_seq(&mut self);
    /// Opens a map.
    fn start_map(&mut self);
    /// Puts the key of the next map entry.
    fn put_key(&mut self, key: &str);
    /// Closes the innermost map.
    fn end_map(&mut self);

    /// Offers an identity property of the map just opened. Returns `true` if the
    /// format wrote it, as an attribute, and the entry should not be written again.
    fn put_property_attr(&mut self, _name: &str, _v: Scalar) -> bool { false }

    /// Returns the output.
    fn finish(self) -> BytesMut
    where
        Self: Sized;
}

fn identity(v: &dyn Any, desc: &TypeDescriptor) -> (usize, TypeId) {
    (v as *const dyn Any as *const () as usize, desc.type_id())
}

fn mismatch(desc: &TypeDescriptor) -> SerializeError {
    SerializeError::Unserializable(desc.name().to_owned(), "value does not match its descriptor".into())
}

/// Writes `v`, whose type is described by `desc`.
pub(crate) fn write_value<W: FormatWriter>(
    s: &mut SerializerSession,
    w: &mut W,
    v: &dyn Any,
    desc: &TypeDescriptor,
) -> Result<(), SerializeError> {
    match desc.category() {
        Category::Scalar(ops) => match (ops.to_value)(v).ok_or_else(|| mismatch(desc))? {
            Value::Null => w.put_null(),
            val => write_dynamic(s, w, &val)?,
        },
        Category::Wrapped(ops) => {
            let text = (ops.to_text)(v).ok_or_else(|| mismatch(desc))?;
            w.put_scalar(Scalar::Text(&text));
        }
        Category::Optional(ops) | Category::Pointer(ops) => match (ops.get)(v).ok_or_else(|| mismatch(desc))? {
            None => w.put_null(),
            Some(inner) => write_value(s, w, inner, &ops.inner())?,
        },
        Category::Dynamic => {
            let val = v.downcast_ref::<Value>().ok_or_else(|| mismatch(desc))?;
            write_dynamic(s, w, val)?;
        }
        Category::Sequence(ops) => {
            let element = ops.element();
            s.nest(Some(identity(v, desc)), desc.name(), |s| {
                w.start_seq();
                for e in (ops.iter)(v).ok_or_else(|| mismatch(desc))? {
                    write_value(s, w, e, &element)?;
                }
                w.end_seq();
                Ok(())
            })?;
        }
        Category::Mapping(ops) => {
            let value_desc = ops.value();
            let mut entries: Vec<(String, &dyn Any)> = (ops.entries)(v).ok_or_else(|| mismatch(desc))?.collect();
            if s.context().settings().sort_maps {
                entries.sort_by(|a, b| a.0.cmp(&b.0));
            }
            s.nest(Some(identity(v, desc)), desc.name(), |s| {
                w.start_map();
                for (k, e) in entries {
                    w.put_key(&k);
                    write_value(s, w, e, &value_desc)?;
                }
                w.end_map();
                Ok(())
            })?;
        }
        Category::Record(ops) => {
            let ctx = s.context();
            let trim_nulls = ctx.settings().trim_nulls;
            s.nest(Some(identity(v, desc)), desc.name(), |s| {
                w.start_map();
                for p in ops.properties.iter() {
                    if p.is_ignorable() || !ctx.filter().allows(desc.name(), p.name()) {
                        continue;
                    }
                    let pv = p.read(v).ok_or_else(|| mismatch(desc))?;
                    let pd = p.descriptor();
                    if trim_nulls && is_null(pv, &pd) {
                        continue;
                    }
                    if p.is_identity() {
                        if let Some(val) = scalar_value(pv, &pd) {
                            if Scalar::of(&val).map_or(false, |sc| w.put_property_attr(p.name(), sc)) {
                                continue;
                            }
                        }
                    }
                    w.put_key(p.name());
                    write_value(s, w, pv, &pd)?;
                }
                w.end_map();
                Ok(())
            })?;
        }
        Category::Opaque => w.put_scalar(Scalar::Text(desc.name())),
    }
    Ok(())
}

/// Writes a dynamic value. Dynamic trees own their children, so they cannot be
/// cyclic, but they still count towards the depth limit.
pub(crate) fn write_dynamic<W: FormatWriter>(
    s: &mut SerializerSession,
    w: &mut W,
    v: &Value,
) -> Result<(), SerializeError> {
    match v {
        Value::Null => w.put_null(),
        Value::List(l) => s.nest(None, "ObjectList", |s| {
            w.start_seq();
            for e in l.iter() {
                write_dynamic(s, w, e)?;
            }
            w.end_seq();
            Ok(())
        })?,
        Value::Map(m) => {
            let mut entries: Vec<&(String, Value)> = m.iter().collect();
            if s.context().settings().sort_maps {
                entries.sort_by(|a, b| a.0.cmp(&b.0));
            }
            s.nest(None, "ObjectMap", |s| {
                w.start_map();
                for (k, e) in entries {
                    w.put_key(k);
                    write_dynamic(s, w, e)?;
                }
                w.end_map();
                Ok(())
            })?
        }
        scalar => {
            if let Some(sc) = Scalar::of(scalar) {
                w.put_scalar(sc);
            }
        }
    }
    Ok(())
}

/// Whether `v` would be written as a null.
fn is_null(v: &dyn Any, desc: &TypeDescriptor) -> bool {
    match desc.category() {
        Category::Optional(ops) | Category::Pointer(ops) => match (ops.get)(v) {
            Some(Some(inner)) => is_null(inner, &ops.inner()),
            _ => true,
        },
        Category::Scalar(ops) => ops.kind() == ScalarKind::Null,
        Category::Dynamic => v.downcast_ref::<Value>().map_or(true, Value::is_null),
        _ => false,
    }
}

/// The scalar `v` would be written as, looking through adapters.
fn scalar_value(v: &dyn Any, desc: &TypeDescriptor) -> Option<Value> {
    match desc.category() {
        Category::Optional(ops) | Category::Pointer(ops) => scalar_value((ops.get)(v)??, &ops.inner()),
        Category::Scalar(ops) => (ops.to_value)(v),
        Category::Wrapped(ops) => (ops.to_text)(v).map(Value::Text),
        Category::Dynamic => v.downcast_ref::<Value>().filter(|val| Scalar::of(val).is_some()).cloned(),
        _ => None,
    }
}
