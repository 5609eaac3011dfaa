//! Type descriptors: how the engines see a Rust type.
//!
//! Every type that can be serialized or parsed implements [`Describe`], usually through
//! `#[derive(Describe)]`. A [`TypeDescriptor`] records which [`Category`] the type falls
//! into and carries type-erased accessors the engines use to read and build values of
//! that type without knowing it statically.
//!
//! Descriptors are built on first request and cached for the life of the process; see
//! [`describe`].
//!
//! # Example
//!
//! ```
//! use marshal::prelude::*;
//!
//! #[derive(Default)]
//! struct Point {
//!     x: i32,
//!     y: i32,
//! }
//!
//! impl Describe for Point {
//!     fn describe() -> TypeDescriptor {
//!         DescriptorBuilder::<Point>::new()
//!             .property::<i32>("x", |p| &p.x, |p, v| p.x = v)
//!             .property::<i32>("y", |p| &p.y, |p, v| p.y = v)
//!             .constructor(Point::default)
//!             .finish()
//!     }
//! }
//!
//! let d = describe::<Point>();
//! assert_eq!(d.name(), "Point");
//! assert_eq!(d.kind_name(), "record");
//! assert_eq!(d.properties().len(), 2);
//! ```

use crate::Value;
use dashmap::DashMap;
use hashbrown::HashMap;
use std::{
    any::{type_name, Any, TypeId},
    fmt,
    marker::PhantomData,
    sync::{Arc, OnceLock},
};

/// A type-erased, owned value under construction.
pub type AnyBox = Box<dyn Any + Send>;

/// Lazily resolves a descriptor; lets recursive types refer to themselves.
pub type DescribeFn = fn() -> Arc<TypeDescriptor>;

type ToValueFn = Box<dyn Fn(&dyn Any) -> Option<Value> + Send + Sync>;
type ToTextFn = Arc<dyn Fn(&dyn Any) -> Option<String> + Send + Sync>;
type FromTextFn = Arc<dyn Fn(&str) -> Result<AnyBox, String> + Send + Sync>;
type IterFn =
    Box<dyn for<'a> Fn(&'a dyn Any) -> Option<Box<dyn Iterator<Item = &'a dyn Any> + 'a>> + Send + Sync>;
type EntriesFn = Box<
    dyn for<'a> Fn(&'a dyn Any) -> Option<Box<dyn Iterator<Item = (String, &'a dyn Any)> + 'a>> + Send + Sync,
>;
type ReadFn = Box<dyn for<'a> Fn(&'a dyn Any) -> Option<&'a dyn Any> + Send + Sync>;
type InnerFn = Box<dyn for<'a> Fn(&'a dyn Any) -> Option<Option<&'a dyn Any>> + Send + Sync>;
type WriteFn = Box<dyn Fn(&mut dyn Any, AnyBox) -> Result<(), String> + Send + Sync>;
type CollectFn = Box<dyn Fn(Vec<AnyBox>) -> Result<AnyBox, String> + Send + Sync>;
type CollectEntriesFn = Box<dyn Fn(Vec<(String, AnyBox)>) -> Result<AnyBox, String> + Send + Sync>;
type WrapFn = Box<dyn Fn(AnyBox) -> Result<AnyBox, String> + Send + Sync>;
type MakeFn = Box<dyn Fn() -> AnyBox + Send + Sync>;

fn erase_iter<F>(f: F) -> IterFn
where
    F: for<'a> Fn(&'a dyn Any) -> Option<Box<dyn Iterator<Item = &'a dyn Any> + 'a>> + Send + Sync + 'static,
{
    Box::new(f)
}

fn erase_entries<F>(f: F) -> EntriesFn
where
    F: for<'a> Fn(&'a dyn Any) -> Option<Box<dyn Iterator<Item = (String, &'a dyn Any)> + 'a>>
        + Send
        + Sync
        + 'static,
{
    Box::new(f)
}

fn erase_read<F>(f: F) -> ReadFn
where
    F: for<'a> Fn(&'a dyn Any) -> Option<&'a dyn Any> + Send + Sync + 'static,
{
    Box::new(f)
}

fn erase_inner<F>(f: F) -> InnerFn
where
    F: for<'a> Fn(&'a dyn Any) -> Option<Option<&'a dyn Any>> + Send + Sync + 'static,
{
    Box::new(f)
}

fn unbox<T: Any>(b: AnyBox) -> Result<T, String> {
    b.downcast::<T>()
        .map(|b| *b)
        .map_err(|_| format!("expected a `{}` value", type_name::<T>()))
}

/// Types the engines know how to traverse.
pub trait Describe: Send + Sync + 'static {
    /// Builds the descriptor for `Self`. Called once per type; use [`describe`] to get the
    /// cached descriptor.
    fn describe() -> TypeDescriptor;
}

/// Access to the descriptor of a value's type.
pub trait Marshal {
    /// The cached descriptor of `Self`.
    fn descriptor(&self) -> Arc<TypeDescriptor>;
}

impl<T: Describe> Marshal for T {
    fn descriptor(&self) -> Arc<TypeDescriptor> { describe::<T>() }
}

fn cache() -> &'static DashMap<TypeId, Arc<TypeDescriptor>> {
    static CACHE: OnceLock<DashMap<TypeId, Arc<TypeDescriptor>>> = OnceLock::new();
    CACHE.get_or_init(DashMap::new)
}

/// Returns the cached descriptor for `T`, building it on first use.
///
/// Concurrent first requests may both build a descriptor; only the first one stored is
/// ever returned.
pub fn describe<T: Describe>() -> Arc<TypeDescriptor> {
    let id = TypeId::of::<T>();
    if let Some(d) = cache().get(&id) {
        return d.value().clone();
    }

    // built outside any shard lock: building may describe other types
    let built = Arc::new(T::describe());
    let stored = cache().entry(id).or_insert(built).value().clone();
    log::debug!("described `{}` as {}", stored.name(), stored.kind_name());
    stored
}

/// Strips module paths from a type name, keeping generic arguments:
/// `alloc::vec::Vec<my::Point>` becomes `Vec<Point>`.
pub fn short_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment_start = 0;
    let mut chars = full.chars().peekable();

    while let Some(c) = chars.next() {
        if c == ':' && chars.peek() == Some(&':') {
            chars.next();
            out.truncate(segment_start);
        } else {
            out.push(c);
            if !(c.is_alphanumeric() || c == '_') {
                segment_start = out.len();
            }
        }
    }
    out
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
/// The kind of value a scalar type produces.
pub enum ScalarKind {
    /// The unit type.
    Null,
    /// Booleans.
    Bool,
    /// Numbers of every width.
    Number,
    /// Strings and characters.
    Text,
}

/// Accessors of a scalar type.
pub struct ScalarOps {
    pub(crate) kind: ScalarKind,
    pub(crate) to_value: ToValueFn,
    pub(crate) from_text: FromTextFn,
}

impl ScalarOps {
    /// The kind of scalar.
    pub fn kind(&self) -> ScalarKind { self.kind }
}

/// Accessors of a sequence type.
pub struct SequenceOps {
    pub(crate) element: DescribeFn,
    pub(crate) iter: IterFn,
    pub(crate) collect: CollectFn,
}

impl SequenceOps {
    /// The element descriptor.
    pub fn element(&self) -> Arc<TypeDescriptor> { (self.element)() }
}

/// Accessors of a mapping type. Keys are always strings on the wire.
pub struct MappingOps {
    pub(crate) value: DescribeFn,
    pub(crate) entries: EntriesFn,
    pub(crate) collect: CollectEntriesFn,
}

impl MappingOps {
    /// The value descriptor.
    pub fn value(&self) -> Arc<TypeDescriptor> { (self.value)() }
}

#[derive(Clone)]
/// Conversion of a type to and from a single string.
pub struct TextOps {
    pub(crate) to_text: ToTextFn,
    pub(crate) from_text: FromTextFn,
}

impl TextOps {
    /// Creates text conversions for `T`.
    pub fn new<T: Describe>(to: fn(&T) -> String, from: fn(&str) -> Result<T, String>) -> Self {
        TextOps {
            to_text: Arc::new(move |any: &dyn Any| any.downcast_ref::<T>().map(to)),
            from_text: Arc::new(move |s: &str| from(s).map(|t| Box::new(t) as AnyBox)),
        }
    }
}

/// The properties of a record type.
pub struct RecordOps {
    pub(crate) properties: Vec<PropertyDescriptor>,
    index: HashMap<String, usize>,
    pub(crate) construct: Option<MakeFn>,
}

impl RecordOps {
    /// Looks up a property by its (possibly renamed) name.
    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.index.get(name).map(|&i| &self.properties[i])
    }

    pub(crate) fn position(&self, name: &str) -> Option<usize> { self.index.get(name).copied() }
}

/// Accessors of a transparent adapter such as `Option<T>` or `Box<T>`.
pub struct AdapterOps {
    pub(crate) inner: DescribeFn,
    pub(crate) get: InnerFn,
    pub(crate) wrap: WrapFn,
    pub(crate) empty: Option<MakeFn>,
}

impl AdapterOps {
    /// The descriptor of the adapted type.
    pub fn inner(&self) -> Arc<TypeDescriptor> { (self.inner)() }
}

/// How a type is traversed.
pub enum Category {
    /// Booleans, numbers, strings, characters and the unit type.
    Scalar(ScalarOps),
    /// Ordered collections of one element type.
    Sequence(SequenceOps),
    /// String-keyed collections of one value type.
    Mapping(MappingOps),
    /// Types that convert to and from a string.
    Wrapped(TextOps),
    /// Types with named properties.
    Record(RecordOps),
    /// A value that may be absent.
    Optional(AdapterOps),
    /// A value that is always present behind an indirection.
    Pointer(AdapterOps),
    /// [`Value`], whose shape is only known at runtime.
    Dynamic,
    /// Anything else. Serialized as its type name; cannot be parsed.
    Opaque,
}

/// A single property of a record type.
pub struct PropertyDescriptor {
    name: String,
    declared: DescribeFn,
    read: ReadFn,
    write: WriteFn,
    ignorable: bool,
    required: bool,
    identity: bool,
}

impl PropertyDescriptor {
    /// The property name, after renames.
    pub fn name(&self) -> &str { &self.name }

    /// The descriptor of the declared property type.
    pub fn descriptor(&self) -> Arc<TypeDescriptor> { (self.declared)() }

    /// Ignorable properties are never written, and skipped when read.
    pub fn is_ignorable(&self) -> bool { self.ignorable }

    /// Required properties must be present when parsing.
    pub fn is_required(&self) -> bool { self.required }

    /// Identity properties are written as attributes where the format has them.
    pub fn is_identity(&self) -> bool { self.identity }

    pub(crate) fn read<'a>(&self, record: &'a dyn Any) -> Option<&'a dyn Any> { (self.read)(record) }

    pub(crate) fn write(&self, record: &mut dyn Any, value: AnyBox) -> Result<(), String> {
        (self.write)(record, value)
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("name", &self.name)
            .field("ignorable", &self.ignorable)
            .field("required", &self.required)
            .field("identity", &self.identity)
            .finish()
    }
}

/// The cached description of one type.
pub struct TypeDescriptor {
    type_id: TypeId,
    full_name: &'static str,
    name: String,
    category: Category,
}

impl TypeDescriptor {
    /// The `TypeId` of the described type.
    pub fn type_id(&self) -> TypeId { self.type_id }

    /// The type name without module paths.
    pub fn name(&self) -> &str { &self.name }

    /// The full type name, as given by [`std::any::type_name`].
    pub fn full_name(&self) -> &'static str { self.full_name }

    /// How the type is traversed.
    pub fn category(&self) -> &Category { &self.category }

    /// A lower-case name for the category.
    pub fn kind_name(&self) -> &'static str {
        match &self.category {
            Category::Scalar(_) => "scalar",
            Category::Sequence(_) => "sequence",
            Category::Mapping(_) => "mapping",
            Category::Wrapped(_) => "wrapped",
            Category::Record(_) => "record",
            Category::Optional(_) => "optional",
            Category::Pointer(_) => "pointer",
            Category::Dynamic => "dynamic",
            Category::Opaque => "opaque",
        }
    }

    /// The properties, in declaration order. Empty unless this is a record.
    pub fn properties(&self) -> &[PropertyDescriptor] {
        match &self.category {
            Category::Record(r) => &r.properties,
            _ => &[],
        }
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("category", &self.kind_name())
            .field("properties", &self.properties())
            .finish()
    }
}

#[derive(Clone, Default)]
/// Per-type adjustments, registered before the type is first described.
///
/// # Example
///
/// ```
/// use marshal::prelude::*;
///
/// register_override(
///     TypeOverride::new("LegacyRecord")
///         .rename("fname", "firstName")
///         .ignore("cache"),
/// );
/// ```
pub struct TypeOverride {
    type_name: String,
    renames: Vec<(String, String)>,
    ignore: Vec<String>,
    text: Option<TextOps>,
}

impl TypeOverride {
    /// Creates an empty override for the type with the given short name.
    pub fn new(type_name: &str) -> Self {
        TypeOverride {
            type_name: type_name.to_owned(),
            ..Self::default()
        }
    }

    /// Creates an empty override for `T`.
    pub fn of<T: Describe>() -> Self { Self::new(&short_name(type_name::<T>())) }

    /// Renames property `from` to `to`.
    pub fn rename(mut self, from: &str, to: &str) -> Self {
        self.renames.push((from.to_owned(), to.to_owned()));
        self
    }

    /// Marks a property ignorable.
    pub fn ignore(mut self, name: &str) -> Self {
        self.ignore.push(name.to_owned());
        self
    }

    /// Treats the whole type as a string through the given conversions.
    pub fn as_text(mut self, ops: TextOps) -> Self {
        self.text = Some(ops);
        self
    }
}

fn overrides() -> &'static DashMap<String, TypeOverride> {
    static OVERRIDES: OnceLock<DashMap<String, TypeOverride>> = OnceLock::new();
    OVERRIDES.get_or_init(DashMap::new)
}

/// Adds an entry to the override table.
///
/// Overrides only affect types that have not been described yet.
pub fn register_override(o: TypeOverride) {
    if cache().iter().any(|d| d.name() == o.type_name) {
        log::warn!("override for `{}` registered after it was described; ignored", o.type_name);
    }
    overrides().insert(o.type_name.clone(), o);
}

/// Builds a [`TypeDescriptor`] for `T` from typed accessors.
///
/// Capabilities may be declared in any order; [`finish`](DescriptorBuilder::finish)
/// picks the category.
pub struct DescriptorBuilder<T> {
    scalar: Option<ScalarOps>,
    sequence: Option<SequenceOps>,
    mapping: Option<MappingOps>,
    text: Option<TextOps>,
    adapter: Option<(bool, AdapterOps)>,
    dynamic: bool,
    properties: Vec<PropertyDescriptor>,
    construct: Option<MakeFn>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Describe> Default for DescriptorBuilder<T> {
    fn default() -> Self { Self::new() }
}

impl<T: Describe> DescriptorBuilder<T> {
    /// Creates a builder with no capabilities.
    pub fn new() -> Self {
        DescriptorBuilder {
            scalar: None,
            sequence: None,
            mapping: None,
            text: None,
            adapter: None,
            dynamic: false,
            properties: Vec::new(),
            construct: None,
            _marker: PhantomData,
        }
    }

    /// Declares `T` a scalar.
    pub fn scalar(mut self, kind: ScalarKind, to: fn(&T) -> Value, from: fn(&str) -> Result<T, String>) -> Self {
        self.scalar = Some(ScalarOps {
            kind,
            to_value: Box::new(move |any: &dyn Any| any.downcast_ref::<T>().map(to)),
            from_text: Arc::new(move |s: &str| from(s).map(|t| Box::new(t) as AnyBox)),
        });
        self
    }

    /// Declares `T` a sequence of `E`.
    pub fn sequence<E: Describe>(
        mut self,
        iter: for<'a> fn(&'a T) -> Box<dyn Iterator<Item = &'a E> + 'a>,
        collect: fn(Vec<E>) -> Result<T, String>,
    ) -> Self {
        self.sequence = Some(SequenceOps {
            element: describe::<E>,
            iter: erase_iter(move |any| {
                let t = any.downcast_ref::<T>()?;
                let it: Box<dyn Iterator<Item = &dyn Any> + '_> = Box::new(iter(t).map(|e| e as &dyn Any));
                Some(it)
            }),
            collect: Box::new(move |items: Vec<AnyBox>| {
                let elems = items.into_iter().map(unbox::<E>).collect::<Result<Vec<E>, String>>()?;
                collect(elems).map(|t| Box::new(t) as AnyBox)
            }),
        });
        self
    }

    /// Declares `T` a mapping from strings to `V`.
    pub fn mapping<V: Describe>(
        mut self,
        entries: for<'a> fn(&'a T) -> Box<dyn Iterator<Item = (String, &'a V)> + 'a>,
        collect: fn(Vec<(String, V)>) -> Result<T, String>,
    ) -> Self {
        self.mapping = Some(MappingOps {
            value: describe::<V>,
            entries: erase_entries(move |any| {
                let t = any.downcast_ref::<T>()?;
                let it: Box<dyn Iterator<Item = (String, &dyn Any)> + '_> =
                    Box::new(entries(t).map(|(k, v)| (k, v as &dyn Any)));
                Some(it)
            }),
            collect: Box::new(move |items: Vec<(String, AnyBox)>| {
                let pairs = items
                    .into_iter()
                    .map(|(k, v)| unbox::<V>(v).map(|v| (k, v)))
                    .collect::<Result<Vec<(String, V)>, String>>()?;
                collect(pairs).map(|t| Box::new(t) as AnyBox)
            }),
        });
        self
    }

    /// Declares that `T` converts to and from a string.
    pub fn text(mut self, to: fn(&T) -> String, from: fn(&str) -> Result<T, String>) -> Self {
        self.text = Some(TextOps::new(to, from));
        self
    }

    /// Declares `T` an optional `E`.
    pub fn optional<E: Describe>(
        mut self,
        get: for<'a> fn(&'a T) -> Option<&'a E>,
        wrap: fn(Option<E>) -> T,
    ) -> Self {
        self.adapter = Some((
            true,
            AdapterOps {
                inner: describe::<E>,
                get: erase_inner(move |any| {
                    let t = any.downcast_ref::<T>()?;
                    Some(get(t).map(|e| e as &dyn Any))
                }),
                wrap: Box::new(move |b: AnyBox| unbox::<E>(b).map(|e| Box::new(wrap(Some(e))) as AnyBox)),
                empty: Some(Box::new(move || Box::new(wrap(None)) as AnyBox)),
            },
        ));
        self
    }

    /// Declares `T` a transparent wrapper around `E`.
    pub fn pointer<E: Describe>(mut self, get: for<'a> fn(&'a T) -> &'a E, wrap: fn(E) -> T) -> Self {
        self.adapter = Some((
            false,
            AdapterOps {
                inner: describe::<E>,
                get: erase_inner(move |any| {
                    let t = any.downcast_ref::<T>()?;
                    Some(Some(get(t) as &dyn Any))
                }),
                wrap: Box::new(move |b: AnyBox| unbox::<E>(b).map(|e| Box::new(wrap(e)) as AnyBox)),
                empty: None,
            },
        ));
        self
    }

    /// Declares `T` to be [`Value`]-like: its shape is decided at runtime.
    pub fn dynamic(mut self) -> Self {
        self.dynamic = true;
        self
    }

    /// Adds a record property of type `F`.
    pub fn property<F: Describe>(mut self, name: &str, get: for<'a> fn(&'a T) -> &'a F, set: fn(&mut T, F)) -> Self {
        self.properties.push(PropertyDescriptor {
            name: name.to_owned(),
            declared: describe::<F>,
            read: erase_read(move |any| any.downcast_ref::<T>().map(|t| get(t) as &dyn Any)),
            write: Box::new(move |any: &mut dyn Any, value: AnyBox| {
                let t = any
                    .downcast_mut::<T>()
                    .ok_or_else(|| format!("expected a `{}` record", type_name::<T>()))?;
                set(t, unbox::<F>(value)?);
                Ok(())
            }),
            ignorable: false,
            required: false,
            identity: false,
        });
        self
    }

    fn last_property(&mut self) -> Option<&mut PropertyDescriptor> {
        let last = self.properties.last_mut();
        if last.is_none() {
            log::warn!("property flag set on `{}` before any property", type_name::<T>());
        }
        last
    }

    /// Marks the last added property ignorable.
    pub fn ignorable(mut self) -> Self {
        if let Some(p) = self.last_property() {
            p.ignorable = true;
        }
        self
    }

    /// Marks the last added property required.
    pub fn required(mut self) -> Self {
        if let Some(p) = self.last_property() {
            p.required = true;
        }
        self
    }

    /// Marks the last added property as identifying the record.
    pub fn identity(mut self) -> Self {
        if let Some(p) = self.last_property() {
            p.identity = true;
        }
        self
    }

    /// Sets the constructor records are parsed into.
    pub fn constructor(mut self, make: fn() -> T) -> Self {
        self.construct = Some(Box::new(move || Box::new(make()) as AnyBox));
        self
    }

    /// Chooses the category and builds the descriptor.
    ///
    /// The override table wins, then the first of: dynamic, adapter, scalar, sequence,
    /// mapping, text, record with at least one property. Anything else is opaque.
    pub fn finish(self) -> TypeDescriptor {
        let full_name = type_name::<T>();
        let name = short_name(full_name);
        let ov = overrides().get(&name).map(|o| o.value().clone());

        let category = match (ov, self) {
            (
                Some(TypeOverride {
                    text: Some(ops), ..
                }),
                _,
            ) => Category::Wrapped(ops),
            (_, DescriptorBuilder { dynamic: true, .. }) => Category::Dynamic,
            (
                _,
                DescriptorBuilder {
                    adapter: Some((optional, ops)),
                    ..
                },
            ) => {
                if optional {
                    Category::Optional(ops)
                } else {
                    Category::Pointer(ops)
                }
            }
            (_, DescriptorBuilder { scalar: Some(ops), .. }) => Category::Scalar(ops),
            (_, DescriptorBuilder { sequence: Some(ops), .. }) => Category::Sequence(ops),
            (_, DescriptorBuilder { mapping: Some(ops), .. }) => Category::Mapping(ops),
            (_, DescriptorBuilder { text: Some(ops), .. }) => Category::Wrapped(ops),
            (ov, DescriptorBuilder { properties, construct, .. }) if !properties.is_empty() => {
                Category::Record(record(properties, construct, ov.as_ref()))
            }
            _ => Category::Opaque,
        };

        TypeDescriptor {
            type_id: TypeId::of::<T>(),
            full_name,
            name,
            category,
        }
    }
}

fn record(mut properties: Vec<PropertyDescriptor>, construct: Option<MakeFn>, ov: Option<&TypeOverride>) -> RecordOps {
    if let Some(ov) = ov {
        for p in properties.iter_mut() {
            if ov.ignore.iter().any(|i| *i == p.name) {
                p.ignorable = true;
            }
            if let Some((_, to)) = ov.renames.iter().find(|(from, _)| *from == p.name) {
                p.name = to.clone();
            }
        }
    }

    let index = properties
        .iter()
        .enumerate()
        .map(|(i, p)| (p.name.clone(), i))
        .collect();

    RecordOps {
        properties,
        index,
        construct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Renamed {
        fname: String,
        cache: u32,
    }

    impl Describe for Renamed {
        fn describe() -> TypeDescriptor {
            DescriptorBuilder::<Renamed>::new()
                .property::<String>("fname", |r| &r.fname, |r, v| r.fname = v)
                .property::<u32>("cache", |r| &r.cache, |r, v| r.cache = v)
                .constructor(Renamed::default)
                .finish()
        }
    }

    #[derive(Default)]
    struct Plain {
        name: String,
    }

    impl Describe for Plain {
        fn describe() -> TypeDescriptor {
            DescriptorBuilder::<Plain>::new()
                .property::<String>("name", |r| &r.name, |r, v| r.name = v)
                .required()
                .constructor(Plain::default)
                .finish()
        }
    }

    struct Both(Vec<u8>);

    impl Describe for Both {
        fn describe() -> TypeDescriptor {
            DescriptorBuilder::<Both>::new()
                .text(|b| format!("{:?}", b.0), |_| Err("no".into()))
                .sequence::<u8>(|b| Box::new(b.0.iter()), |v| Ok(Both(v)))
                .finish()
        }
    }

    struct Nothing;

    impl Describe for Nothing {
        fn describe() -> TypeDescriptor { DescriptorBuilder::<Nothing>::new().finish() }
    }

    #[test]
    fn short_names() {
        assert_eq!(short_name("alloc::vec::Vec<my::Point>"), "Vec<Point>");
        assert_eq!(
            short_name("std::collections::HashMap<alloc::string::String, u8>"),
            "HashMap<String, u8>"
        );
        assert_eq!(short_name("u8"), "u8");
    }

    #[test]
    fn sequence_beats_text() {
        assert_eq!(describe::<Both>().kind_name(), "sequence");
    }

    #[test]
    fn no_capabilities_is_opaque() {
        assert_eq!(describe::<Nothing>().kind_name(), "opaque");
    }

    #[test]
    fn cached_per_type() {
        assert!(Arc::ptr_eq(&describe::<Nothing>(), &describe::<Nothing>()));
        assert!(!Arc::ptr_eq(&describe::<Nothing>(), &describe::<Both>()));
    }

    #[test]
    fn override_renames_and_ignores() {
        register_override(TypeOverride::of::<Renamed>().rename("fname", "firstName").ignore("cache"));
        let d = describe::<Renamed>();
        let names: Vec<&str> = d.properties().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["firstName", "cache"]);
        assert!(d.properties()[1].is_ignorable());

        match d.category() {
            Category::Record(r) => assert!(r.property("firstName").is_some() && r.property("fname").is_none()),
            _ => panic!("expected a record"),
        }
    }

    #[test]
    fn erased_accessors() {
        let d = describe::<Plain>();
        let p = &d.properties()[0];
        assert!(p.is_required());
        let mut r: AnyBox = match d.category() {
            Category::Record(ops) => (ops.construct.as_ref().unwrap())(),
            _ => unreachable!(),
        };
        p.write(&mut *r, Box::new("Ada".to_string())).unwrap();
        assert!(p.write(&mut *r, Box::new(3u8)).is_err());
        let name = p.read(&*r).unwrap().downcast_ref::<String>().unwrap();
        assert_eq!(name, "Ada");
    }
}
