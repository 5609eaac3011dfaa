//! Contexts and sessions.
//!
//! A [`Serializer`] or [`Parser`] is built once from a [`Format`] and a
//! [`PropertyStore`], resolving every option up front. It is immutable and can be
//! shared across threads. Each call creates a short-lived session that holds the
//! mutable state of that one call: the depth counter, the stack of containers being
//! written and the listeners to notify.
//!
//! # Example
//!
//! ```
//! use marshal::prelude::*;
//! use std::collections::BTreeMap;
//!
//! let parser = Parser::new(Format::UrlEncoding, PropertyStore::empty()).unwrap();
//! let m: BTreeMap<String, i32> = parser.parse_str("a=1&b=2").unwrap();
//! assert_eq!(m["b"], 2);
//!
//! let ser = Serializer::new(Format::Uon, PropertyStore::empty()).unwrap();
//! assert_eq!(ser.to_string(&m).unwrap(), "(a=1,b=2)");
//! ```

use crate::{
    config::*,
    descriptor::{describe, Describe, TypeDescriptor},
    encoding::{
        constants::*,
        de,
        json::{JsonReader, JsonWriter},
        ser::{self, FormatWriter},
        uon::{UonReader, UonWriter},
        xml::{XmlReader, XmlWriter},
    },
    errors::*,
    Value,
};
use bytes::BytesMut;
use hashbrown::HashMap;
use smallvec::SmallVec;
use std::{
    any::{Any, TypeId},
    convert::TryFrom,
    fmt,
    io::{Read, Write},
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
/// The supported wire formats.
pub enum Format {
    /// JSON.
    Json,
    /// XML.
    Xml,
    /// `application/x-www-form-urlencoded`, with UON values.
    UrlEncoding,
    /// URL-based object notation.
    Uon,
}

impl Format {
    /// Looks up the format for a media type. Parameters such as `charset` are ignored.
    ///
    /// # Example
    ///
    /// ```
    /// use marshal::context::Format;
    ///
    /// assert_eq!(Format::from_media_type("application/json; charset=utf-8"), Some(Format::Json));
    /// assert_eq!(Format::from_media_type("image/png"), None);
    /// ```
    pub fn from_media_type(media_type: &str) -> Option<Format> {
        let essence = media_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            MEDIA_JSON | MEDIA_TEXT_JSON => Some(Format::Json),
            MEDIA_XML | MEDIA_TEXT_XML => Some(Format::Xml),
            MEDIA_FORM => Some(Format::UrlEncoding),
            MEDIA_UON => Some(Format::Uon),
            _ => None,
        }
    }

    /// The canonical media type of the format.
    pub fn media_type(self) -> &'static str {
        match self {
            Format::Json => MEDIA_JSON,
            Format::Xml => MEDIA_TEXT_XML,
            Format::UrlEncoding => MEDIA_FORM,
            Format::Uon => MEDIA_UON,
        }
    }

    fn is_url(self) -> bool { self == Format::UrlEncoding }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { f.write_str(self.media_type()) }
}

/// Receives notifications from parser sessions.
///
/// Listeners are shared between threads, so implementations that record anything
/// need interior mutability.
pub trait ParserListener: Send + Sync {
    /// Called when a record key matches no property and unknown properties are being
    /// ignored. `partial` is the record as built so far.
    fn on_unknown_property(&self, name: &str, type_name: &str, partial: &dyn Any, line: usize, column: usize);
}

#[derive(Clone, Default)]
/// Per-call arguments for a session.
pub struct SessionArgs {
    listeners: Vec<Arc<dyn ParserListener>>,
}

impl SessionArgs {
    /// Arguments with nothing set.
    pub fn new() -> Self { Self::default() }

    /// Adds a listener for this call only.
    pub fn listener(mut self, l: Arc<dyn ParserListener>) -> Self {
        self.listeners.push(l);
        self
    }
}

impl fmt::Debug for SessionArgs {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SessionArgs")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[derive(Clone, Debug, Default)]
/// Include and exclude rules, keyed by short type name.
pub struct PropertyFilter {
    include: HashMap<String, Vec<String>>,
    exclude: HashMap<String, Vec<String>>,
}

impl PropertyFilter {
    fn from_store(store: &PropertyStore) -> Result<Self, ConfigError> {
        Ok(PropertyFilter {
            include: rule_lists(store, BEAN_INCLUDE_PROPERTIES)?,
            exclude: rule_lists(store, BEAN_EXCLUDE_PROPERTIES)?,
        })
    }

    /// Indicates whether property `name` of type `type_name` takes part in this context.
    pub fn allows(&self, type_name: &str, name: &str) -> bool {
        if let Some(only) = self.include.get(type_name) {
            if !only.iter().any(|p| p == name) {
                return false;
            }
        }
        !self
            .exclude
            .get(type_name)
            .map_or(false, |skip| skip.iter().any(|p| p == name))
    }
}

fn rule_lists(store: &PropertyStore, key: &str) -> Result<HashMap<String, Vec<String>>, ConfigError> {
    store
        .get_map(key)?
        .into_iter()
        .map(|(ty, props)| match props {
            PropertyValue::Str(s) => Ok((ty, crate::util::split_list(&s))),
            other => Err(ConfigError::WrongKind {
                name: format!("{}[{}]", key, ty),
                expected: "list",
                found: other.to_string(),
            }),
        })
        .collect()
}

fn depth_limit(store: &PropertyStore, key: &str) -> Result<usize, ConfigError> {
    let d = store.get_int(key, DEFAULT_MAX_DEPTH)?;
    if d < 1 {
        return Err(ConfigError::Invalid {
            name: key.to_owned(),
            reason: format!("depth limit must be positive, got {}", d),
        });
    }
    usize::try_from(d).map_err(|_| ConfigError::Invalid {
        name: key.to_owned(),
        reason: format!("depth limit {} does not fit this platform", d),
    })
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// Options of a [`Serializer`], resolved from its store.
pub struct SerializerSettings {
    /// Containers nested deeper than this fail.
    pub max_depth: usize,
    /// Pretty-print.
    pub use_whitespace: bool,
    /// Omit null-valued record properties.
    pub trim_nulls: bool,
    /// Sort mapping entries by key.
    pub sort_maps: bool,
    /// Single quotes and bare keys in JSON.
    pub simple_mode: bool,
    /// Percent-encode UON and URL-encoded output.
    pub encode_chars: bool,
}

impl SerializerSettings {
    fn resolve(format: Format, store: &PropertyStore) -> Result<Self, ConfigError> {
        Ok(SerializerSettings {
            max_depth: depth_limit(store, SERIALIZER_MAX_DEPTH)?,
            use_whitespace: store.get_bool(SERIALIZER_USE_WHITESPACE, false)?,
            trim_nulls: store.get_bool(SERIALIZER_TRIM_NULL_PROPERTIES, true)?,
            sort_maps: store.get_bool(SERIALIZER_SORT_MAPS, false)?,
            simple_mode: store.get_bool(JSON_SIMPLE_MODE, false)?,
            encode_chars: store.get_bool(UON_ENCODE_CHARS, format.is_url())?,
        })
    }
}

/// An immutable serializer for one format and one set of options.
pub struct Serializer {
    format: Format,
    store: Arc<PropertyStore>,
    settings: SerializerSettings,
    filter: PropertyFilter,
}

impl Serializer {
    /// Creates a serializer, reading every option from `store`.
    pub fn new(format: Format, store: Arc<PropertyStore>) -> Result<Self, ConfigError> {
        let settings = SerializerSettings::resolve(format, &store)?;
        let filter = PropertyFilter::from_store(&store)?;
        Ok(Serializer {
            format,
            store,
            settings,
            filter,
        })
    }

    /// The output format.
    pub fn format(&self) -> Format { self.format }

    /// The store this serializer was built from.
    pub fn store(&self) -> &Arc<PropertyStore> { &self.store }

    /// The resolved options.
    pub fn settings(&self) -> &SerializerSettings { &self.settings }

    /// The include and exclude rules.
    pub fn filter(&self) -> &PropertyFilter { &self.filter }

    /// Creates a session for a single call.
    pub fn create_session(&self, _args: SessionArgs) -> SerializerSession<'_> {
        log::trace!("serializer session created for {}", self.format);
        SerializerSession {
            ctx: self,
            depth: 0,
            visited: SmallVec::new(),
        }
    }

    /// Writes `value` to `sink`, returning the number of bytes written.
    pub fn serialize<T: Describe, W: Write>(&self, value: &T, sink: W) -> Result<usize, SerializeError> {
        self.create_session(SessionArgs::default()).serialize(value, sink)
    }

    /// Serializes `value` to a string.
    pub fn to_string<T: Describe>(&self, value: &T) -> Result<String, SerializeError> {
        self.create_session(SessionArgs::default()).to_string(value)
    }
}

impl fmt::Debug for Serializer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Serializer")
            .field("format", &self.format)
            .field("settings", &self.settings)
            .finish()
    }
}

/// The state of one serialization call.
pub struct SerializerSession<'c> {
    ctx: &'c Serializer,
    depth: usize,
    visited: SmallVec<[(usize, TypeId); 16]>,
}

impl<'c> SerializerSession<'c> {
    /// The context the session belongs to.
    pub fn context(&self) -> &'c Serializer { self.ctx }

    /// The number of containers currently being written.
    pub fn visited_len(&self) -> usize { self.visited.len() }

    /// Writes `value` to `sink`, returning the number of bytes written.
    pub fn serialize<T: Describe, W: Write>(mut self, value: &T, mut sink: W) -> Result<usize, SerializeError> {
        let out = self.render(value)?;
        sink.write_all(&out)?;
        sink.flush()?;
        Ok(out.len())
    }

    /// Serializes `value` to a string.
    pub fn to_string<T: Describe>(mut self, value: &T) -> Result<String, SerializeError> {
        let out = self.render(value)?;
        String::from_utf8(out.to_vec()).map_err(|e| SerializeError::Unserializable("String".into(), e.to_string()))
    }

    pub(crate) fn render<T: Describe>(&mut self, value: &T) -> Result<BytesMut, SerializeError> {
        let desc = describe::<T>();
        let ctx = self.ctx;
        let st = &ctx.settings;
        let result = match ctx.format {
            Format::Json => self.run(JsonWriter::new(st.use_whitespace, st.simple_mode), value, &desc),
            Format::Xml => self.run(XmlWriter::new(st.use_whitespace), value, &desc),
            Format::UrlEncoding => self.run(UonWriter::url(st.encode_chars), value, &desc),
            Format::Uon => self.run(UonWriter::uon(st.encode_chars), value, &desc),
        };
        debug_assert!(self.visited.is_empty(), "visited stack not empty after serialize");
        result
    }

    fn run<W: FormatWriter>(&mut self, mut w: W, value: &dyn Any, desc: &TypeDescriptor) -> Result<BytesMut, SerializeError> {
        ser::write_value(self, &mut w, value, desc)?;
        Ok(w.finish())
    }

    /// Runs `body` one container deeper, with `identity` on the visited stack.
    ///
    /// The stack is popped whether or not `body` succeeds.
    pub(crate) fn nest<R>(
        &mut self,
        identity: Option<(usize, TypeId)>,
        type_name: &str,
        body: impl FnOnce(&mut Self) -> Result<R, SerializeError>,
    ) -> Result<R, SerializeError> {
        if self.depth >= self.ctx.settings.max_depth {
            return Err(SerializeError::DepthExceeded(self.ctx.settings.max_depth));
        }
        if let Some(id) = identity {
            if self.visited.contains(&id) {
                return Err(SerializeError::Cycle {
                    type_name: type_name.to_owned(),
                    depth: self.depth,
                });
            }
            self.visited.push(id);
        }

        self.depth += 1;
        let r = body(self);
        self.depth -= 1;

        if identity.is_some() {
            self.visited.pop();
        }
        r
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// Options of a [`Parser`], resolved from its store.
pub struct ParserSettings {
    /// Containers nested deeper than this fail.
    pub max_depth: usize,
    /// Trim text scalars and keys.
    pub trim_strings: bool,
    /// Skip unknown record properties instead of failing.
    pub ignore_unknown: bool,
    /// Percent-decode UON and URL-encoded input.
    pub decode_chars: bool,
}

impl ParserSettings {
    fn resolve(format: Format, store: &PropertyStore) -> Result<Self, ConfigError> {
        Ok(ParserSettings {
            max_depth: depth_limit(store, PARSER_MAX_DEPTH)?,
            trim_strings: store.get_bool(PARSER_TRIM_STRINGS, false)?,
            ignore_unknown: store.get_bool(BEAN_IGNORE_UNKNOWN_PROPERTIES, false)?,
            decode_chars: store.get_bool(UON_DECODE_CHARS, format.is_url())?,
        })
    }
}

/// An immutable parser for one format and one set of options.
pub struct Parser {
    format: Format,
    store: Arc<PropertyStore>,
    settings: ParserSettings,
    filter: PropertyFilter,
    listeners: Vec<Arc<dyn ParserListener>>,
}

impl Parser {
    /// Creates a parser, reading every option from `store` and instantiating the
    /// listener classes it names.
    pub fn new(format: Format, store: Arc<PropertyStore>) -> Result<Self, ConfigError> {
        let settings = ParserSettings::resolve(format, &store)?;
        let filter = PropertyFilter::from_store(&store)?;
        let listeners = store.get_listeners(PARSER_LISTENERS)?;
        Ok(Parser {
            format,
            store,
            settings,
            filter,
            listeners,
        })
    }

    /// The input format.
    pub fn format(&self) -> Format { self.format }

    /// The store this parser was built from.
    pub fn store(&self) -> &Arc<PropertyStore> { &self.store }

    /// The resolved options.
    pub fn settings(&self) -> &ParserSettings { &self.settings }

    /// The include and exclude rules.
    pub fn filter(&self) -> &PropertyFilter { &self.filter }

    /// Creates a session for a single call. Listeners in `args` are notified after
    /// the ones configured on the parser.
    pub fn create_session(&self, args: SessionArgs) -> ParserSession<'_> {
        log::trace!("parser session created for {}", self.format);
        let mut listeners = self.listeners.clone();
        listeners.extend(args.listeners);
        ParserSession {
            ctx: self,
            depth: 0,
            listeners,
        }
    }

    /// Reads a `T` from `source`.
    pub fn parse<T: Describe, R: Read>(&self, source: R) -> Result<T, ParseError> {
        self.create_session(SessionArgs::default()).parse(source)
    }

    /// Reads a `T` from a string.
    pub fn parse_str<T: Describe>(&self, text: &str) -> Result<T, ParseError> {
        self.create_session(SessionArgs::default()).parse_str(text)
    }

    /// Reads a value of unknown shape.
    pub fn parse_value(&self, text: &str) -> Result<Value, ParseError> {
        self.create_session(SessionArgs::default()).parse_value(text)
    }
}

impl fmt::Debug for Parser {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Parser")
            .field("format", &self.format)
            .field("settings", &self.settings)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// The state of one parsing call.
pub struct ParserSession<'c> {
    ctx: &'c Parser,
    depth: usize,
    listeners: Vec<Arc<dyn ParserListener>>,
}

impl<'c> ParserSession<'c> {
    /// The context the session belongs to.
    pub fn context(&self) -> &'c Parser { self.ctx }

    /// Reads a `T` from `source`. The whole source is read before parsing starts.
    pub fn parse<T: Describe, R: Read>(self, mut source: R) -> Result<T, ParseError> {
        let mut text = String::new();
        source
            .read_to_string(&mut text)
            .map_err(|e| ParseError::new(ParseErrorKind::Io(e.to_string()), Position::START))?;
        self.parse_str(&text)
    }

    /// Reads a `T` from a string.
    pub fn parse_str<T: Describe>(mut self, text: &str) -> Result<T, ParseError> {
        let desc = describe::<T>();
        let ctx = self.ctx;
        let (url, decode) = (ctx.format.is_url(), ctx.settings.decode_chars);
        let boxed = match ctx.format {
            Format::Json => de::read_top(&mut self, JsonReader::new(text), &desc)?,
            Format::Xml => de::read_top(&mut self, XmlReader::new(text), &desc)?,
            Format::UrlEncoding | Format::Uon => de::read_top(&mut self, UonReader::new(text, url, decode), &desc)?,
        };
        boxed.downcast::<T>().map(|b| *b).map_err(|_| {
            ParseError::new(
                ParseErrorKind::Conversion {
                    type_name: desc.name().to_owned(),
                    reason: "parsed value has the wrong type".into(),
                },
                Position::START,
            )
        })
    }

    /// Reads a value of unknown shape.
    pub fn parse_value(self, text: &str) -> Result<Value, ParseError> { self.parse_str::<Value>(text) }

    pub(crate) fn settings(&self) -> &'c ParserSettings { &self.ctx.settings }

    pub(crate) fn filter(&self) -> &'c PropertyFilter { &self.ctx.filter }

    pub(crate) fn enter(&mut self, at: Position) -> Result<(), ParseError> {
        let max = self.ctx.settings.max_depth;
        if self.depth >= max {
            return Err(ParseError::new(ParseErrorKind::DepthExceeded(max), at));
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn leave(&mut self) { self.depth -= 1; }

    /// Whether a map here may stand for a sequence, as in the URL-encoded `0=a&1=b`.
    pub(crate) fn indexed_top_level(&self) -> bool { self.ctx.format == Format::UrlEncoding && self.depth == 0 }

    /// Tells every listener about an unknown property. A panicking listener is logged
    /// and skipped.
    pub(crate) fn notify_unknown(&self, name: &str, type_name: &str, partial: &dyn Any, at: Position) {
        for l in self.listeners.iter() {
            let call = panic::catch_unwind(AssertUnwindSafe(|| {
                l.on_unknown_property(name, type_name, partial, at.line, at.column)
            }));
            if call.is_err() {
                log::warn!("listener panicked on unknown property `{}` of `{}`", name, type_name);
            }
        }
    }
}
