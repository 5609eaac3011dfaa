//! XML.
//!
//! The root element is named after the kind of the value: `object`, `array`,
//! `string`, `number`, `boolean` or `null`. Map entries become child elements named
//! after their key, with a `_type` attribute unless the value is a string; keys that
//! are not XML names are written as `<_entry _key="...">`. Array items are elements
//! named after their kind. Identity properties of records become attributes.
//!
//! ```text
//! <object id="7">
//!   <name>Ada</name>
//!   <age _type="number">36</age>
//!   <tags _type="array">
//!     <string>x</string>
//!   </tags>
//! </object>
//! ```
//!
//! When reading, an element without `_type` in key position is an object if it has
//! attributes or child elements, and a string otherwise.

use super::{
    constants::*,
    de::{Cursor, FormatReader, Hint, RawScalar, Token},
    ser::{FormatWriter, Scalar},
};
use crate::errors::{ParseError, ParseErrorKind, Position};
use bytes::{BufMut, BytesMut};
use smallvec::SmallVec;
use std::{borrow::Cow, collections::VecDeque, fmt::Write as _};

/// Escapes `s` for element content, or for a double-quoted attribute value if `attr`.
pub fn escape(s: &str, attr: bool) -> Cow<str> {
    let as_ref = |c: char| c == '\r' || ((c as u32) < 0x20 && c != '\n' && c != '\t') || (attr && (c == '\n' || c == '\t'));
    let needs = |c: char| c == '&' || c == '<' || c == '>' || (attr && c == '"') || as_ref(c);
    if !s.chars().any(needs) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attr => out.push_str("&quot;"),
            c if as_ref(c) => {
                let _ = write!(out, "&#x{:x};", c as u32);
            }
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Resolves entity and character references.
pub fn unescape(s: &str) -> Result<String, String> {
    if !s.contains('&') {
        return Ok(s.to_owned());
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(i) = rest.find('&') {
        out.push_str(&rest[..i]);
        rest = &rest[i + 1..];
        let end = rest.find(';').ok_or_else(|| "unterminated reference".to_owned())?;
        let entity = &rest[..end];
        let c = match entity {
            "lt" => '<',
            "gt" => '>',
            "amp" => '&',
            "quot" => '"',
            "apos" => '\'',
            e if e.starts_with("#x") || e.starts_with("#X") => u32::from_str_radix(&e[2..], 16)
                .ok()
                .and_then(std::char::from_u32)
                .ok_or_else(|| format!("invalid character reference `&{};`", e))?,
            e if e.starts_with('#') => e[1..]
                .parse::<u32>()
                .ok()
                .and_then(std::char::from_u32)
                .ok_or_else(|| format!("invalid character reference `&{};`", e))?,
            e => return Err(format!("unknown entity `&{};`", e)),
        };
        out.push(c);
        rest = &rest[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

fn is_name_char(c: char) -> bool { c.is_alphanumeric() || c == '_' || c == '-' || c == '.' || c == ':' }

/// Whether `s` can be used as an element name.
fn is_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.')
}

#[derive(Debug)]
struct Open {
    name: String,
    has_children: bool,
}

/// Writes XML.
pub(crate) struct XmlWriter {
    out: BytesMut,
    pretty: bool,
    stack: SmallVec<[Open; 8]>,
    /// The last start tag still lacks its `>`.
    tag_open: bool,
    key: Option<String>,
}

impl XmlWriter {
    pub(crate) fn new(pretty: bool) -> Self {
        XmlWriter {
            out: BytesMut::with_capacity(128),
            pretty,
            stack: SmallVec::new(),
            tag_open: false,
            key: None,
        }
    }

    fn put_str(&mut self, s: &str) { self.out.put_slice(s.as_bytes()) }

    fn attr(&mut self, name: &str, value: &str) {
        self.put_str(" ");
        self.put_str(name);
        self.put_str("=\"");
        self.put_str(&escape(value, true));
        self.put_str("\"");
    }

    fn close_tag(&mut self) {
        if self.tag_open {
            self.put_str(">");
            self.tag_open = false;
        }
    }

    fn newline(&mut self) {
        self.put_str("\n");
        for _ in 0..self.stack.len() {
            self.put_str("  ");
        }
    }

    /// Writes the start of an element for a value of `kind`, returning its name.
    fn begin(&mut self, kind: &'static str) -> String {
        self.close_tag();
        if let Some(parent) = self.stack.last_mut() {
            parent.has_children = true;
        }
        if self.pretty && !self.stack.is_empty() {
            self.newline();
        }

        self.put_str("<");
        let name = match self.key.take() {
            Some(k) if is_name(&k) => {
                self.put_str(&k);
                k
            }
            Some(k) => {
                self.put_str(XML_ENTRY);
                self.attr(XML_KEY, &k);
                XML_ENTRY.to_owned()
            }
            None => {
                self.put_str(kind);
                return kind.to_owned();
            }
        };
        if kind != KIND_STRING {
            self.attr(XML_TYPE, kind);
        }
        name
    }

    fn end(&mut self) {
        let open = match self.stack.pop() {
            Some(o) => o,
            None => return,
        };
        if self.tag_open {
            self.put_str("/>");
            self.tag_open = false;
            return;
        }
        if self.pretty && open.has_children {
            self.newline();
        }
        self.put_str("</");
        self.put_str(&open.name);
        self.put_str(">");
    }

    fn start(&mut self, kind: &'static str) {
        let name = self.begin(kind);
        self.tag_open = true;
        self.stack.push(Open {
            name,
            has_children: false,
        });
    }
}

fn scalar_text(v: Scalar) -> (&'static str, Cow<str>) {
    match v {
        Scalar::Bool(b) => (KIND_BOOL, Cow::Owned(b.to_string())),
        Scalar::Number(n) => (KIND_NUMBER, Cow::Owned(n.to_string())),
        Scalar::Text(s) => (KIND_STRING, Cow::Borrowed(s)),
    }
}

impl FormatWriter for XmlWriter {
    fn put_null(&mut self) {
        self.begin(KIND_NULL);
        self.put_str("/>");
    }

    fn put_scalar(&mut self, v: Scalar) {
        let (kind, text) = scalar_text(v);
        let name = self.begin(kind);
        if text.is_empty() {
            self.put_str("/>");
            return;
        }
        self.put_str(">");
        self.put_str(&escape(&text, false));
        self.put_str("</");
        self.put_str(&name);
        self.put_str(">");
    }

    fn start_seq(&mut self) { self.start(KIND_ARRAY) }

    fn end_seq(&mut self) { self.end() }

    fn start_map(&mut self) { self.start(KIND_OBJECT) }

    fn put_key(&mut self, key: &str) { self.key = Some(key.to_owned()) }

    fn end_map(&mut self) { self.end() }

    fn put_property_attr(&mut self, name: &str, v: Scalar) -> bool {
        let fresh = self.stack.last().map_or(false, |o| !o.has_children);
        if !self.tag_open || !fresh || name.starts_with('_') || !is_name(name) {
            return false;
        }
        let (_, text) = scalar_text(v);
        self.attr(name, &text);
        true
    }

    fn finish(self) -> BytesMut { self.out }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Kind {
    Null,
    Bool,
    Number,
    Text,
    Array,
    Object,
}

fn kind_of(name: &str) -> Option<Kind> {
    match name {
        KIND_NULL => Some(Kind::Null),
        KIND_BOOL => Some(Kind::Bool),
        KIND_NUMBER => Some(Kind::Number),
        KIND_STRING => Some(Kind::Text),
        KIND_ARRAY => Some(Kind::Array),
        KIND_OBJECT => Some(Kind::Object),
        _ => None,
    }
}

struct Frame {
    name: String,
    keyed: bool,
}

struct StartTag {
    name: String,
    attrs: Vec<(String, String)>,
    empty: bool,
}

impl StartTag {
    fn take_attr(&mut self, name: &str) -> Option<String> {
        let i = self.attrs.iter().position(|(k, _)| k == name)?;
        Some(self.attrs.remove(i).1)
    }
}

/// Reads XML.
pub(crate) struct XmlReader<'a> {
    cur: Cursor<'a>,
    frames: SmallVec<[Frame; 8]>,
    queue: VecDeque<(Token, Position)>,
    started: bool,
}

impl<'a> XmlReader<'a> {
    pub(crate) fn new(src: &'a str) -> Self {
        XmlReader {
            cur: Cursor::new(src),
            frames: SmallVec::new(),
            queue: VecDeque::new(),
            started: false,
        }
    }

    fn skip_until(&mut self, end: &str, what: &'static str) -> Result<(), ParseError> {
        let at = self.cur.position();
        while !self.cur.eat(end) {
            if self.cur.bump().is_none() {
                return Err(ParseError::new(ParseErrorKind::Unterminated(what), at));
            }
        }
        Ok(())
    }

    /// Skips whitespace, comments, processing instructions and doctype declarations.
    fn skip_misc(&mut self) -> Result<(), ParseError> {
        loop {
            self.cur.skip_whitespace();
            if self.cur.eat("<!--") {
                self.skip_until("-->", "comment")?;
            } else if self.cur.eat("<?") {
                self.skip_until("?>", "declaration")?;
            } else if self.cur.eat("<!DOCTYPE") {
                self.skip_until(">", "doctype")?;
            } else {
                return Ok(());
            }
        }
    }

    fn start_tag(&mut self) -> Result<StartTag, ParseError> {
        let at = self.cur.position();
        self.cur.bump();
        let name = self.cur.take_while(is_name_char).to_owned();
        if name.is_empty() {
            return Err(ParseError::malformed("expected an element name", self.cur.position()));
        }

        let mut attrs = Vec::new();
        loop {
            self.cur.skip_whitespace();
            if self.cur.eat("/>") {
                return Ok(StartTag { name, attrs, empty: true });
            }
            if self.cur.eat(">") {
                return Ok(StartTag { name, attrs, empty: false });
            }
            if self.cur.is_eof() {
                return Err(ParseError::new(ParseErrorKind::Unterminated("tag"), at));
            }

            let attr_at = self.cur.position();
            let attr = self.cur.take_while(is_name_char).to_owned();
            if attr.is_empty() {
                return Err(ParseError::malformed("expected an attribute name", attr_at));
            }
            self.cur.skip_whitespace();
            if !self.cur.eat("=") {
                return Err(ParseError::malformed(format!("expected `=` after `{}`", attr), self.cur.position()));
            }
            self.cur.skip_whitespace();
            let quote = match self.cur.bump() {
                Some(q) if q == '"' || q == '\'' => q,
                _ => return Err(ParseError::malformed("expected a quoted attribute value", attr_at)),
            };
            let raw = self.cur.take_while(|c| c != quote);
            if self.cur.bump().is_none() {
                return Err(ParseError::new(ParseErrorKind::Unterminated("attribute"), attr_at));
            }
            let value = unescape(raw).map_err(|e| ParseError::malformed(e, attr_at))?;
            attrs.push((attr, value));
        }
    }

    fn end_tag(&mut self, expected: &str) -> Result<(), ParseError> {
        let at = self.cur.position();
        self.cur.eat("</");
        let name = self.cur.take_while(is_name_char);
        self.cur.skip_whitespace();
        if !self.cur.eat(">") {
            return Err(ParseError::malformed("expected `>`", self.cur.position()));
        }
        if name != expected {
            return Err(ParseError::malformed(
                format!("expected `</{}>`, found `</{}>`", expected, name),
                at,
            ));
        }
        Ok(())
    }

    /// Reads character data up to and including the end tag.
    fn text_content(&mut self, name: &str) -> Result<String, ParseError> {
        let mut out = String::new();
        loop {
            let at = self.cur.position();
            if self.cur.eat("<![CDATA[") {
                loop {
                    if self.cur.eat("]]>") {
                        break;
                    }
                    match self.cur.bump() {
                        Some(c) => out.push(c),
                        None => return Err(ParseError::new(ParseErrorKind::Unterminated("CDATA section"), at)),
                    }
                }
            } else if self.cur.eat("<!--") {
                self.skip_until("-->", "comment")?;
            } else if self.cur.starts_with("</") {
                self.end_tag(name)?;
                return Ok(out);
            } else if self.cur.starts_with("<") {
                return Err(ParseError::malformed("unexpected element in a scalar", at));
            } else if self.cur.is_eof() {
                return Err(ParseError::new(ParseErrorKind::Unterminated("element"), at));
            } else {
                let raw = self.cur.take_while(|c| c != '<');
                out.push_str(&unescape(raw).map_err(|e| ParseError::malformed(e, at))?);
            }
        }
    }

    /// Whether the content that follows starts with a child element.
    fn has_child_elements(&self) -> bool {
        let mut c = self.cur.clone();
        loop {
            c.skip_whitespace();
            if c.eat("<!--") {
                while !c.eat("-->") {
                    if c.bump().is_none() {
                        return false;
                    }
                }
                continue;
            }
            return c.starts_with("<") && !c.starts_with("</") && !c.starts_with("<![CDATA[");
        }
    }

    /// Reads one element, queueing its key (when `keyed`) and its opening tokens.
    fn element(&mut self, keyed: bool) -> Result<(), ParseError> {
        let at = self.cur.position();
        let mut tag = self.start_tag()?;
        let ty = tag.take_attr(XML_TYPE);
        let key = tag.take_attr(XML_KEY);
        tag.attrs.retain(|(k, _)| !k.starts_with('_'));

        if keyed {
            let key = key.unwrap_or_else(|| tag.name.clone());
            self.queue.push_back((Token::Key(key), at));
        }

        let kind = match ty {
            Some(t) => kind_of(&t).ok_or_else(|| ParseError::malformed(format!("unknown {} `{}`", XML_TYPE, t), at))?,
            None => match kind_of(&tag.name) {
                Some(k) if !keyed => k,
                _ if !tag.attrs.is_empty() || (!tag.empty && self.has_child_elements()) => Kind::Object,
                _ => Kind::Text,
            },
        };

        match kind {
            Kind::Null => {
                if !tag.empty {
                    self.skip_misc()?;
                    self.end_tag(&tag.name)?;
                }
                self.queue.push_back((Token::Null, at));
            }
            Kind::Bool | Kind::Number | Kind::Text => {
                let text = if tag.empty {
                    String::new()
                } else {
                    self.text_content(&tag.name)?
                };
                let scalar = match kind {
                    Kind::Bool => RawScalar::new(text.trim().to_owned(), Hint::Bool),
                    Kind::Number => RawScalar::new(text.trim().to_owned(), Hint::Number),
                    _ => RawScalar::new(text, Hint::Text),
                };
                self.queue.push_back((Token::Scalar(scalar), at));
            }
            Kind::Array | Kind::Object => {
                let seq = kind == Kind::Array;
                self.queue
                    .push_back((if seq { Token::StartSeq } else { Token::StartMap }, at));
                if !seq {
                    for (k, v) in tag.attrs.drain(..) {
                        self.queue.push_back((Token::Key(k), at));
                        self.queue.push_back((Token::Scalar(RawScalar::new(v, Hint::Bare)), at));
                    }
                }
                if tag.empty {
                    self.queue.push_back((Token::End, at));
                } else {
                    self.frames.push(Frame {
                        name: tag.name,
                        keyed: !seq,
                    });
                }
            }
        }
        Ok(())
    }
}

impl<'a> FormatReader for XmlReader<'a> {
    fn next_token(&mut self) -> Result<(Token, Position), ParseError> {
        if let Some(t) = self.queue.pop_front() {
            return Ok(t);
        }

        self.skip_misc()?;
        let at = self.cur.position();

        if !self.started {
            self.started = true;
            if self.cur.is_eof() {
                return Err(ParseError::new(ParseErrorKind::UnexpectedEof, at));
            }
            if !self.cur.starts_with("<") {
                return Err(ParseError::malformed("expected a root element", at));
            }
            self.element(false)?;
        } else {
            let keyed = match self.frames.last() {
                None if self.cur.is_eof() => return Ok((Token::Eof, at)),
                None => return Err(ParseError::malformed("trailing characters after root element", at)),
                Some(f) => f.keyed,
            };
            if self.cur.is_eof() {
                return Err(ParseError::new(ParseErrorKind::Unterminated("element"), at));
            } else if self.cur.starts_with("</") {
                if let Some(f) = self.frames.pop() {
                    self.end_tag(&f.name)?;
                }
                self.queue.push_back((Token::End, at));
            } else if self.cur.starts_with("<") {
                self.element(keyed)?;
            } else {
                return Err(ParseError::malformed("unexpected text between elements", at));
            }
        }

        match self.queue.pop_front() {
            Some(t) => Ok(t),
            None => Err(ParseError::new(ParseErrorKind::UnexpectedEof, at)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::number::Number;

    fn tokens(src: &str) -> Result<Vec<Token>, ParseError> {
        let mut r = XmlReader::new(src);
        let mut out = Vec::new();
        loop {
            let (t, _) = r.next_token()?;
            if t == Token::Eof {
                return Ok(out);
            }
            out.push(t);
        }
    }

    fn scalar(s: &str, hint: Hint) -> Token { Token::Scalar(RawScalar::new(s.into(), hint)) }

    #[test]
    fn writes_kinds_and_keys() {
        let mut w = XmlWriter::new(false);
        let n = Number::from(36i32);
        w.start_map();
        assert!(w.put_property_attr("id", Scalar::Text("a&b")));
        w.put_key("name");
        w.put_scalar(Scalar::Text("<Ada>"));
        w.put_key("age");
        w.put_scalar(Scalar::Number(&n));
        w.put_key("not a name");
        w.put_null();
        w.put_key("tags");
        w.start_seq();
        w.put_scalar(Scalar::Bool(true));
        w.put_scalar(Scalar::Text(""));
        w.end_seq();
        w.put_key("empty");
        w.start_map();
        w.end_map();
        w.end_map();
        assert_eq!(
            std::str::from_utf8(&w.finish()).unwrap(),
            "<object id=\"a&amp;b\"><name>&lt;Ada&gt;</name><age _type=\"number\">36</age>\
             <_entry _key=\"not a name\" _type=\"null\"/><tags _type=\"array\"><boolean>true</boolean><string/></tags>\
             <empty _type=\"object\"/></object>"
        );
    }

    #[test]
    fn pretty_layout() {
        let mut w = XmlWriter::new(true);
        w.start_seq();
        w.put_scalar(Scalar::Text("x"));
        w.start_seq();
        w.end_seq();
        w.end_seq();
        assert_eq!(
            std::str::from_utf8(&w.finish()).unwrap(),
            "<array>\n  <string>x</string>\n  <array/>\n</array>"
        );
    }

    #[test]
    fn reads_back() {
        let t = tokens(
            "<?xml version=\"1.0\"?>\n<!-- c --><object id=\"7\"><name>A&amp;B</name>\
             <n _type=\"number\"> 1 </n><list _type=\"array\"><null/><string><![CDATA[<x>]]></string></list>\
             <inner><k>v</k></inner><_entry _key=\"a b\"/></object>",
        )
        .unwrap();
        assert_eq!(
            t,
            vec![
                Token::StartMap,
                Token::Key("id".into()),
                scalar("7", Hint::Bare),
                Token::Key("name".into()),
                scalar("A&B", Hint::Text),
                Token::Key("n".into()),
                scalar("1", Hint::Number),
                Token::Key("list".into()),
                Token::StartSeq,
                Token::Null,
                scalar("<x>", Hint::Text),
                Token::End,
                Token::Key("inner".into()),
                Token::StartMap,
                Token::Key("k".into()),
                scalar("v", Hint::Text),
                Token::End,
                Token::Key("a b".into()),
                scalar("", Hint::Text),
                Token::End,
            ]
        );
    }

    #[test]
    fn structural_errors() {
        assert!(tokens("<object><a>1</b></object>").is_err());
        assert_eq!(
            tokens("<array><string>x</string>").unwrap_err().kind,
            ParseErrorKind::Unterminated("element")
        );
        assert!(tokens("<string>x</string><string>y</string>").is_err());
        assert!(tokens("<number>&bogus;</number>").is_err());
    }

    #[test]
    fn escaping() {
        assert_eq!(escape("a<b", false), "a&lt;b");
        assert_eq!(escape("q\"\n", true), "q&quot;&#xa;");
        assert_eq!(escape("q\"\n", false), "q\"\n");
        assert_eq!(unescape("&#65;&#x42;&lt;").unwrap(), "AB<");
        assert_eq!(unescape(&escape("\r&\u{1}", false)).unwrap(), "\r&\u{1}");
    }
}
