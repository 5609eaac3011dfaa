//! JSON.
//!
//! Output is standard JSON; non-finite floats are written as `NaN`, `Infinity` and
//! `-Infinity`. In simple mode strings use single quotes and keys that are
//! identifiers are left unquoted.
//!
//! Input may also use single-quoted strings, unquoted keys, the non-finite literals
//! and `/* */` or `//` comments.
//!
//! # Example
//!
//! ```
//! use marshal::encoding::json::{escape, unescape};
//!
//! assert_eq!(escape("say \"hi\"\n", '"'), "say \\\"hi\\\"\\n");
//! assert_eq!(unescape("\\u00e9t\\u00e9").unwrap(), "été");
//! ```

use super::{
    de::{Cursor, FormatReader, Hint, RawScalar, Token},
    ser::{FormatWriter, Scalar},
};
use crate::{
    errors::{ParseError, ParseErrorKind, Position},
    number::is_numeric,
};
use bytes::{BufMut, BytesMut};
use smallvec::SmallVec;
use std::{borrow::Cow, fmt::Write as _};

/// Escapes `s` for use between `quote` characters.
pub fn escape(s: &str, quote: char) -> Cow<str> {
    let needs = |c: char| c == quote || c == '\\' || (c as u32) < 0x20;
    if !s.chars().any(needs) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

fn hex4(chars: &mut std::str::Chars) -> Result<u32, String> {
    let digits: String = chars.by_ref().take(4).collect();
    if digits.len() != 4 {
        return Err("truncated `\\u` escape".into());
    }
    u32::from_str_radix(&digits, 16).map_err(|_| format!("invalid `\\u` escape `{}`", digits))
}

/// Resolves backslash escapes, including `\u` escapes and surrogate pairs.
pub fn unescape(s: &str) -> Result<String, String> {
    if !s.contains('\\') {
        return Ok(s.to_owned());
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hi = hex4(&mut chars)?;
                let code = if (0xD800..0xDC00).contains(&hi) {
                    if chars.next() != Some('\\') || chars.next() != Some('u') {
                        return Err("unpaired surrogate".into());
                    }
                    let lo = hex4(&mut chars)?;
                    if !(0xDC00..0xE000).contains(&lo) {
                        return Err("unpaired surrogate".into());
                    }
                    0x10000 + ((hi - 0xD800) << 10) + (lo - 0xDC00)
                } else {
                    hi
                };
                out.push(std::char::from_u32(code).ok_or_else(|| format!("invalid code point {:x}", code))?);
            }
            Some(other) => out.push(other),
            None => return Err("dangling `\\`".into()),
        }
    }
    Ok(out)
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Writes JSON.
pub(crate) struct JsonWriter {
    out: BytesMut,
    pretty: bool,
    simple: bool,
    /// One entry per open container: whether it has an element yet.
    open: SmallVec<[bool; 16]>,
    after_key: bool,
}

impl JsonWriter {
    pub(crate) fn new(pretty: bool, simple: bool) -> Self {
        JsonWriter {
            out: BytesMut::with_capacity(128),
            pretty,
            simple,
            open: SmallVec::new(),
            after_key: false,
        }
    }

    fn quote(&self) -> char {
        if self.simple {
            '\''
        } else {
            '"'
        }
    }

    fn put_string(&mut self, s: &str) {
        let q = self.quote();
        self.out.put_u8(q as u8);
        self.out.put_slice(escape(s, q).as_bytes());
        self.out.put_u8(q as u8);
    }

    fn newline(&mut self) {
        self.out.put_u8(b'\n');
        for _ in 0..self.open.len() {
            self.out.put_slice(b"  ");
        }
    }

    /// Separates a new element from the previous one.
    fn element(&mut self) {
        if self.after_key {
            self.after_key = false;
            return;
        }
        if let Some(has_items) = self.open.last_mut() {
            let first = !*has_items;
            *has_items = true;
            if !first {
                self.out.put_u8(b',');
            }
            if self.pretty {
                self.newline();
            }
        }
    }

    fn close(&mut self, bracket: u8) {
        let had_items = self.open.pop().unwrap_or(false);
        if self.pretty && had_items {
            self.newline();
        }
        self.out.put_u8(bracket);
    }
}

impl FormatWriter for JsonWriter {
    fn put_null(&mut self) {
        self.element();
        self.out.put_slice(b"null");
    }

    fn put_scalar(&mut self, v: Scalar) {
        self.element();
        match v {
            Scalar::Bool(b) => self.out.put_slice(if b { &b"true"[..] } else { &b"false"[..] }),
            Scalar::Number(n) => self.out.put_slice(n.to_string().as_bytes()),
            Scalar::Text(s) => self.put_string(s),
        }
    }

    fn start_seq(&mut self) {
        self.element();
        self.out.put_u8(b'[');
        self.open.push(false);
    }

    fn end_seq(&mut self) { self.close(b']') }

    fn start_map(&mut self) {
        self.element();
        self.out.put_u8(b'{');
        self.open.push(false);
    }

    fn put_key(&mut self, key: &str) {
        self.element();
        if self.simple && is_identifier(key) {
            self.out.put_slice(key.as_bytes());
        } else {
            self.put_string(key);
        }
        self.out.put_u8(b':');
        if self.pretty {
            self.out.put_u8(b' ');
        }
        self.after_key = true;
    }

    fn end_map(&mut self) { self.close(b'}') }

    fn finish(self) -> BytesMut { self.out }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Frame {
    Array,
    Object,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Expect {
    /// A value is required.
    Value,
    /// Just after `[`.
    ValueOrEnd,
    /// Just after `{`.
    KeyOrEnd,
    /// After `,` in an object.
    Key,
    /// After a complete value.
    After,
}

/// Reads JSON.
pub(crate) struct JsonReader<'a> {
    cur: Cursor<'a>,
    frames: SmallVec<[Frame; 16]>,
    expect: Expect,
}

impl<'a> JsonReader<'a> {
    pub(crate) fn new(src: &'a str) -> Self {
        JsonReader {
            cur: Cursor::new(src),
            frames: SmallVec::new(),
            expect: Expect::Value,
        }
    }

    fn skip_blank(&mut self) -> Result<(), ParseError> {
        loop {
            self.cur.skip_whitespace();
            let at = self.cur.position();
            if self.cur.eat("//") {
                self.cur.take_while(|c| c != '\n');
            } else if self.cur.eat("/*") {
                while !self.cur.eat("*/") {
                    if self.cur.bump().is_none() {
                        return Err(ParseError::new(ParseErrorKind::Unterminated("comment"), at));
                    }
                }
            } else {
                return Ok(());
            }
        }
    }

    fn eof_error(&self) -> ParseError {
        let at = self.cur.position();
        match self.frames.last() {
            None => ParseError::new(ParseErrorKind::UnexpectedEof, at),
            Some(Frame::Array) => ParseError::new(ParseErrorKind::Unterminated("array"), at),
            Some(Frame::Object) => ParseError::new(ParseErrorKind::Unterminated("object"), at),
        }
    }

    fn string(&mut self, quote: char) -> Result<String, ParseError> {
        let at = self.cur.position();
        self.cur.bump();
        let mut raw = String::new();
        loop {
            match self.cur.bump() {
                None => return Err(ParseError::new(ParseErrorKind::Unterminated("string"), at)),
                Some(c) if c == quote => break,
                Some('\\') => {
                    raw.push('\\');
                    match self.cur.bump() {
                        Some(c) => raw.push(c),
                        None => return Err(ParseError::new(ParseErrorKind::Unterminated("string"), at)),
                    }
                }
                Some(c) => raw.push(c),
            }
        }
        unescape(&raw).map_err(|e| ParseError::malformed(e, at))
    }

    fn value(&mut self, at: Position) -> Result<Token, ParseError> {
        let c = match self.cur.peek() {
            Some(c) => c,
            None => return Err(self.eof_error()),
        };
        match c {
            '{' => {
                self.cur.bump();
                self.frames.push(Frame::Object);
                self.expect = Expect::KeyOrEnd;
                Ok(Token::StartMap)
            }
            '[' => {
                self.cur.bump();
                self.frames.push(Frame::Array);
                self.expect = Expect::ValueOrEnd;
                Ok(Token::StartSeq)
            }
            '"' | '\'' => {
                let s = self.string(c)?;
                self.expect = Expect::After;
                Ok(Token::Scalar(RawScalar::new(s, Hint::Text)))
            }
            _ => {
                let word = self
                    .cur
                    .take_while(|c| c.is_alphanumeric() || c == '+' || c == '-' || c == '.' || c == '_');
                self.expect = Expect::After;
                match word {
                    "" => Err(ParseError::malformed(format!("unexpected character `{}`", c), at)),
                    "null" => Ok(Token::Null),
                    "true" | "false" => Ok(Token::Scalar(RawScalar::new(word.to_owned(), Hint::Bool))),
                    w if is_numeric(w) => Ok(Token::Scalar(RawScalar::new(w.to_owned(), Hint::Number))),
                    w => Err(ParseError::malformed(format!("unquoted string `{}`", w), at)),
                }
            }
        }
    }

    fn key(&mut self, at: Position) -> Result<Token, ParseError> {
        let key = match self.cur.peek() {
            None => return Err(self.eof_error()),
            Some(q) if q == '"' || q == '\'' => self.string(q)?,
            Some(c) => {
                let k = self.cur.take_while(|c| c.is_alphanumeric() || c == '_' || c == '$');
                if k.is_empty() {
                    return Err(ParseError::malformed(format!("expected a key, found `{}`", c), at));
                }
                k.to_owned()
            }
        };
        self.skip_blank()?;
        if !self.cur.eat(":") {
            return Err(ParseError::malformed("expected `:` after key", self.cur.position()));
        }
        self.expect = Expect::Value;
        Ok(Token::Key(key))
    }

    fn close(&mut self, at: Position) -> Result<Token, ParseError> {
        let closer = match self.frames.last() {
            Some(Frame::Array) => ']',
            Some(Frame::Object) => '}',
            None => return Err(ParseError::malformed("unbalanced closing bracket", at)),
        };
        if !self.cur.eat(&closer.to_string()) {
            return Err(ParseError::malformed(format!("expected `{}`", closer), at));
        }
        self.frames.pop();
        self.expect = Expect::After;
        Ok(Token::End)
    }
}

impl<'a> FormatReader for JsonReader<'a> {
    fn next_token(&mut self) -> Result<(Token, Position), ParseError> {
        self.skip_blank()?;
        let at = self.cur.position();
        let tok = match self.expect {
            Expect::Value => self.value(at)?,
            Expect::ValueOrEnd if self.cur.peek() == Some(']') => self.close(at)?,
            Expect::ValueOrEnd => self.value(at)?,
            Expect::KeyOrEnd if self.cur.peek() == Some('}') => self.close(at)?,
            Expect::KeyOrEnd | Expect::Key => self.key(at)?,
            Expect::After => match (self.frames.last(), self.cur.peek()) {
                (None, None) => Token::Eof,
                (None, Some(_)) => return Err(ParseError::malformed("trailing characters after value", at)),
                (Some(_), None) => return Err(self.eof_error()),
                (Some(frame), Some(',')) => {
                    self.cur.bump();
                    self.expect = match frame {
                        Frame::Array => Expect::Value,
                        Frame::Object => Expect::Key,
                    };
                    return self.next_token();
                }
                (Some(_), Some(']')) | (Some(_), Some('}')) => self.close(at)?,
                (Some(_), Some(c)) => return Err(ParseError::malformed(format!("unexpected character `{}`", c), at)),
            },
        };
        Ok((tok, at))
    }
}
