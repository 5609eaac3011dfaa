//! The parsing traversal shared by every format.
//!
//! Each format supplies a [`FormatReader`] that turns its input into [`Token`]s.
//! [`read_top`] drives a reader against a target [`TypeDescriptor`], building the
//! value through the descriptor's erased constructors.

use crate::{
    context::ParserSession,
    descriptor::{AnyBox, Category, RecordOps, ScalarKind, TypeDescriptor},
    errors::{ParseError, ParseErrorKind, Position},
    number::{is_numeric, parse_number},
    vecmap::{ObjectList, ObjectMap},
    Value,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
/// What the input syntax says about a scalar.
pub(crate) enum Hint {
    /// Quoted, or otherwise marked as a string.
    Text,
    /// Marked as a number.
    Number,
    /// Marked as a boolean.
    Bool,
    /// Unmarked; the text decides.
    Bare,
}

#[derive(Clone, Debug, PartialEq)]
/// A scalar as it appeared in the input.
pub(crate) struct RawScalar {
    pub(crate) text: String,
    pub(crate) hint: Hint,
}

impl RawScalar {
    pub(crate) fn new(text: String, hint: Hint) -> Self { RawScalar { text, hint } }
}

#[derive(Clone, Debug, PartialEq)]
/// The tokens every format reader produces.
///
/// Map entries are a [`Token::Key`] followed by exactly one value. Both sequences and
/// maps are closed by [`Token::End`].
pub(crate) enum Token {
    Null,
    Scalar(RawScalar),
    StartSeq,
    StartMap,
    Key(String),
    End,
    Eof,
}

impl Token {
    fn describe(&self) -> &'static str {
        match self {
            Token::Null => "null",
            Token::Scalar(_) => "a value",
            Token::StartSeq => "the start of a sequence",
            Token::StartMap => "the start of a map",
            Token::Key(_) => "a key",
            Token::End => "the end of a container",
            Token::Eof => "end of input",
        }
    }
}

/// The token layer of one input format.
pub(crate) trait FormatReader {
    /// Reads the next token and the position it starts at. Once the input is
    /// exhausted, returns [`Token::Eof`] forever.
    fn next_token(&mut self) -> Result<(Token, Position), ParseError>;
}

/// A reader with one token of lookahead.
pub(crate) struct Tokens<R> {
    reader: R,
    peeked: Option<(Token, Position)>,
}

impl<R: FormatReader> Tokens<R> {
    pub(crate) fn new(reader: R) -> Self { Tokens { reader, peeked: None } }

    pub(crate) fn next(&mut self) -> Result<(Token, Position), ParseError> {
        match self.peeked.take() {
            Some(t) => Ok(t),
            None => self.reader.next_token(),
        }
    }

    pub(crate) fn peek(&mut self) -> Result<&(Token, Position), ParseError> {
        if self.peeked.is_none() {
            self.peeked = Some(self.reader.next_token()?);
        }
        match &self.peeked {
            Some(t) => Ok(t),
            None => unreachable!(),
        }
    }

    /// Whether the next token is `t`.
    pub(crate) fn peek_is(&mut self, t: &Token) -> Result<bool, ParseError> { Ok(self.peek()?.0 == *t) }

    /// Where the next token starts.
    pub(crate) fn peek_position(&mut self) -> Result<Position, ParseError> { Ok(self.peek()?.1) }
}

#[derive(Clone)]
/// A position-tracking view of text input, used by the JSON and XML readers.
pub(crate) struct Cursor<'a> {
    src: &'a str,
    at: usize,
    line: usize,
    column: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(src: &'a str) -> Self {
        Cursor {
            src,
            at: 0,
            line: 1,
            column: 1,
        }
    }

    pub(crate) fn position(&self) -> Position { Position::new(self.line, self.column) }

    pub(crate) fn rest(&self) -> &'a str { &self.src[self.at..] }

    pub(crate) fn is_eof(&self) -> bool { self.at >= self.src.len() }

    pub(crate) fn peek(&self) -> Option<char> { self.rest().chars().next() }

    pub(crate) fn starts_with(&self, s: &str) -> bool { self.rest().starts_with(s) }

    pub(crate) fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.at += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    /// Consumes `s` if the input continues with it.
    pub(crate) fn eat(&mut self, s: &str) -> bool {
        if !self.starts_with(s) {
            return false;
        }
        for _ in s.chars() {
            self.bump();
        }
        true
    }

    pub(crate) fn skip_whitespace(&mut self) {
        while self.peek().map_or(false, char::is_whitespace) {
            self.bump();
        }
    }

    /// Consumes characters while `f` holds, returning them.
    pub(crate) fn take_while(&mut self, f: impl Fn(char) -> bool) -> &'a str {
        let start = self.at;
        while self.peek().map_or(false, &f) {
            self.bump();
        }
        &self.src[start..self.at]
    }
}

fn unexpected(tok: &Token, at: Position) -> ParseError {
    match tok {
        Token::Eof => ParseError::new(ParseErrorKind::UnexpectedEof, at),
        other => ParseError::malformed(format!("unexpected {}", other.describe()), at),
    }
}

fn conversion(desc: &TypeDescriptor, at: Position) -> impl FnOnce(String) -> ParseError + '_ {
    move |reason| {
        ParseError::new(
            ParseErrorKind::Conversion {
                type_name: desc.name().to_owned(),
                reason,
            },
            at,
        )
    }
}

fn unparseable(desc: &TypeDescriptor, found: &'static str, at: Position) -> ParseError {
    ParseError::new(
        ParseErrorKind::Unparseable {
            type_name: desc.name().to_owned(),
            found,
        },
        at,
    )
}

/// Parses a complete input into a value described by `desc`. Anything after the
/// value is an error.
pub(crate) fn read_top<R: FormatReader>(
    session: &mut ParserSession,
    reader: R,
    desc: &TypeDescriptor,
) -> Result<AnyBox, ParseError> {
    let mut engine = Engine {
        session,
        tokens: Tokens::new(reader),
    };
    let v = engine.read_value(desc)?;
    match engine.tokens.next()? {
        (Token::Eof, _) => Ok(v),
        (_, at) => Err(ParseError::malformed("trailing characters after value", at)),
    }
}

struct Engine<'s, 'c, R> {
    session: &'s mut ParserSession<'c>,
    tokens: Tokens<R>,
}

impl<'s, 'c, R: FormatReader> Engine<'s, 'c, R> {
    fn trimmed(&self, s: String) -> String {
        if self.session.settings().trim_strings {
            s.trim().to_owned()
        } else {
            s
        }
    }

    fn read_value(&mut self, desc: &TypeDescriptor) -> Result<AnyBox, ParseError> {
        match desc.category() {
            Category::Optional(ops) => {
                let at = self.tokens.peek_position()?;
                if self.tokens.peek_is(&Token::Null)? {
                    self.tokens.next()?;
                    return match &ops.empty {
                        Some(make) => Ok(make()),
                        None => Err(unparseable(desc, "null", at)),
                    };
                }
                let inner = self.read_value(&ops.inner())?;
                (ops.wrap)(inner).map_err(conversion(desc, at))
            }
            Category::Pointer(ops) => {
                let at = self.tokens.peek_position()?;
                let inner = self.read_value(&ops.inner())?;
                (ops.wrap)(inner).map_err(conversion(desc, at))
            }
            Category::Dynamic => Ok(Box::new(self.read_dynamic()?)),
            Category::Scalar(ops) => match self.tokens.next()? {
                (Token::Scalar(raw), at) => {
                    let text = self.trimmed(raw.text);
                    (ops.from_text)(&text).map_err(conversion(desc, at))
                }
                (Token::Null, at) if ops.kind() == ScalarKind::Null => (ops.from_text)("").map_err(conversion(desc, at)),
                (tok, at) => Err(self.not_scalar(desc, &tok, at)),
            },
            Category::Wrapped(ops) => match self.tokens.next()? {
                (Token::Scalar(raw), at) => {
                    let text = self.trimmed(raw.text);
                    (ops.from_text)(&text).map_err(conversion(desc, at))
                }
                (tok, at) => Err(self.not_scalar(desc, &tok, at)),
            },
            Category::Sequence(ops) => {
                let element = ops.element();
                let (tok, at) = self.tokens.next()?;
                let mut items = Vec::new();
                match tok {
                    Token::StartSeq => {
                        self.session.enter(at)?;
                        loop {
                            if self.tokens.peek_is(&Token::End)? {
                                self.tokens.next()?;
                                break;
                            }
                            items.push(self.read_value(&element)?);
                        }
                        self.session.leave();
                    }
                    // `0=a&1=b`: only at the top level of URL-encoding
                    Token::StartMap if self.session.indexed_top_level() => {
                        self.session.enter(at)?;
                        loop {
                            match self.tokens.next()? {
                                (Token::End, _) => break,
                                (Token::Key(k), key_at) => {
                                    if k != items.len().to_string() {
                                        return Err(ParseError::malformed(
                                            format!("expected index `{}`, found key `{}`", items.len(), k),
                                            key_at,
                                        ));
                                    }
                                    items.push(self.read_value(&element)?)
                                }
                                (tok, at) => return Err(unexpected(&tok, at)),
                            }
                        }
                        self.session.leave();
                    }
                    Token::StartMap => return Err(unparseable(desc, "a map", at)),
                    Token::Null => return Err(unparseable(desc, "null", at)),
                    Token::Scalar(_) => return Err(unparseable(desc, "a scalar", at)),
                    other => return Err(unexpected(&other, at)),
                }
                (ops.collect)(items).map_err(conversion(desc, at))
            }
            Category::Mapping(ops) => {
                let value = ops.value();
                let (tok, at) = self.tokens.next()?;
                match tok {
                    Token::StartMap => {}
                    Token::Null => return Err(unparseable(desc, "null", at)),
                    Token::Scalar(_) => return Err(unparseable(desc, "a scalar", at)),
                    Token::StartSeq => return Err(unparseable(desc, "a sequence", at)),
                    other => return Err(unexpected(&other, at)),
                }
                self.session.enter(at)?;
                let mut pairs = Vec::new();
                loop {
                    match self.tokens.next()? {
                        (Token::End, _) => break,
                        (Token::Key(k), _) => {
                            let k = self.trimmed(k);
                            pairs.push((k, self.read_value(&value)?));
                        }
                        (tok, at) => return Err(unexpected(&tok, at)),
                    }
                }
                self.session.leave();
                (ops.collect)(pairs).map_err(conversion(desc, at))
            }
            Category::Record(ops) => self.read_record(desc, ops),
            Category::Opaque => {
                let at = self.tokens.peek_position()?;
                Err(unparseable(desc, "input", at))
            }
        }
    }

    fn not_scalar(&self, desc: &TypeDescriptor, tok: &Token, at: Position) -> ParseError {
        match tok {
            Token::Null => unparseable(desc, "null", at),
            Token::StartSeq => unparseable(desc, "a sequence", at),
            Token::StartMap => unparseable(desc, "a map", at),
            other => unexpected(other, at),
        }
    }

    fn read_record(&mut self, desc: &TypeDescriptor, ops: &RecordOps) -> Result<AnyBox, ParseError> {
        let (tok, at) = self.tokens.next()?;
        match tok {
            Token::StartMap => {}
            Token::Null => return Err(unparseable(desc, "null", at)),
            Token::Scalar(_) => return Err(unparseable(desc, "a scalar", at)),
            Token::StartSeq => return Err(unparseable(desc, "a sequence", at)),
            other => return Err(unexpected(&other, at)),
        }
        let make = match &ops.construct {
            Some(make) => make,
            None => return Err(unparseable(desc, "a map, but it has no constructor", at)),
        };

        self.session.enter(at)?;
        let filter = self.session.filter();
        let ignore_unknown = self.session.settings().ignore_unknown;
        let mut record = make();
        let mut seen = vec![false; ops.properties.len()];

        let end = loop {
            let (tok, at) = self.tokens.next()?;
            let key = match tok {
                Token::End => break at,
                Token::Key(k) => self.trimmed(k),
                other => return Err(unexpected(&other, at)),
            };

            let slot = ops
                .position(&key)
                .filter(|&i| filter.allows(desc.name(), ops.properties[i].name()));
            match slot {
                Some(i) if ops.properties[i].is_ignorable() => self.skip_value()?,
                Some(i) => {
                    let p = &ops.properties[i];
                    let value_at = self.tokens.peek_position()?;
                    let value = self.read_value(&p.descriptor())?;
                    p.write(&mut *record, value).map_err(conversion(desc, value_at))?;
                    seen[i] = true;
                }
                None if ignore_unknown => {
                    self.skip_value()?;
                    self.session.notify_unknown(&key, desc.name(), &*record, at);
                }
                None => {
                    return Err(ParseError::new(
                        ParseErrorKind::UnknownProperty {
                            name: key,
                            type_name: desc.name().to_owned(),
                        },
                        at,
                    ))
                }
            }
        };

        if let Some(missing) = ops
            .properties
            .iter()
            .zip(seen.iter())
            .find(|(p, seen)| p.is_required() && !**seen)
        {
            return Err(ParseError::new(
                ParseErrorKind::MissingProperty {
                    name: missing.0.name().to_owned(),
                    type_name: desc.name().to_owned(),
                },
                end,
            ));
        }
        self.session.leave();
        Ok(record)
    }

    /// Reads one value of unknown shape.
    fn read_dynamic(&mut self) -> Result<Value, ParseError> {
        let (tok, at) = self.tokens.next()?;
        match tok {
            Token::Null => Ok(Value::Null),
            Token::Scalar(raw) => self.dynamic_scalar(raw, at),
            Token::StartSeq => {
                self.session.enter(at)?;
                let mut list = ObjectList::new();
                loop {
                    if self.tokens.peek_is(&Token::End)? {
                        self.tokens.next()?;
                        break;
                    }
                    list.push(self.read_dynamic()?);
                }
                self.session.leave();
                Ok(Value::List(list))
            }
            Token::StartMap => {
                self.session.enter(at)?;
                let mut map = ObjectMap::new();
                loop {
                    match self.tokens.next()? {
                        (Token::End, _) => break,
                        (Token::Key(k), _) => {
                            let k = self.trimmed(k);
                            let v = self.read_dynamic()?;
                            map.insert(k, v);
                        }
                        (tok, at) => return Err(unexpected(&tok, at)),
                    }
                }
                self.session.leave();
                Ok(Value::Map(map))
            }
            other => Err(unexpected(&other, at)),
        }
    }

    fn dynamic_scalar(&self, raw: RawScalar, at: Position) -> Result<Value, ParseError> {
        let number = |text: &str| {
            parse_number(text, None)
                .map(Value::Number)
                .map_err(|e| ParseError::malformed(e.to_string(), at))
        };
        match raw.hint {
            Hint::Text => Ok(Value::Text(self.trimmed(raw.text))),
            Hint::Number => number(raw.text.trim()),
            Hint::Bool => match raw.text.trim() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                other => Err(ParseError::malformed(format!("`{}` is not a boolean", other), at)),
            },
            Hint::Bare if raw.text == "true" => Ok(Value::Bool(true)),
            Hint::Bare if raw.text == "false" => Ok(Value::Bool(false)),
            Hint::Bare if is_numeric(&raw.text) => number(&raw.text),
            Hint::Bare => Ok(Value::Text(self.trimmed(raw.text))),
        }
    }

    /// Skips exactly one value, however deeply nested.
    fn skip_value(&mut self) -> Result<(), ParseError> {
        let (tok, at) = self.tokens.next()?;
        match tok {
            Token::Null | Token::Scalar(_) => Ok(()),
            Token::StartSeq | Token::StartMap => {
                let mut open = 1usize;
                while open > 0 {
                    match self.tokens.next()? {
                        (Token::StartSeq, _) | (Token::StartMap, _) => open += 1,
                        (Token::End, _) => open -= 1,
                        (Token::Eof, at) => return Err(ParseError::new(ParseErrorKind::UnexpectedEof, at)),
                        _ => {}
                    }
                }
                Ok(())
            }
            other => Err(unexpected(&other, at)),
        }
    }
}
