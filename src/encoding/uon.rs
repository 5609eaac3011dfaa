//! UON and URL-encoding.
//!
//! UON writes maps as `(k=v,k2=v2)` and sequences as `@(a,b)`. Strings are bare
//! unless they would read back as something else (`null`, `true`, a number, the empty
//! string) or contain syntax characters; quoted strings use `'...'`, with `~` escaping
//! `'` and `~`.
//!
//! URL-encoding is UON with a flat top level: maps and records become `k=v&k2=v2`,
//! sequences `0=a&1=b`, and anything else `_value=...`. Text is percent-encoded, with
//! `+` for spaces. Percent-decoded characters are always literal text, never syntax.
//!
//! # Example
//!
//! ```
//! use marshal::encoding::uon::{decode, encode, quote};
//!
//! assert_eq!(quote("it's"), "'it~'s'");
//! assert_eq!(quote("123"), "'123'");
//! assert_eq!(quote("plain"), "plain");
//! assert_eq!(encode("a b&c"), "a+b%26c");
//! assert_eq!(decode("a+b%26c"), "a b&c");
//! ```

use super::{
    constants::*,
    de::{FormatReader, Hint, RawScalar, Token},
    ser::{FormatWriter, Scalar},
};
use crate::{
    errors::{ParseError, ParseErrorKind, Position},
    number::is_numeric,
};
use bytes::{BufMut, BytesMut};
use smallvec::SmallVec;
use std::{borrow::Cow, collections::VecDeque, fmt::Write as _};

fn is_url_safe(c: char) -> bool { c.is_ascii_alphanumeric() || URL_SAFE.contains(c) }

/// Percent-encodes `s`. Spaces become `+`.
pub fn encode(s: &str) -> Cow<str> {
    if s.chars().all(is_url_safe) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len() + s.len() / 2);
    for c in s.chars() {
        if is_url_safe(c) {
            out.push(c);
        } else if c == ' ' {
            out.push('+');
        } else {
            let mut buf = [0; 4];
            for b in c.encode_utf8(&mut buf).bytes() {
                let _ = write!(out, "%{:02X}", b);
            }
        }
    }
    Cow::Owned(out)
}

/// Decodes `%XX` escapes and `+`. Malformed escapes are left as they are.
pub fn decode(s: &str) -> String { units(s, true).into_iter().map(|u| u.c).collect() }

fn needs_quotes(s: &str, key: bool) -> bool {
    s.is_empty()
        || s.starts_with(char::is_whitespace)
        || s.ends_with(char::is_whitespace)
        || s.chars().any(|c| UON_SPECIAL.contains(c))
        || (!key && (s == "null" || s == "true" || s == "false" || is_numeric(s)))
}

fn quote_with(s: &str, key: bool) -> Cow<str> {
    if !needs_quotes(s, key) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        if c == '\'' || c == '~' {
            out.push('~');
        }
        out.push(c);
    }
    out.push('\'');
    Cow::Owned(out)
}

/// Quotes `s` if it would not read back as the same string.
pub fn quote(s: &str) -> Cow<str> { quote_with(s, false) }

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Frame {
    Seq,
    Map,
    /// The flat top level of URL-encoding.
    Top,
    /// A sequence at the flat top level, written as indexed keys.
    TopSeq,
}

/// Writes UON, or URL-encoding when `url` is set.
pub(crate) struct UonWriter {
    out: BytesMut,
    url: bool,
    encode: bool,
    /// Open containers and their entry counts.
    frames: SmallVec<[(Frame, usize); 16]>,
}

impl UonWriter {
    fn new(url: bool, encode: bool) -> Self {
        UonWriter {
            out: BytesMut::with_capacity(128),
            url,
            encode,
            frames: SmallVec::new(),
        }
    }

    pub(crate) fn uon(encode: bool) -> Self { Self::new(false, encode) }

    pub(crate) fn url(encode: bool) -> Self { Self::new(true, encode) }

    fn put_text(&mut self, s: &str) {
        if self.encode {
            self.out.put_slice(encode(s).as_bytes());
        } else {
            self.out.put_slice(s.as_bytes());
        }
    }

    /// Separates a new value from the previous one.
    fn element(&mut self) {
        match self.frames.last_mut() {
            None if self.url => {
                self.out.put_slice(URL_VALUE.as_bytes());
                self.out.put_u8(b'=');
            }
            Some((Frame::Seq, n)) => {
                if *n > 0 {
                    self.out.put_u8(b',');
                }
                *n += 1;
            }
            Some((Frame::TopSeq, n)) => {
                if *n > 0 {
                    self.out.put_u8(b'&');
                }
                self.out.put_slice(n.to_string().as_bytes());
                self.out.put_u8(b'=');
                *n += 1;
            }
            _ => {}
        }
    }

    fn start(&mut self, frame: Frame, open: &[u8]) {
        if self.url && self.frames.is_empty() {
            let top = if frame == Frame::Seq { Frame::TopSeq } else { Frame::Top };
            self.frames.push((top, 0));
            return;
        }
        self.element();
        self.out.put_slice(open);
        self.frames.push((frame, 0));
    }

    fn end(&mut self) {
        if let Some((Frame::Seq, _)) | Some((Frame::Map, _)) = self.frames.pop() {
            self.out.put_u8(b')');
        }
    }
}

impl FormatWriter for UonWriter {
    fn put_null(&mut self) {
        self.element();
        self.out.put_slice(b"null");
    }

    fn put_scalar(&mut self, v: Scalar) {
        self.element();
        match v {
            Scalar::Bool(b) => self.out.put_slice(if b { &b"true"[..] } else { &b"false"[..] }),
            Scalar::Number(n) => self.put_text(&n.to_string()),
            Scalar::Text(s) => self.put_text(&quote(s)),
        }
    }

    fn start_seq(&mut self) { self.start(Frame::Seq, b"@(") }

    fn end_seq(&mut self) { self.end() }

    fn start_map(&mut self) { self.start(Frame::Map, b"(") }

    fn put_key(&mut self, key: &str) {
        let sep = match self.frames.last_mut() {
            Some((Frame::Top, n)) => {
                *n += 1;
                if *n > 1 {
                    Some(b'&')
                } else {
                    None
                }
            }
            Some((_, n)) => {
                *n += 1;
                if *n > 1 {
                    Some(b',')
                } else {
                    None
                }
            }
            None => None,
        };
        if let Some(sep) = sep {
            self.out.put_u8(sep);
        }
        self.put_text(&quote_with(key, true));
        self.out.put_u8(b'=');
    }

    fn end_map(&mut self) { self.end() }

    fn finish(self) -> BytesMut { self.out }
}

#[derive(Copy, Clone, Debug)]
/// One input character after percent-decoding.
struct Unit {
    c: char,
    /// Came from a `%XX` escape or `+`; never syntax.
    literal: bool,
    at: Position,
}

fn hex_byte(chars: &[char]) -> Option<u8> {
    match chars {
        [h, l, ..] => Some((h.to_digit(16)? * 16 + l.to_digit(16)?) as u8),
        _ => None,
    }
}

fn units(s: &str, decode: bool) -> Vec<Unit> {
    let chars: Vec<char> = s.chars().collect();
    let mut out = Vec::with_capacity(chars.len());
    let mut pending: Vec<u8> = Vec::new();
    let mut pending_at = Position::START;
    let (mut line, mut column) = (1, 1);

    let flush = |pending: &mut Vec<u8>, at: Position, out: &mut Vec<Unit>| {
        if pending.is_empty() {
            return;
        }
        for c in String::from_utf8_lossy(pending).chars() {
            out.push(Unit { c, literal: true, at });
        }
        pending.clear();
    };

    let mut i = 0;
    while i < chars.len() {
        let at = Position::new(line, column);
        let c = chars[i];
        match c {
            '%' if decode && hex_byte(&chars[i + 1..]).is_some() => {
                if pending.is_empty() {
                    pending_at = at;
                }
                pending.extend(hex_byte(&chars[i + 1..]));
                if std::str::from_utf8(&pending).is_ok() || pending.len() >= 4 {
                    flush(&mut pending, pending_at, &mut out);
                }
                i += 3;
                column += 3;
                continue;
            }
            '+' if decode => {
                flush(&mut pending, pending_at, &mut out);
                out.push(Unit {
                    c: ' ',
                    literal: true,
                    at,
                });
            }
            c => {
                flush(&mut pending, pending_at, &mut out);
                out.push(Unit { c, literal: false, at });
            }
        }
        if c == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
        i += 1;
    }
    flush(&mut pending, pending_at, &mut out);
    out
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Expect {
    Start,
    Value,
    /// Just after `@(`.
    ValueOrEnd,
    /// Just after `(`, `,` or `&`.
    KeyOrEnd,
    After,
    Done,
}

/// Reads UON, or URL-encoding when `url` is set.
pub(crate) struct UonReader {
    units: Vec<Unit>,
    i: usize,
    url: bool,
    end: Position,
    frames: SmallVec<[Frame; 16]>,
    expect: Expect,
    queue: VecDeque<(Token, Position)>,
}

impl UonReader {
    pub(crate) fn new(src: &str, url: bool, decode: bool) -> Self {
        let units = units(src, decode);
        let end = units
            .last()
            .map_or(Position::START, |u| Position::new(u.at.line, u.at.column + 1));
        UonReader {
            units,
            i: 0,
            url,
            end,
            frames: SmallVec::new(),
            expect: Expect::Start,
            queue: VecDeque::new(),
        }
    }

    fn pos(&self) -> Position { self.units.get(self.i).map_or(self.end, |u| u.at) }

    fn is_eof(&self) -> bool { self.i >= self.units.len() }

    /// Whether the unit at `i` is the syntax character `c`.
    fn raw_at(&self, i: usize, c: char) -> bool { self.units.get(i).map_or(false, |u| !u.literal && u.c == c) }

    fn raw(&self, c: char) -> bool { self.raw_at(self.i, c) }

    fn starts_with_raw(&self, s: &str) -> bool { s.chars().enumerate().all(|(n, c)| self.raw_at(self.i + n, c)) }

    fn skip_whitespace(&mut self) {
        while self
            .units
            .get(self.i)
            .map_or(false, |u| !u.literal && u.c.is_whitespace())
        {
            self.i += 1;
        }
    }

    fn unterminated(&self) -> ParseError {
        let what = match self.frames.last() {
            Some(Frame::Seq) => "sequence",
            _ => "map",
        };
        ParseError::new(ParseErrorKind::Unterminated(what), self.pos())
    }

    fn quoted(&mut self) -> Result<String, ParseError> {
        let at = self.pos();
        self.i += 1;
        let mut out = String::new();
        loop {
            let u = match self.units.get(self.i) {
                Some(u) => *u,
                None => return Err(ParseError::new(ParseErrorKind::Unterminated("string"), at)),
            };
            self.i += 1;
            if !u.literal && u.c == '\'' {
                return Ok(out);
            }
            if !u.literal && u.c == '~' {
                match self.units.get(self.i) {
                    Some(next) => out.push(next.c),
                    None => return Err(ParseError::new(ParseErrorKind::Unterminated("string"), at)),
                }
                self.i += 1;
            } else {
                out.push(u.c);
            }
        }
    }

    /// Reads unquoted text up to the next raw character in `stops`. Returns the text
    /// and whether any of it was percent-decoded.
    fn bare(&mut self, stops: &str) -> (String, bool) {
        let start = self.i;
        while let Some(u) = self.units.get(self.i) {
            if !u.literal && (stops.contains(u.c) || (self.url && u.c == '&')) {
                break;
            }
            self.i += 1;
        }
        let word = &self.units[start..self.i];
        let is_blank = |u: &Unit| !u.literal && u.c.is_whitespace();
        let first = word.iter().position(|u| !is_blank(u)).unwrap_or(word.len());
        let last = word.iter().rposition(|u| !is_blank(u)).map_or(first, |p| p + 1);
        let word = &word[first..last];
        (word.iter().map(|u| u.c).collect(), word.iter().any(|u| u.literal))
    }

    fn value(&mut self) -> Result<(Token, Position), ParseError> {
        self.skip_whitespace();
        let at = self.pos();
        if self.is_eof() && self.frames.is_empty() && !self.url {
            return Err(ParseError::new(ParseErrorKind::UnexpectedEof, at));
        }

        if self.raw('(') {
            self.i += 1;
            self.frames.push(Frame::Map);
            self.expect = Expect::KeyOrEnd;
            return Ok((Token::StartMap, at));
        }
        if self.starts_with_raw("@(") {
            self.i += 2;
            self.frames.push(Frame::Seq);
            self.expect = Expect::ValueOrEnd;
            return Ok((Token::StartSeq, at));
        }

        self.expect = Expect::After;
        if self.raw('\'') {
            let s = self.quoted()?;
            return Ok((Token::Scalar(RawScalar::new(s, Hint::Text)), at));
        }
        let tok = match self.bare(",)") {
            (word, true) => Token::Scalar(RawScalar::new(word, Hint::Text)),
            (word, false) if word == "null" => Token::Null,
            (word, false) if word.is_empty() => Token::Scalar(RawScalar::new(word, Hint::Text)),
            (word, false) => Token::Scalar(RawScalar::new(word, Hint::Bare)),
        };
        Ok((tok, at))
    }

    fn key(&mut self) -> Result<(Token, Position), ParseError> {
        let at = self.pos();
        let key = if self.raw('\'') {
            self.quoted()?
        } else {
            self.bare("=,)").0
        };
        self.skip_whitespace();
        if self.raw('=') {
            self.i += 1;
            self.expect = Expect::Value;
        } else {
            self.queue.push_back((Token::Null, self.pos()));
            self.expect = Expect::After;
        }
        Ok((Token::Key(key), at))
    }

    fn close(&mut self) -> (Token, Position) {
        let at = self.pos();
        self.i += 1;
        self.frames.pop();
        self.expect = Expect::After;
        (Token::End, at)
    }
}

impl FormatReader for UonReader {
    fn next_token(&mut self) -> Result<(Token, Position), ParseError> {
        if let Some(t) = self.queue.pop_front() {
            return Ok(t);
        }

        loop {
            self.skip_whitespace();
            match self.expect {
                Expect::Start if self.url && self.starts_with_raw(&format!("{}=", URL_VALUE)) => {
                    self.i += URL_VALUE.len() + 1;
                    self.expect = Expect::Value;
                }
                Expect::Start if self.url => {
                    let at = self.pos();
                    self.frames.push(Frame::Top);
                    self.expect = Expect::KeyOrEnd;
                    return Ok((Token::StartMap, at));
                }
                Expect::Start => self.expect = Expect::Value,
                Expect::Value => return self.value(),
                Expect::ValueOrEnd if self.raw(')') => return Ok(self.close()),
                Expect::ValueOrEnd => return self.value(),
                Expect::KeyOrEnd => match self.frames.last() {
                    Some(Frame::Top) if self.raw('&') => self.i += 1,
                    Some(Frame::Top) if self.is_eof() => {
                        let at = self.pos();
                        self.frames.pop();
                        self.expect = Expect::Done;
                        return Ok((Token::End, at));
                    }
                    Some(Frame::Map) if self.raw(')') => return Ok(self.close()),
                    Some(Frame::Map) if self.is_eof() => return Err(self.unterminated()),
                    _ => return self.key(),
                },
                Expect::After => {
                    let at = self.pos();
                    match self.frames.last() {
                        None => self.expect = Expect::Done,
                        Some(Frame::Top) if self.is_eof() => {
                            self.frames.pop();
                            self.expect = Expect::Done;
                            return Ok((Token::End, at));
                        }
                        Some(Frame::Top) if self.raw('&') => {
                            self.i += 1;
                            self.expect = Expect::KeyOrEnd;
                        }
                        Some(Frame::Top) => return Err(ParseError::malformed("expected `&`", at)),
                        Some(_) if self.is_eof() => return Err(self.unterminated()),
                        Some(_) if self.raw(')') => return Ok(self.close()),
                        Some(Frame::Seq) if self.raw(',') => {
                            self.i += 1;
                            self.expect = Expect::ValueOrEnd;
                        }
                        Some(Frame::Map) if self.raw(',') => {
                            self.i += 1;
                            self.expect = Expect::KeyOrEnd;
                        }
                        Some(_) => return Err(ParseError::malformed("expected `,` or `)`", at)),
                    }
                }
                Expect::Done if self.is_eof() => return Ok((Token::Eof, self.pos())),
                Expect::Done => return Err(ParseError::malformed("trailing characters after value", self.pos())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::number::Number;

    fn tokens(src: &str, url: bool) -> Result<Vec<(Token, Position)>, ParseError> {
        let mut r = UonReader::new(src, url, url);
        let mut out = Vec::new();
        loop {
            let t = r.next_token()?;
            if t.0 == Token::Eof {
                return Ok(out);
            }
            out.push(t);
        }
    }

    fn kinds(src: &str, url: bool) -> Vec<Token> { tokens(src, url).unwrap().into_iter().map(|t| t.0).collect() }

    fn bare(s: &str) -> Token { Token::Scalar(RawScalar::new(s.into(), Hint::Bare)) }

    fn text(s: &str) -> Token { Token::Scalar(RawScalar::new(s.into(), Hint::Text)) }

    #[test]
    fn uon_values() {
        assert_eq!(
            kinds("(a=1,b=@(true,null),c='x~'y',d=)", false),
            vec![
                Token::StartMap,
                Token::Key("a".into()),
                bare("1"),
                Token::Key("b".into()),
                Token::StartSeq,
                bare("true"),
                Token::Null,
                Token::End,
                Token::Key("c".into()),
                text("x'y"),
                Token::Key("d".into()),
                text(""),
                Token::End,
            ]
        );
        assert_eq!(kinds("@()", false), vec![Token::StartSeq, Token::End]);
        assert_eq!(kinds("( spaced out )", false), vec![
            Token::StartMap,
            Token::Key("spaced out".into()),
            Token::Null,
            Token::End
        ]);
    }

    #[test]
    fn url_top_level() {
        assert_eq!(
            kinds("a=1&flag&b=x+y", true),
            vec![
                Token::StartMap,
                Token::Key("a".into()),
                bare("1"),
                Token::Key("flag".into()),
                Token::Null,
                Token::Key("b".into()),
                text("x y"),
                Token::End,
            ]
        );
        assert_eq!(kinds("", true), vec![Token::StartMap, Token::End]);
        assert_eq!(kinds("_value=%27null%27", true), vec![text("'null'")]);
        assert_eq!(kinds("_value='null'", true), vec![text("null")]);
        assert_eq!(kinds("_value=null", true), vec![Token::Null]);
    }

    #[test]
    fn key_positions() {
        let t = tokens("a=1&unknown=3&b=2", true).unwrap();
        assert_eq!(t[3], (Token::Key("unknown".into()), Position::new(1, 5)));
    }

    #[test]
    fn structural_errors() {
        assert_eq!(
            tokens("(a=1", false).unwrap_err().kind,
            ParseErrorKind::Unterminated("map")
        );
        assert_eq!(
            tokens("'abc", false).unwrap_err().kind,
            ParseErrorKind::Unterminated("string")
        );
        assert!(tokens("(a=1)x", false).is_err());
        assert!(tokens("a=(b=1)c", true).is_err());
        assert_eq!(tokens("", false).unwrap_err().kind, ParseErrorKind::UnexpectedEof);
    }

    #[test]
    fn decoded_syntax_is_literal() {
        // %28 is `(`
        assert_eq!(kinds("a=%28b%29", true)[2], text("(b)"));
        assert_eq!(decode("%C3%A9t%C3%A9"), "été");
        assert_eq!(decode("100%"), "100%");
        assert_eq!(decode("%zz"), "%zz");
    }

    #[test]
    fn writer_forms() {
        let n = Number::from(1i32);

        let mut w = UonWriter::url(true);
        w.start_seq();
        w.put_scalar(Scalar::Text("a b"));
        w.put_scalar(Scalar::Number(&n));
        w.end_seq();
        assert_eq!(&w.finish()[..], &b"0=a+b&1=1"[..]);

        let mut w = UonWriter::url(true);
        w.put_scalar(Scalar::Text("true"));
        assert_eq!(&w.finish()[..], &b"_value='true'"[..]);

        let mut w = UonWriter::uon(false);
        w.start_map();
        w.put_key("k,1");
        w.start_seq();
        w.end_seq();
        w.put_key("e");
        w.start_map();
        w.end_map();
        w.put_key("s");
        w.put_scalar(Scalar::Text(""));
        w.end_map();
        assert_eq!(&w.finish()[..], &b"('k,1'=@(),e=(),s='')"[..]);
    }

    #[test]
    fn quoting() {
        for s in &["", "null", "1.5", " x", "a(b", "~", "a&b"] {
            assert!(quote(s).starts_with('\''), "{:?} should be quoted", s);
        }
        assert_eq!(quote_with("null", true), "null");
        assert_eq!(encode("é"), "%C3%A9");
        assert_eq!(encode("safe-_.!*()',=@~:/"), "safe-_.!*()',=@~:/");
    }
}
