use crate::from_fn;
use failure::Fail;
use std::{fmt, io};

/// A 1-based location in parser input.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Position {
    /// Line number, starting at 1.
    pub line: usize,
    /// Column number, starting at 1.
    pub column: usize,
}

impl Position {
    /// The first character of the input.
    pub const START: Position = Position { line: 1, column: 1 };

    /// Creates a new `Position`.
    pub fn new(line: usize, column: usize) -> Self { Position { line, column } }
}

impl Default for Position {
    fn default() -> Self { Position::START }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Fail)]
/// An error encountered when a literal cannot be read as a number.
pub enum NumberError {
    /// The literal does not have the shape of a number.
    #[fail(display = "'{}' is not a numeric literal", _0)]
    NotNumeric(String),
    /// The literal is a number, but does not fit the requested type.
    #[fail(display = "'{}' is out of range for `{}`", _0, _1)]
    OutOfRange(String, &'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Fail)]
/// An error raised while building a configuration store or a context from one.
pub enum ConfigError {
    /// A present option holds a value of the wrong kind.
    #[fail(display = "option `{}` expected a {} value, found `{}`", name, expected, found)]
    WrongKind {
        /// The option name.
        name: String,
        /// The kind the reader asked for.
        expected: &'static str,
        /// The value found, rendered as text.
        found: String,
    },
    /// A class-reference option names a class that was never registered.
    #[fail(display = "option `{}` names unknown class `{}`", name, class)]
    UnknownClass {
        /// The option name.
        name: String,
        /// The class name.
        class: String,
    },
    /// An option value is of the right kind but unusable.
    #[fail(display = "option `{}` is invalid: {}", name, reason)]
    Invalid {
        /// The option name.
        name: String,
        /// Why the value was rejected.
        reason: String,
    },
}

#[derive(Debug, Fail)]
/// An error raised while serializing a value.
pub enum SerializeError {
    /// A value refers back to one of its ancestors.
    #[fail(display = "cyclic reference to a `{}` value at depth {}", type_name, depth)]
    Cycle {
        /// The type of the value seen twice.
        type_name: String,
        /// The depth at which it was seen again.
        depth: usize,
    },
    /// The value is nested deeper than `Serializer.maxDepth.i`.
    #[fail(display = "maximum depth of {} exceeded", _0)]
    DepthExceeded(usize),
    /// The value has no representation in the target format.
    #[fail(display = "cannot serialize a `{}` value: {}", _0, _1)]
    Unserializable(String, String),
    /// The sink failed.
    #[fail(display = "failed writing to sink: {}", _0)]
    Io(#[cause] io::Error),
}

impl From<io::Error> for SerializeError {
    fn from(e: io::Error) -> Self { SerializeError::Io(e) }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// What went wrong during parsing.
pub enum ParseErrorKind {
    /// An unexpected character or token.
    Malformed(String),
    /// The input ended inside a value.
    UnexpectedEof,
    /// A container was not closed.
    Unterminated(&'static str),
    /// A key did not match any property of the target record.
    UnknownProperty {
        /// The key as it appeared in the input.
        name: String,
        /// The record type.
        type_name: String,
    },
    /// A required property was absent.
    MissingProperty {
        /// The property name.
        name: String,
        /// The record type.
        type_name: String,
    },
    /// The input is nested deeper than `Parser.maxDepth.i`.
    DepthExceeded(usize),
    /// A scalar could not be converted to the target type.
    Conversion {
        /// The target type.
        type_name: String,
        /// The reason given by the conversion.
        reason: String,
    },
    /// The target type cannot be built from this kind of input.
    Unparseable {
        /// The target type.
        type_name: String,
        /// The kind of input found.
        found: &'static str,
    },
    /// The source failed.
    Io(String),
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ParseErrorKind::*;
        match self {
            Malformed(s) => write!(f, "{}", s),
            UnexpectedEof => write!(f, "unexpected end of input"),
            Unterminated(what) => write!(f, "unterminated {}", what),
            UnknownProperty { name, type_name } => {
                write!(f, "unknown property `{}` on type `{}`", name, type_name)
            }
            MissingProperty { name, type_name } => {
                write!(f, "missing required property `{}` on type `{}`", name, type_name)
            }
            DepthExceeded(max) => write!(f, "maximum depth of {} exceeded", max),
            Conversion { type_name, reason } => {
                write!(f, "could not convert to `{}`: {}", type_name, reason)
            }
            Unparseable { type_name, found } => {
                write!(f, "cannot build a `{}` from {}", type_name, found)
            }
            Io(e) => write!(f, "failed reading source: {}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Fail)]
#[fail(display = "Parsing failed at {} with error: {}", position, kind)]
/// An error encountered when parsing fails. Always located.
pub struct ParseError {
    /// What went wrong.
    pub kind: ParseErrorKind,
    /// Where it went wrong.
    pub position: Position,
}

impl ParseError {
    /// Creates a new `ParseError`.
    pub fn new(kind: ParseErrorKind, position: Position) -> Self { ParseError { kind, position } }

    /// Creates a `ParseErrorKind::Malformed` error.
    pub fn malformed<S: Into<String>>(msg: S, position: Position) -> Self {
        ParseError::new(ParseErrorKind::Malformed(msg.into()), position)
    }

    /// The 1-based line of the error.
    pub fn line(&self) -> usize { self.position.line }

    /// The 1-based column of the error.
    pub fn column(&self) -> usize { self.position.column }
}

#[derive(Debug, Fail)]
/// Any error raised by the top-level entry points.
pub enum Error {
    /// See [`ConfigError`].
    #[fail(display = "{}", _0)]
    Config(#[cause] ConfigError),
    /// See [`SerializeError`].
    #[fail(display = "{}", _0)]
    Serialize(#[cause] SerializeError),
    /// See [`ParseError`].
    #[fail(display = "{}", _0)]
    Parse(#[cause] ParseError),
}

from_fn!(Error, ConfigError, Error::Config);
from_fn!(Error, SerializeError, Error::Serialize);
from_fn!(Error, ParseError, Error::Parse);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_display_is_located() {
        let e = ParseError::new(
            ParseErrorKind::UnknownProperty {
                name: "x".into(),
                type_name: "B".into(),
            },
            Position::new(1, 5),
        );
        assert_eq!(
            e.to_string(),
            "Parsing failed at line 1, column 5 with error: unknown property `x` on type `B`"
        );
        assert_eq!((e.line(), e.column()), (1, 5));
    }
}
