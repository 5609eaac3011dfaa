//! Convenience re-exports.
//!
//! `use marshal::prelude::*;` brings in the dynamic value types, the `Describe` trait
//! and derive, the contexts, the option keys and the one-call entry points.

pub use crate::{
    config::*,
    context::{Format, Parser, ParserListener, ParserSession, Serializer, SerializerSession, SessionArgs},
    descriptor::{
        describe, register_override, DescriptorBuilder, Marshal, ScalarKind, TextOps, TypeDescriptor, TypeOverride,
    },
    encoding::{from_str, parse, parse_value, serialize, to_string},
    errors::{ConfigError, Error, ParseError, ParseErrorKind, Position, SerializeError},
    number::{Number, NumberKind},
    vecmap::{ObjectList, ObjectMap},
    Describe, Value,
};
pub use half::f16;
pub use num_bigint::BigInt;
