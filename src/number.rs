//! Numbers, and classification of numeric literals.
//!
//! A literal is floating when it contains a `.`, an exponent marker, an `f`/`F`/`d`/`D`
//! suffix, or is one of `NaN`, `Infinity`. Everything else that looks numeric is an
//! integer, written in decimal, hexadecimal (`0x`, `0X`, `#`) or octal (a leading `0`).
//!
//! Without a target kind, integers are read as the narrowest of `i32` and `i64`, and
//! fall back to a (lossy) `f64` beyond that. Floating literals are read as `f64`.

use crate::{errors::NumberError, from_fn};
use half::f16;
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use std::{convert::TryFrom, fmt};

/// A number as it appears in a dynamic value.
///
/// Floating point values are stored as bits, so that `Number` can be `Eq` and `Hash`.
#[derive(Eq, PartialEq, Clone, Hash, Debug)]
pub enum Number {
    /// A 32-bit integer.
    Int(i32),
    /// A 64-bit integer.
    Long(i64),
    /// The bits of an `f32`.
    Float(u32),
    /// The bits of an `f64`.
    Double(u64),
    /// An integer that does not fit in 64 bits.
    Big(BigInt),
}

use Number::*;

/// An explicitly requested numeric type.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum NumberKind {
    /// `i32`
    Int,
    /// `i64`
    Long,
    /// `f32`
    Float,
    /// `f64`
    Double,
    /// arbitrary precision integer
    BigInt,
}

impl NumberKind {
    /// The name of the Rust type this kind stands for.
    pub fn type_name(self) -> &'static str {
        match self {
            NumberKind::Int => "i32",
            NumberKind::Long => "i64",
            NumberKind::Float => "f32",
            NumberKind::Double => "f64",
            NumberKind::BigInt => "BigInt",
        }
    }
}

from_fn!(Number, i8, |i: i8| Int(i32::from(i)));
from_fn!(Number, i16, |i: i16| Int(i32::from(i)));
from_fn!(Number, i32, Int);
from_fn!(Number, u8, |i: u8| Int(i32::from(i)));
from_fn!(Number, u16, |i: u16| Int(i32::from(i)));
from_fn!(Number, u32, |i: u32| Number::from(i64::from(i)));
from_fn!(Number, i64, |i: i64| i32::try_from(i).map_or(Long(i), Int));
from_fn!(Number, u64, |u: u64| i64::try_from(u).map_or_else(|_| Big(BigInt::from(u)), Number::from));
from_fn!(Number, i128, |i: i128| i64::try_from(i).map_or_else(|_| Big(BigInt::from(i)), Number::from));
from_fn!(Number, u128, |u: u128| i64::try_from(u).map_or_else(|_| Big(BigInt::from(u)), Number::from));
from_fn!(Number, isize, |i: isize| Number::from(i as i64));
from_fn!(Number, usize, |u: usize| Number::from(u as u64));
from_fn!(Number, f16, |f: f16| Float(f.to_f32().to_bits()));
from_fn!(Number, f32, |f: f32| Float(f.to_bits()));
from_fn!(Number, f64, |f: f64| Double(f.to_bits()));
from_fn!(Number, BigInt, |i: BigInt| i.to_i64().map_or_else(|| Big(i), Number::from));

impl Number {
    /// Returns `true` for `Int`, `Long` and `Big`.
    pub fn is_integer(&self) -> bool {
        match self {
            Int(_) | Long(_) | Big(_) => true,
            Float(_) | Double(_) => false,
        }
    }

    /// The value as an `f64`, rounding if necessary.
    pub fn as_f64(&self) -> f64 {
        match self {
            Int(i) => f64::from(*i),
            Long(i) => *i as f64,
            Float(bits) => f64::from(f32::from_bits(*bits)),
            Double(bits) => f64::from_bits(*bits),
            Big(i) => i.to_f64().unwrap_or(f64::NAN),
        }
    }

    /// The value as an `i64`, saturating floating point values the way `as` does.
    pub fn as_i64(&self) -> i64 {
        match self {
            Int(i) => i64::from(*i),
            Long(i) => *i,
            Float(_) | Double(_) => self.as_f64() as i64,
            Big(i) => i.to_i64().unwrap_or(if i.sign() == num_bigint::Sign::Minus {
                i64::MIN
            } else {
                i64::MAX
            }),
        }
    }
}

impl ToPrimitive for Number {
    fn to_i64(&self) -> Option<i64> {
        match self {
            Int(i) => Some(i64::from(*i)),
            Long(i) => Some(*i),
            Float(_) | Double(_) => self.as_f64().to_i64(),
            Big(i) => i.to_i64(),
        }
    }

    fn to_u64(&self) -> Option<u64> {
        match self {
            Int(i) => i.to_u64(),
            Long(i) => i.to_u64(),
            Float(_) | Double(_) => self.as_f64().to_u64(),
            Big(i) => i.to_u64(),
        }
    }

    fn to_i128(&self) -> Option<i128> {
        match self {
            Big(i) => i.to_i128(),
            _ => self.to_i64().map(i128::from),
        }
    }

    fn to_u128(&self) -> Option<u128> {
        match self {
            Big(i) => i.to_u128(),
            _ => self.to_u64().map(u128::from),
        }
    }

    fn to_f64(&self) -> Option<f64> { Some(self.as_f64()) }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Int(i) => write!(f, "{}", i),
            Long(i) => write!(f, "{}", i),
            Float(bits) => f.write_str(&format_f32(f32::from_bits(*bits))),
            Double(bits) => f.write_str(&format_f64(f64::from_bits(*bits))),
            Big(i) => write!(f, "{}", i),
        }
    }
}

/// Formats an `f64` as the shortest literal that reads back to the same value.
///
/// Non-finite values are written as `NaN`, `Infinity` and `-Infinity`.
pub fn format_f64(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_owned()
    } else if v.is_infinite() {
        if v > 0.0 { "Infinity" } else { "-Infinity" }.to_owned()
    } else {
        format!("{:?}", v)
    }
}

/// Like [`format_f64`], for `f32`.
pub fn format_f32(v: f32) -> String {
    if v.is_nan() {
        "NaN".to_owned()
    } else if v.is_infinite() {
        if v > 0.0 { "Infinity" } else { "-Infinity" }.to_owned()
    } else {
        format!("{:?}", v)
    }
}

/// The shape of a numeric literal.
#[derive(Debug, PartialEq)]
enum Literal<'a> {
    Integer {
        negative: bool,
        radix: u32,
        digits: &'a str,
    },
    Floating(f64),
}

fn split_sign(s: &str) -> (bool, &str) {
    if let Some(rest) = s.strip_prefix('-') {
        (true, rest)
    } else if let Some(rest) = s.strip_prefix('+') {
        (false, rest)
    } else {
        (false, s)
    }
}

fn all_digits(s: &str, radix: u32) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_digit(radix))
}

fn classify(s: &str) -> Option<Literal> {
    let (negative, body) = split_sign(s);
    if body.is_empty() {
        return None;
    }

    match body {
        "NaN" => return Some(Literal::Floating(f64::NAN)),
        "Infinity" => {
            return Some(Literal::Floating(if negative {
                f64::NEG_INFINITY
            } else {
                f64::INFINITY
            }))
        }
        _ => {}
    }

    let hex = body
        .strip_prefix("0x")
        .or_else(|| body.strip_prefix("0X"))
        .or_else(|| body.strip_prefix('#'));
    if let Some(hex) = hex {
        if hex.contains(|c| c == 'p' || c == 'P') {
            return hex_float(hex).map(|v| Literal::Floating(if negative { -v } else { v }));
        }
        return if all_digits(hex, 16) {
            Some(Literal::Integer {
                negative,
                radix: 16,
                digits: hex,
            })
        } else {
            None
        };
    }

    if all_digits(body, 10) {
        if body.len() > 1 && body.starts_with('0') {
            let oct = &body[1..];
            return if all_digits(oct, 8) {
                Some(Literal::Integer {
                    negative,
                    radix: 8,
                    digits: oct,
                })
            } else {
                None
            };
        }
        return Some(Literal::Integer {
            negative,
            radix: 10,
            digits: body,
        });
    }

    decimal_float(body).map(|v| Literal::Floating(if negative { -v } else { v }))
}

/// Reads `digits[.digits][(e|E)[+-]digits][fFdD]`, with at least one mantissa digit.
fn decimal_float(body: &str) -> Option<f64> {
    let b = body.as_bytes();
    let mut i = 0;
    let mut mantissa_digits = 0;

    while i < b.len() && b[i].is_ascii_digit() {
        i += 1;
        mantissa_digits += 1;
    }
    if i < b.len() && b[i] == b'.' {
        i += 1;
        while i < b.len() && b[i].is_ascii_digit() {
            i += 1;
            mantissa_digits += 1;
        }
    }
    if mantissa_digits == 0 {
        return None;
    }
    if i < b.len() && (b[i] == b'e' || b[i] == b'E') {
        i += 1;
        if i < b.len() && (b[i] == b'+' || b[i] == b'-') {
            i += 1;
        }
        let start = i;
        while i < b.len() && b[i].is_ascii_digit() {
            i += 1;
        }
        if i == start {
            return None;
        }
    }
    let end = i;
    if i < b.len() && matches!(b[i], b'f' | b'F' | b'd' | b'D') {
        i += 1;
    }
    if i != b.len() {
        return None;
    }
    body[..end].parse::<f64>().ok()
}

/// Reads `hexdigits[.hexdigits](p|P)[+-]digits[fFdD]`, without the radix marker.
fn hex_float(body: &str) -> Option<f64> {
    let body = body.trim_end_matches(|c| matches!(c, 'f' | 'F' | 'd' | 'D'));
    let p = body.find(|c| c == 'p' || c == 'P')?;
    let (mantissa, exp) = (&body[..p], &body[p + 1..]);

    let (int_part, frac_part) = match mantissa.find('.') {
        Some(dot) => (&mantissa[..dot], &mantissa[dot + 1..]),
        None => (mantissa, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    let is_hex = |s: &str| s.chars().all(|c| c.is_ascii_hexdigit());
    if !is_hex(int_part) || !is_hex(frac_part) {
        return None;
    }

    let (exp_negative, exp_digits) = split_sign(exp);
    if !all_digits(exp_digits, 10) {
        return None;
    }
    let exp: i32 = exp_digits.parse().ok()?;
    let exp = if exp_negative { -exp } else { exp };

    let mut m = 0f64;
    for c in int_part.chars().chain(frac_part.chars()) {
        m = m * 16.0 + f64::from(c.to_digit(16)?);
    }
    let frac_len = i32::try_from(frac_part.len()).ok()?;
    Some(m * 2f64.powi(exp - 4 * frac_len))
}

fn to_bigint(negative: bool, radix: u32, digits: &str) -> Option<BigInt> {
    let i = BigInt::parse_bytes(digits.as_bytes(), radix)?;
    Some(if negative { -i } else { i })
}

/// Returns `true` if `s` is a numeric literal in any supported notation.
pub fn is_numeric(s: &str) -> bool { classify(s).is_some() }

/// Returns `true` if `s` is a floating point literal.
pub fn is_float(s: &str) -> bool {
    matches!(classify(s), Some(Literal::Floating(_)))
}

/// Returns `true` if `s` is a plain decimal integer, optionally signed.
pub fn is_decimal(s: &str) -> bool {
    let (_, body) = split_sign(s);
    all_digits(body, 10)
}

/// Parses `s` as a number.
///
/// With `kind == None` the number type is autodetected. With an explicit kind, the value
/// must fit that kind, and integer kinds reject floating point literals.
///
/// # Example
///
/// ```
/// use marshal::number::{parse_number, Number, NumberKind};
///
/// assert_eq!(parse_number("2147483647", None), Ok(Number::Int(2147483647)));
/// assert_eq!(parse_number("2147483648", None), Ok(Number::Long(2147483648)));
/// assert!(parse_number("2147483648", Some(NumberKind::Int)).is_err());
/// ```
pub fn parse_number(s: &str, kind: Option<NumberKind>) -> Result<Number, NumberError> {
    let lit = classify(s).ok_or_else(|| NumberError::NotNumeric(s.to_owned()))?;
    let out_of_range = |k: NumberKind| NumberError::OutOfRange(s.to_owned(), k.type_name());

    match (kind, lit) {
        (None, Literal::Floating(v)) => Ok(Double(v.to_bits())),
        (
            None,
            Literal::Integer {
                negative,
                radix,
                digits,
            },
        ) => {
            let i = to_bigint(negative, radix, digits).ok_or_else(|| NumberError::NotNumeric(s.to_owned()))?;
            Ok(if let Some(small) = i.to_i32() {
                Int(small)
            } else if let Some(long) = i.to_i64() {
                Long(long)
            } else {
                Double(i.to_f64().unwrap_or(f64::NAN).to_bits())
            })
        }
        (Some(NumberKind::Double), lit) => Ok(Double(literal_f64(s, lit)?.to_bits())),
        (Some(NumberKind::Float), lit) => {
            let v = literal_f64(s, lit)?;
            let narrowed = v as f32;
            if v.is_finite() && narrowed.is_infinite() {
                return Err(out_of_range(NumberKind::Float));
            }
            Ok(Float(narrowed.to_bits()))
        }
        (Some(_), Literal::Floating(_)) => Err(NumberError::NotNumeric(s.to_owned())),
        (
            Some(k),
            Literal::Integer {
                negative,
                radix,
                digits,
            },
        ) => {
            let i = to_bigint(negative, radix, digits).ok_or_else(|| NumberError::NotNumeric(s.to_owned()))?;
            match k {
                NumberKind::Int => i.to_i32().map(Int).ok_or_else(|| out_of_range(k)),
                NumberKind::Long => i.to_i64().map(Long).ok_or_else(|| out_of_range(k)),
                _ => Ok(Big(i)),
            }
        }
    }
}

fn literal_f64(s: &str, lit: Literal) -> Result<f64, NumberError> {
    match lit {
        Literal::Floating(v) => Ok(v),
        Literal::Integer {
            negative,
            radix,
            digits,
        } => to_bigint(negative, radix, digits)
            .and_then(|i| i.to_f64())
            .ok_or_else(|| NumberError::NotNumeric(s.to_owned())),
    }
}

/// Parses an integer literal of any notation into a primitive integer type `T`.
///
/// Fails if the literal is floating point or out of `T`'s range.
pub fn parse_integer<T: num_traits::NumCast>(s: &str) -> Result<T, NumberError> {
    match classify(s) {
        Some(Literal::Integer {
            negative,
            radix,
            digits,
        }) => {
            let i = to_bigint(negative, radix, digits).ok_or_else(|| NumberError::NotNumeric(s.to_owned()))?;
            <T as num_traits::NumCast>::from(i).ok_or_else(|| NumberError::OutOfRange(s.to_owned(), std::any::type_name::<T>()))
        }
        _ => Err(NumberError::NotNumeric(s.to_owned())),
    }
}

/// Parses any numeric literal as an `f64`.
pub fn parse_float(s: &str) -> Result<f64, NumberError> {
    let lit = classify(s).ok_or_else(|| NumberError::NotNumeric(s.to_owned()))?;
    literal_f64(s, lit)
}

/// Parses an integer literal of any notation as a `BigInt`.
pub fn parse_bigint(s: &str) -> Result<BigInt, NumberError> {
    match parse_number(s, Some(NumberKind::BigInt))? {
        Big(i) => Ok(i),
        other => Err(NumberError::NotNumeric(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_boundaries() {
        assert_eq!(parse_number("2147483647", None), Ok(Int(i32::MAX)));
        assert_eq!(parse_number("-2147483648", None), Ok(Int(i32::MIN)));
        assert_eq!(parse_number("2147483648", None), Ok(Long(2147483648)));
        assert_eq!(parse_number("-2147483649", None), Ok(Long(-2147483649)));
        assert_eq!(parse_number("9223372036854775807", None), Ok(Long(i64::MAX)));
    }

    #[test]
    fn beyond_long_is_lossy_double() {
        let n = parse_number("9223372036854775808", None).unwrap();
        assert!(!n.is_integer());
        assert_eq!(n.as_f64(), 9.223372036854776e18);
        assert_eq!(n.as_i64(), i64::MAX);

        let n = parse_number("-9223372036854775809", None).unwrap();
        assert_eq!(n.as_i64(), i64::MIN);
    }

    #[test]
    fn explicit_kinds() {
        assert_eq!(
            parse_number("2147483648", Some(NumberKind::Int)),
            Err(NumberError::OutOfRange("2147483648".into(), "i32"))
        );
        assert_eq!(parse_number("2147483648", Some(NumberKind::Long)), Ok(Long(2147483648)));
        assert_eq!(
            parse_number("9223372036854775808", Some(NumberKind::BigInt)),
            Ok(Big(BigInt::parse_bytes(b"9223372036854775808", 10).unwrap()))
        );
        assert!(parse_number("1.5", Some(NumberKind::Int)).is_err());
        assert_eq!(parse_number("3", Some(NumberKind::Double)), Ok(Number::from(3.0f64)));
        assert_eq!(parse_number("1e39", Some(NumberKind::Float)), Err(NumberError::OutOfRange("1e39".into(), "f32")));
    }

    #[test]
    fn radix_markers() {
        for s in &["0x123", "0X123", "#123"] {
            assert_eq!(parse_number(s, None), Ok(Int(291)), "{}", s);
        }
        for s in &["-0x123", "-0X123", "-#123"] {
            assert_eq!(parse_number(s, None), Ok(Int(-291)), "{}", s);
        }
        assert_eq!(parse_number("0123", None), Ok(Int(83)));
        assert_eq!(parse_number("0", None), Ok(Int(0)));
        assert!(!is_numeric("0128"));
        assert_eq!(parse_integer::<u8>("0xff"), Ok(255u8));
        assert!(parse_integer::<u8>("0x100").is_err());
    }

    #[test]
    fn floating_literals() {
        assert_eq!(parse_number("1.5", None), Ok(Number::from(1.5f64)));
        assert_eq!(parse_number(".5", None), Ok(Number::from(0.5f64)));
        assert_eq!(parse_number("1e3", None), Ok(Number::from(1000f64)));
        assert_eq!(parse_number("2f", None), Ok(Number::from(2f64)));
        assert_eq!(parse_number("2D", None), Ok(Number::from(2f64)));
        assert_eq!(parse_number("-Infinity", None), Ok(Number::from(f64::NEG_INFINITY)));
        assert!(parse_number("NaN", None).unwrap().as_f64().is_nan());
        assert_eq!(parse_float("0x1.fffffffffffffp1023"), Ok(f64::MAX));
        assert_eq!(parse_float("0x1p-2"), Ok(0.25));
        assert!(is_float("1.0") && is_float("1e5") && !is_float("10"));
    }

    #[test]
    fn stray_characters_rejected() {
        for s in &[
            "214748364x", "0x123x", "0.123.4", "", "-", "+", "1e", "e1", ".", "0x", "#", "1.0ff", "nan", "inf", "1 ",
        ] {
            assert!(!is_numeric(s), "{:?} should not be numeric", s);
            assert!(parse_number(s, None).is_err());
        }
    }

    #[test]
    fn decimal_predicate() {
        assert!(is_decimal("123"));
        assert!(is_decimal("-0123"));
        assert!(!is_decimal("0x12"));
        assert!(!is_decimal("1.0"));
    }

    #[test]
    fn shortest_float_output() {
        assert_eq!(Number::from(1.0f64).to_string(), "1.0");
        assert_eq!(Number::from(0.1f64).to_string(), "0.1");
        assert_eq!(Number::from(0.1f32).to_string(), "0.1");
        assert_eq!(Number::from(f64::NAN).to_string(), "NaN");
        assert_eq!(Number::from(f64::NEG_INFINITY).to_string(), "-Infinity");
        for v in &[1e300, 1e-7, -0.0, 123456.789, f64::MIN_POSITIVE] {
            assert_eq!(parse_float(&format_f64(*v)), Ok(*v));
        }
    }

    #[test]
    fn narrowest_conversions() {
        assert_eq!(Number::from(5i64), Int(5));
        assert_eq!(Number::from(u64::MAX), Big(BigInt::from(u64::MAX)));
        assert_eq!(Number::from(BigInt::from(7)), Int(7));
    }
}
