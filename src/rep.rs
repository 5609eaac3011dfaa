//! [`Describe`] implementations for standard library and crate types.

use crate::{descriptor::*, number::*, vecmap::*, Value};
use half::f16;
use num_bigint::BigInt;
use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque},
    convert::TryFrom,
    hash::{BuildHasher, Hash},
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6},
    sync::{Arc, OnceLock},
};

/// A map key: any type with a lossless string form.
pub trait MapKey: Sized + Send + Sync + 'static {
    /// Renders the key.
    fn to_key(&self) -> String;

    /// Reads the key back.
    fn from_key(s: &str) -> Result<Self, String>;
}

impl MapKey for String {
    fn to_key(&self) -> String { self.clone() }

    fn from_key(s: &str) -> Result<Self, String> { Ok(s.to_owned()) }
}

impl MapKey for char {
    fn to_key(&self) -> String { self.to_string() }

    fn from_key(s: &str) -> Result<Self, String> { char_from_text(s) }
}

impl MapKey for bool {
    fn to_key(&self) -> String { self.to_string() }

    fn from_key(s: &str) -> Result<Self, String> { bool_from_text(s) }
}

fn bool_from_text(s: &str) -> Result<bool, String> {
    if s.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if s.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(format!("'{}' is not a boolean", s))
    }
}

fn char_from_text(s: &str) -> Result<char, String> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(format!("'{}' is not a single character", s)),
    }
}

macro_rules! describe_int {
    ($($t:ty),*) => {
        $(
            impl Describe for $t {
                fn describe() -> TypeDescriptor {
                    DescriptorBuilder::<$t>::new()
                        .scalar(
                            ScalarKind::Number,
                            |n| Value::Number(Number::from(*n)),
                            |s| parse_integer::<$t>(s).map_err(|e| e.to_string()),
                        )
                        .finish()
                }
            }

            impl MapKey for $t {
                fn to_key(&self) -> String { self.to_string() }

                fn from_key(s: &str) -> Result<Self, String> {
                    parse_integer::<$t>(s).map_err(|e| e.to_string())
                }
            }
        )*
    };
}

describe_int!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

impl Describe for f64 {
    fn describe() -> TypeDescriptor {
        DescriptorBuilder::<f64>::new()
            .scalar(
                ScalarKind::Number,
                |f| Value::Number(Number::from(*f)),
                |s| parse_float(s).map_err(|e| e.to_string()),
            )
            .finish()
    }
}

impl Describe for f32 {
    fn describe() -> TypeDescriptor {
        DescriptorBuilder::<f32>::new()
            .scalar(
                ScalarKind::Number,
                |f| Value::Number(Number::from(*f)),
                |s| match parse_number(s, Some(NumberKind::Float)) {
                    Ok(Number::Float(bits)) => Ok(f32::from_bits(bits)),
                    Ok(other) => Ok(other.as_f64() as f32),
                    Err(e) => Err(e.to_string()),
                },
            )
            .finish()
    }
}

impl Describe for f16 {
    fn describe() -> TypeDescriptor {
        DescriptorBuilder::<f16>::new()
            .scalar(
                ScalarKind::Number,
                |f| Value::Number(Number::from(*f)),
                |s| parse_float(s).map(f16::from_f64).map_err(|e| e.to_string()),
            )
            .finish()
    }
}

impl Describe for BigInt {
    fn describe() -> TypeDescriptor {
        DescriptorBuilder::<BigInt>::new()
            .scalar(
                ScalarKind::Number,
                |i| Value::Number(Number::from(i.clone())),
                |s| parse_bigint(s).map_err(|e| e.to_string()),
            )
            .finish()
    }
}

impl Describe for bool {
    fn describe() -> TypeDescriptor {
        DescriptorBuilder::<bool>::new()
            .scalar(ScalarKind::Bool, |b| Value::Bool(*b), bool_from_text)
            .finish()
    }
}

impl Describe for char {
    fn describe() -> TypeDescriptor {
        DescriptorBuilder::<char>::new()
            .scalar(ScalarKind::Text, |c| Value::from(*c), char_from_text)
            .finish()
    }
}

impl Describe for String {
    fn describe() -> TypeDescriptor {
        DescriptorBuilder::<String>::new()
            .scalar(ScalarKind::Text, |s| Value::Text(s.clone()), |s| Ok(s.to_owned()))
            .finish()
    }
}

impl Describe for () {
    fn describe() -> TypeDescriptor {
        DescriptorBuilder::<()>::new()
            .scalar(ScalarKind::Null, |_| Value::Null, |_| Ok(()))
            .finish()
    }
}

impl Describe for Value {
    fn describe() -> TypeDescriptor { DescriptorBuilder::<Value>::new().dynamic().finish() }
}

impl Describe for ObjectList {
    fn describe() -> TypeDescriptor {
        DescriptorBuilder::<ObjectList>::new()
            .sequence::<Value>(|l| Box::new(l.iter()), |v| Ok(ObjectList::from(v)))
            .finish()
    }
}

impl Describe for ObjectMap {
    fn describe() -> TypeDescriptor {
        DescriptorBuilder::<ObjectMap>::new()
            .mapping::<Value>(
                |m| Box::new(m.iter().map(|(k, v)| (k.clone(), v))),
                |pairs| Ok(pairs.into_iter().collect()),
            )
            .finish()
    }
}

impl<T: Describe> Describe for Vec<T> {
    fn describe() -> TypeDescriptor {
        DescriptorBuilder::<Vec<T>>::new()
            .sequence::<T>(|v| Box::new(v.iter()), Ok)
            .finish()
    }
}

impl<T: Describe> Describe for VecDeque<T> {
    fn describe() -> TypeDescriptor {
        DescriptorBuilder::<VecDeque<T>>::new()
            .sequence::<T>(|v| Box::new(v.iter()), |v| Ok(VecDeque::from(v)))
            .finish()
    }
}

impl<T: Describe + Ord> Describe for BTreeSet<T> {
    fn describe() -> TypeDescriptor {
        DescriptorBuilder::<BTreeSet<T>>::new()
            .sequence::<T>(|v| Box::new(v.iter()), |v| Ok(v.into_iter().collect()))
            .finish()
    }
}

impl<T: Describe + Eq + Hash, S: BuildHasher + Default + Send + Sync + 'static> Describe for HashSet<T, S> {
    fn describe() -> TypeDescriptor {
        DescriptorBuilder::<HashSet<T, S>>::new()
            .sequence::<T>(|v| Box::new(v.iter()), |v| Ok(v.into_iter().collect()))
            .finish()
    }
}

impl<T: Describe, const N: usize> Describe for [T; N] {
    fn describe() -> TypeDescriptor {
        DescriptorBuilder::<[T; N]>::new()
            .sequence::<T>(
                |a| Box::new(a.iter()),
                |v| {
                    let len = v.len();
                    <[T; N]>::try_from(v).map_err(|_| format!("expected {} elements, found {}", N, len))
                },
            )
            .finish()
    }
}

fn collect_keyed<K: MapKey, V, C: std::iter::FromIterator<(K, V)>>(pairs: Vec<(String, V)>) -> Result<C, String> {
    pairs
        .into_iter()
        .map(|(k, v)| K::from_key(&k).map(|k| (k, v)))
        .collect()
}

impl<K: MapKey + Eq + Hash, V: Describe, S: BuildHasher + Default + Send + Sync + 'static> Describe
    for HashMap<K, V, S>
{
    fn describe() -> TypeDescriptor {
        DescriptorBuilder::<HashMap<K, V, S>>::new()
            .mapping::<V>(
                |m| Box::new(m.iter().map(|(k, v)| (k.to_key(), v))),
                collect_keyed::<K, V, HashMap<K, V, S>>,
            )
            .finish()
    }
}

impl<K: MapKey + Eq + Hash, V: Describe, S: BuildHasher + Default + Send + Sync + 'static> Describe
    for hashbrown::HashMap<K, V, S>
{
    fn describe() -> TypeDescriptor {
        DescriptorBuilder::<hashbrown::HashMap<K, V, S>>::new()
            .mapping::<V>(
                |m| Box::new(m.iter().map(|(k, v)| (k.to_key(), v))),
                collect_keyed::<K, V, hashbrown::HashMap<K, V, S>>,
            )
            .finish()
    }
}

impl<K: MapKey + Ord, V: Describe> Describe for BTreeMap<K, V> {
    fn describe() -> TypeDescriptor {
        DescriptorBuilder::<BTreeMap<K, V>>::new()
            .mapping::<V>(
                |m| Box::new(m.iter().map(|(k, v)| (k.to_key(), v))),
                collect_keyed::<K, V, BTreeMap<K, V>>,
            )
            .finish()
    }
}

impl<T: Describe> Describe for Option<T> {
    fn describe() -> TypeDescriptor {
        DescriptorBuilder::<Option<T>>::new()
            .optional::<T>(Option::as_ref, |o| o)
            .finish()
    }
}

impl<T: Describe> Describe for OnceLock<T> {
    fn describe() -> TypeDescriptor {
        DescriptorBuilder::<OnceLock<T>>::new()
            .optional::<T>(OnceLock::get, |o| {
                let cell = OnceLock::new();
                if let Some(v) = o {
                    let _ = cell.set(v);
                }
                cell
            })
            .finish()
    }
}

impl<T: Describe> Describe for Box<T> {
    fn describe() -> TypeDescriptor {
        DescriptorBuilder::<Box<T>>::new()
            .pointer::<T>(|b| &**b, Box::new)
            .finish()
    }
}

impl<T: Describe> Describe for Arc<T> {
    fn describe() -> TypeDescriptor {
        DescriptorBuilder::<Arc<T>>::new()
            .pointer::<T>(|a| &**a, Arc::new)
            .finish()
    }
}

macro_rules! describe_as_text {
    ($($t:ty),*) => {
        $(
            impl Describe for $t {
                fn describe() -> TypeDescriptor {
                    DescriptorBuilder::<$t>::new()
                        .text(|v| v.to_string(), |s| s.parse::<$t>().map_err(|e| e.to_string()))
                        .finish()
                }
            }
        )*
    };
}

describe_as_text!(IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6);
