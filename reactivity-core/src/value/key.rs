//! Keys for properties and collection entries.

use std::fmt;
use std::rc::Rc;

use super::Value;
use crate::reactive::ObjectId;

/// Name of the array length property.
pub const LENGTH: &str = "length";

/// Largest array length. Array indices are below it; larger integer keys
/// are not writable on arrays.
pub const MAX_ARRAY_LENGTH: usize = u32::MAX as usize;

/// Key of a record or array property.
///
/// Canonical integer strings are indices, so `"0"` and `0` name the same
/// property, as they do on a JavaScript object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    Index(usize),
    Name(Rc<str>),
}

impl PropertyKey {
    /// The array `length` property.
    pub fn length() -> Self {
        PropertyKey::Name(Rc::from(LENGTH))
    }

    pub fn is_length(&self) -> bool {
        matches!(self, PropertyKey::Name(name) if &**name == LENGTH)
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            PropertyKey::Index(index) => Some(*index),
            PropertyKey::Name(_) => None,
        }
    }

    /// The index, if it can address an array element.
    pub fn as_array_index(&self) -> Option<usize> {
        self.as_index().filter(|index| *index < MAX_ARRAY_LENGTH)
    }
}

fn canonical_index(name: &str) -> Option<usize> {
    let index: usize = name.parse().ok()?;
    // "01" and "+1" are names, not indices
    (index.to_string() == name).then_some(index)
}

impl From<&str> for PropertyKey {
    fn from(name: &str) -> Self {
        match canonical_index(name) {
            Some(index) => PropertyKey::Index(index),
            None => PropertyKey::Name(Rc::from(name)),
        }
    }
}

impl From<String> for PropertyKey {
    fn from(name: String) -> Self {
        PropertyKey::from(name.as_str())
    }
}

impl From<Rc<str>> for PropertyKey {
    fn from(name: Rc<str>) -> Self {
        match canonical_index(&name) {
            Some(index) => PropertyKey::Index(index),
            None => PropertyKey::Name(name),
        }
    }
}

impl From<usize> for PropertyKey {
    fn from(index: usize) -> Self {
        PropertyKey::Index(index)
    }
}

impl From<&PropertyKey> for PropertyKey {
    fn from(key: &PropertyKey) -> Self {
        key.clone()
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::Index(index) => write!(f, "{index}"),
            PropertyKey::Name(name) => f.write_str(name),
        }
    }
}

/// Hashable identity of a map key or set member.
///
/// Follows SameValueZero: primitives compare by value with `NaN` equal to
/// itself and `-0` equal to `+0`; objects compare by identity. A reactive
/// wrapper keys the same as its raw object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    Undefined,
    Null,
    Bool(bool),
    Number(u64),
    String(Rc<str>),
    Object(ObjectId),
}

impl MapKey {
    pub fn of(value: &Value) -> MapKey {
        match value {
            Value::Undefined => MapKey::Undefined,
            Value::Null => MapKey::Null,
            Value::Bool(b) => MapKey::Bool(*b),
            Value::Number(n) => MapKey::Number(normalize_bits(*n)),
            Value::String(s) => MapKey::String(s.clone()),
            Value::Object(object) => MapKey::Object(object.id()),
            Value::Reactive(proxy) => MapKey::Object(proxy.raw().id()),
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, MapKey::Object(_))
    }
}

fn normalize_bits(n: f64) -> u64 {
    if n.is_nan() {
        f64::NAN.to_bits()
    } else if n == 0.0 {
        0.0f64.to_bits()
    } else {
        n.to_bits()
    }
}
