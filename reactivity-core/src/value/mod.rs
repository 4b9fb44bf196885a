//! Dynamic Values
//!
//! The reactive layer wraps arbitrary, dynamically shaped data, so it works
//! over a small dynamic value model:
//!
//! - primitives: `undefined`, `null`, booleans, numbers and strings
//! - [`Object`]: a shared handle to a record, array, map, set or weak variant
//! - reactive wrappers ([`Proxy`]) around objects
//!
//! Equality is `Object.is`: `NaN` equals itself, `+0` and `-0` differ, and
//! objects and wrappers compare by identity. A wrapper never equals its raw
//! object; compare [`Value::to_raw`] results for that.

mod json;
mod key;
mod object;

use std::fmt;
use std::rc::Rc;

pub use key::{MapKey, PropertyKey, LENGTH, MAX_ARRAY_LENGTH};
pub use object::{
    CacheGetters, Getter, Object, ObjectKind, Property, RecordBuilder, Setter, WeakObject,
};
pub(crate) use object::Slot;

use crate::proxy::Proxy;
use crate::reactive::ObjectId;

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Object(Object),
    Reactive(Proxy),
}

impl Value {
    /// `Object.is` comparison.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => {
                (a.is_nan() && b.is_nan()) || (a == b && a.is_sign_negative() == b.is_sign_negative())
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Reactive(a), Value::Reactive(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Objects and reactive wrappers.
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Reactive(_))
    }

    pub fn is_reactive(&self) -> bool {
        matches!(self, Value::Reactive(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The number as an array index or length, if it is a whole,
    /// non-negative number.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n <= u32::MAX as f64 => {
                Some(*n as usize)
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The raw object, looking through a reactive wrapper.
    pub fn as_object(&self) -> Option<Object> {
        match self {
            Value::Object(object) => Some(object.clone()),
            Value::Reactive(proxy) => Some(proxy.raw().clone()),
            _ => None,
        }
    }

    pub fn as_proxy(&self) -> Option<&Proxy> {
        match self {
            Value::Reactive(proxy) => Some(proxy),
            _ => None,
        }
    }

    /// Id of the raw object behind this value.
    pub fn object_id(&self) -> Option<ObjectId> {
        match self {
            Value::Object(object) => Some(object.id()),
            Value::Reactive(proxy) => Some(proxy.raw().id()),
            _ => None,
        }
    }

    /// Name of the value's type, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(object) => object.kind().name(),
            Value::Reactive(proxy) => proxy.kind().name(),
        }
    }

    /// The raw object behind a wrapper, or the value unchanged.
    pub fn to_raw(&self) -> Value {
        match self {
            Value::Reactive(proxy) => Value::Object(proxy.raw().clone()),
            other => other.clone(),
        }
    }

    /// Read a record or array property.
    ///
    /// Goes through the wrapper's traps for reactive values, so the read is
    /// tracked; reads the raw object otherwise. Anything else yields
    /// `undefined`.
    pub fn get(&self, key: impl Into<PropertyKey>) -> Value {
        match self {
            Value::Object(object) => object.get(key),
            Value::Reactive(proxy) => match proxy.as_object() {
                Some(object) => object.get(key.into()),
                None => Value::Undefined,
            },
            _ => Value::Undefined,
        }
    }

    /// Write a record or array property; see [`Value::get`].
    pub fn set(&self, key: impl Into<PropertyKey>, value: impl Into<Value>) {
        match self {
            Value::Object(object) => object.set(key, value),
            Value::Reactive(proxy) => {
                if let Some(object) = proxy.as_object() {
                    object.set(key.into(), value);
                }
            }
            _ => {}
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same_value(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Object(object) => object.fmt(f),
            Value::Reactive(proxy) => proxy.fmt(f),
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Undefined
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! impl_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Number(n as f64)
                }
            }
        )*
    };
}

impl_from_number!(f64, f32, i32, i64, u32, u64, usize);

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Value::String(s)
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Value::Object(object)
    }
}

impl From<&Object> for Value {
    fn from(object: &Object) -> Self {
        Value::Object(object.clone())
    }
}

impl From<Proxy> for Value {
    fn from(proxy: Proxy) -> Self {
        Value::Reactive(proxy)
    }
}

impl From<&Value> for Value {
    fn from(value: &Value) -> Self {
        value.clone()
    }
}
