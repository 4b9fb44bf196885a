//! JSON conversions.
//!
//! Serialisation takes a raw, untracked snapshot: wrappers are looked
//! through, accessors are evaluated against the raw object, and nothing is
//! subscribed even when called from inside an effect.

use serde::{Serialize, Serializer};

use super::object::{Object, ObjectKind};
use super::Value;
use crate::error::{ReactiveError, Result};
use crate::proxy::Proxy;
use crate::reactive::{ObjectId, Runtime};

/// Largest integer an `f64` represents exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => {
                Value::Object(Object::array(items.into_iter().map(Value::from)))
            }
            serde_json::Value::Object(fields) => {
                let record = fields
                    .into_iter()
                    .fold(Object::record(), |record, (key, value)| {
                        record.field(key, Value::from(value))
                    });
                Value::Object(record.build())
            }
        }
    }
}

impl Value {
    /// Parse a JSON document into fresh raw objects.
    pub fn from_json_str(json: &str) -> Result<Value> {
        let json: serde_json::Value = serde_json::from_str(json)?;
        Ok(Value::from(json))
    }

    /// Snapshot this value as JSON.
    ///
    /// Integral numbers become JSON integers and non-finite numbers become
    /// `null`, as do `undefined` values. Maps become arrays of `[key, value]`
    /// pairs, sets become arrays, and weak collections (which cannot be
    /// enumerated meaningfully) become `{}`.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let mut runtimes = vec![Runtime::current()];
        runtimes.extend(self.as_proxy().and_then(Proxy::runtime));
        Runtime::untrack_all(&runtimes, || Snapshot::default().value(self))
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

/// Serialisation state: the objects currently being visited.
#[derive(Default)]
struct Snapshot {
    path: Vec<ObjectId>,
}

impl Snapshot {
    fn value(&mut self, value: &Value) -> Result<serde_json::Value> {
        Ok(match value {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => number(*n),
            Value::String(s) => serde_json::Value::String(s.to_string()),
            Value::Object(object) => self.object(object)?,
            Value::Reactive(proxy) => self.object(proxy.raw())?,
        })
    }

    fn object(&mut self, object: &Object) -> Result<serde_json::Value> {
        let id = object.id();
        if self.path.contains(&id) {
            return Err(ReactiveError::CyclicValue { id });
        }
        self.path.push(id);
        let json = self.object_body(object);
        self.path.pop();
        json
    }

    fn object_body(&mut self, object: &Object) -> Result<serde_json::Value> {
        Ok(match object.kind() {
            ObjectKind::Record => {
                let mut fields = serde_json::Map::new();
                for key in object.keys() {
                    let value = object.get(&key);
                    fields.insert(key.to_string(), self.value(&value)?);
                }
                serde_json::Value::Object(fields)
            }
            ObjectKind::Array => {
                let items = object.array_items().unwrap_or_default();
                let items = items
                    .iter()
                    .map(|item| self.value(item))
                    .collect::<Result<Vec<_>>>()?;
                serde_json::Value::Array(items)
            }
            ObjectKind::Map => {
                let mut pairs = Vec::new();
                for (key, value) in object.collection_entries() {
                    pairs.push(serde_json::Value::Array(vec![
                        self.value(&key)?,
                        self.value(&value)?,
                    ]));
                }
                serde_json::Value::Array(pairs)
            }
            ObjectKind::Set => {
                let members = object
                    .collection_entries()
                    .iter()
                    .map(|(member, _)| self.value(member))
                    .collect::<Result<Vec<_>>>()?;
                serde_json::Value::Array(members)
            }
            ObjectKind::WeakMap | ObjectKind::WeakSet => {
                serde_json::Value::Object(serde_json::Map::new())
            }
        })
    }
}

fn number(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        return serde_json::Value::from(n as i64);
    }
    serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
}
