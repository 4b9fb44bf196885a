//! Layered scopes.
//!
//! Templates evaluate expressions against a stack of data objects: the
//! component's own state on top of the data of every enclosing element.
//! [`MergedScope`] presents such a stack as one object.

use serde::{Serialize, Serializer};

use super::object::ReactiveObject;
use super::ReactiveContainer;
use crate::error::Result;
use crate::reactive::Runtime;
use crate::value::{PropertyKey, Value};

/// Read/write view over an ordered stack of reactive objects.
///
/// Lookups search the layers front to back, so earlier layers shadow later
/// ones. Writes go to the first layer that already has the key, or to the
/// last layer when none does.
#[derive(Clone, Debug, Default)]
pub struct MergedScope {
    layers: Vec<ReactiveObject>,
}

impl MergedScope {
    /// Build a scope over `layers`, wrapping raw objects in the current
    /// runtime.
    ///
    /// # Errors
    ///
    /// Fails if a layer is not a record or an array.
    pub fn new<I, V>(layers: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let layers = layers
            .into_iter()
            .map(|layer| ReactiveObject::try_from(layer.into()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { layers })
    }

    pub fn layers(&self) -> &[ReactiveObject] {
        &self.layers
    }

    /// Add a layer behind the existing ones.
    pub fn push(&mut self, layer: ReactiveObject) {
        self.layers.push(layer);
    }

    fn owner(&self, key: &PropertyKey) -> Option<&ReactiveObject> {
        self.layers.iter().find(|layer| layer.has(key))
    }

    /// Read `key` from the first layer that has it.
    pub fn get(&self, key: impl Into<PropertyKey>) -> Value {
        let key = key.into();
        self.owner(&key)
            .map_or(Value::Undefined, |layer| layer.get(key))
    }

    /// Write `key` to the first layer that has it, else the last layer.
    pub fn set(&self, key: impl Into<PropertyKey>, value: impl Into<Value>) {
        let key = key.into();
        if let Some(layer) = self.owner(&key).or_else(|| self.layers.last()) {
            layer.set(key, value);
        }
    }

    pub fn has(&self, key: impl Into<PropertyKey>) -> bool {
        self.owner(&key.into()).is_some()
    }

    /// Delete `key` from the first layer that has it, uncovering the next.
    pub fn delete(&self, key: impl Into<PropertyKey>) -> bool {
        let key = key.into();
        self.owner(&key).is_some_and(|layer| layer.delete(key))
    }

    /// Union of the layers' keys, front layer first, without duplicates.
    pub fn keys(&self) -> Vec<PropertyKey> {
        let mut keys: Vec<PropertyKey> = Vec::new();
        for key in self.layers.iter().flat_map(ReactiveObject::keys) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    /// Collapse the stack into a single JSON object.
    ///
    /// Nothing is tracked, in the current runtime or in the layers' own.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let runtimes: Vec<Runtime> = std::iter::once(Runtime::current())
            .chain(self.layers.iter().filter_map(|layer| layer.proxy().runtime()))
            .collect();
        Runtime::untrack_all(&runtimes, || {
            let mut fields = serde_json::Map::new();
            for key in self.keys() {
                fields.insert(key.to_string(), self.get(&key).to_json()?);
            }
            Ok(serde_json::Value::Object(fields))
        })
    }
}

impl ReactiveContainer for MergedScope {
    type Key = PropertyKey;

    fn get(&self, key: PropertyKey) -> Value {
        MergedScope::get(self, key)
    }

    fn set(&self, key: PropertyKey, value: Value) {
        MergedScope::set(self, key, value)
    }

    fn has(&self, key: PropertyKey) -> bool {
        MergedScope::has(self, key)
    }

    fn delete(&self, key: PropertyKey) -> bool {
        MergedScope::delete(self, key)
    }
}

impl Serialize for MergedScope {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}
