//! Collection traps: maps, sets and their weak variants.
//!
//! Every key the wrapper has seen owns an entry signal holding the wrapped
//! value, or `None` once the key is gone. A separate size signal is created
//! the first time anybody asks for the size or iterates.
//!
//! Iteration subscribes to the size. `values`, `entries` and `for_each`
//! additionally subscribe to every entry they yield; `keys` does not, so a
//! keys-only reader re-runs when entries come and go but not when a value
//! is replaced in place.
//!
//! Weak variants only accept objects as keys. Anything else is ignored by
//! writes and reads as absent.

use tracing::{debug, trace};

use super::{Proxy, ReactiveContainer};
use crate::reactive::Signal;
use crate::value::{MapKey, Object, Value};

/// Entry-node operations shared by maps and sets.
impl Proxy {
    fn accepts_key(&self, key: &Value) -> bool {
        if self.kind().is_weak() && !key.is_object() {
            debug!(object = %self.id(), key = key.type_name(), "ignoring non-object key on weak collection");
            return false;
        }
        true
    }

    /// Find or create the entry signal for a raw `key`.
    fn entry_node(&self, key: &Value) -> Signal<Option<Value>> {
        let map_key = MapKey::of(key);
        if let Some(node) = self.entries().borrow().entries.get(&map_key) {
            return node.clone();
        }
        let seed = self.raw().collection_get(key).map(|raw| self.wrap(raw));
        let node = self.signal(seed);
        trace!(object = %self.id(), signal = %node.id(), "creating entry node");
        self.entries()
            .borrow_mut()
            .entries
            .insert(map_key, node.clone());
        node
    }

    /// Tracked lookup: the wrapped value, or `None` when absent.
    fn read_entry(&self, key: &Value) -> Option<Value> {
        let key = key.to_raw();
        if !self.accepts_key(&key) {
            return None;
        }
        self.entry_node(&key).get()
    }

    /// Store `value` under `key` and notify readers if it changed.
    fn write_entry(&self, key: Value, value: Value) {
        let key = key.to_raw();
        let value = value.to_raw();
        if !self.accepts_key(&key) {
            return;
        }

        let node = self.entry_node(&key);
        let unchanged = node
            .peek()
            .is_some_and(|current| current.to_raw().same_value(&value));
        self.raw().collection_insert(key, value.clone());
        if !unchanged {
            node.set(Some(self.wrap(value)));
        }
        self.refresh_size();
    }

    fn delete_entry(&self, key: &Value) -> bool {
        let key = key.to_raw();
        let node = self
            .entries()
            .borrow_mut()
            .entries
            .shift_remove(&MapKey::of(&key));
        if let Some(node) = node {
            node.replace(None);
        }
        let removed = self.raw().collection_remove(&key);
        self.refresh_size();
        removed
    }

    fn clear_entries(&self) {
        let nodes: Vec<_> = self
            .entries()
            .borrow_mut()
            .entries
            .drain(..)
            .map(|(_, node)| node)
            .collect();
        debug!(object = %self.id(), nodes = nodes.len(), "clearing collection");
        for node in nodes {
            node.replace(None);
        }
        self.raw().collection_clear();
        self.refresh_size();
    }

    fn refresh_size(&self) {
        let size = self.entries().borrow().size.clone();
        if let Some(size) = size {
            size.set(self.raw().collection_len());
        }
    }

    /// Tracked size. Re-syncs with the target on every call.
    fn tracked_size(&self) -> usize {
        let len = self.raw().collection_len();
        let existing = self.entries().borrow().size.clone();
        let size = match existing {
            Some(size) => {
                size.set(len);
                size
            }
            None => {
                let size = self.signal(len);
                self.entries().borrow_mut().size = Some(size.clone());
                size
            }
        };
        size.get()
    }

    /// Raw keys of the live entries, after subscribing to the size.
    fn tracked_keys(&self) -> Vec<Value> {
        self.tracked_size();
        self.raw()
            .collection_entries()
            .into_iter()
            .map(|(key, _)| key)
            .collect()
    }
}

/// Reactive view over a map or weak map.
#[derive(Clone, PartialEq, Eq)]
pub struct ReactiveMap {
    proxy: Proxy,
}

impl ReactiveMap {
    pub(crate) fn from_proxy(proxy: Proxy) -> Self {
        Self { proxy }
    }

    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    pub fn into_proxy(self) -> Proxy {
        self.proxy
    }

    fn raw(&self) -> &Object {
        self.proxy.raw()
    }

    /// Tracked read; `undefined` when absent.
    pub fn get(&self, key: impl Into<Value>) -> Value {
        self.proxy.read_entry(&key.into()).unwrap_or_default()
    }

    /// Store an entry. Existing keys keep their position.
    pub fn set(&self, key: impl Into<Value>, value: impl Into<Value>) {
        self.proxy.write_entry(key.into(), value.into());
    }

    /// Tracked presence check: re-runs when the key is added or removed.
    pub fn has(&self, key: impl Into<Value>) -> bool {
        let key = key.into().to_raw();
        self.proxy.read_entry(&key);
        self.raw().collection_has(&key)
    }

    pub fn delete(&self, key: impl Into<Value>) -> bool {
        self.proxy.delete_entry(&key.into())
    }

    pub fn clear(&self) {
        self.proxy.clear_entries();
    }

    pub fn size(&self) -> usize {
        self.proxy.tracked_size()
    }

    /// Keys in insertion order, wrapped. Subscribes to the size only.
    pub fn keys(&self) -> Vec<Value> {
        self.proxy
            .tracked_keys()
            .into_iter()
            .map(|key| self.proxy.wrap(key))
            .collect()
    }

    /// Values in insertion order. Subscribes to the size and every entry.
    pub fn values(&self) -> Vec<Value> {
        self.proxy
            .tracked_keys()
            .iter()
            .map(|key| self.get(key))
            .collect()
    }

    /// `(key, value)` pairs in insertion order. Subscribes like `values`.
    pub fn entries(&self) -> Vec<(Value, Value)> {
        self.proxy
            .tracked_keys()
            .into_iter()
            .map(|key| {
                let value = self.get(&key);
                (self.proxy.wrap(key), value)
            })
            .collect()
    }

    /// Iterate over a snapshot of the entries. Subscribes like `entries`.
    pub fn iter(&self) -> impl Iterator<Item = (Value, Value)> {
        self.entries().into_iter()
    }

    /// Call `f(value, key)` for each entry. Subscribes like `values`.
    pub fn for_each(&self, mut f: impl FnMut(Value, Value)) {
        for (key, value) in self.entries() {
            f(value, key);
        }
    }
}

impl ReactiveContainer for ReactiveMap {
    type Key = Value;

    fn get(&self, key: Value) -> Value {
        ReactiveMap::get(self, key)
    }

    fn set(&self, key: Value, value: Value) {
        ReactiveMap::set(self, key, value)
    }

    fn has(&self, key: Value) -> bool {
        ReactiveMap::has(self, key)
    }

    fn delete(&self, key: Value) -> bool {
        ReactiveMap::delete(self, key)
    }
}

impl std::fmt::Debug for ReactiveMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.proxy.fmt(f)
    }
}

/// Reactive view over a set or weak set.
#[derive(Clone, PartialEq, Eq)]
pub struct ReactiveSet {
    proxy: Proxy,
}

impl ReactiveSet {
    pub(crate) fn from_proxy(proxy: Proxy) -> Self {
        Self { proxy }
    }

    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    pub fn into_proxy(self) -> Proxy {
        self.proxy
    }

    pub fn add(&self, value: impl Into<Value>) {
        let member = value.into();
        self.proxy.write_entry(member.clone(), member);
    }

    /// Tracked membership check.
    pub fn has(&self, value: impl Into<Value>) -> bool {
        let member = value.into().to_raw();
        self.proxy.read_entry(&member);
        self.proxy.raw().collection_has(&member)
    }

    pub fn delete(&self, value: impl Into<Value>) -> bool {
        self.proxy.delete_entry(&value.into())
    }

    pub fn clear(&self) {
        self.proxy.clear_entries();
    }

    pub fn size(&self) -> usize {
        self.proxy.tracked_size()
    }

    /// Members in insertion order, wrapped. Subscribes to the size and every
    /// member.
    pub fn values(&self) -> Vec<Value> {
        self.proxy
            .tracked_keys()
            .into_iter()
            .map(|member| {
                self.proxy
                    .read_entry(&member)
                    .unwrap_or_else(|| self.proxy.wrap(member))
            })
            .collect()
    }

    /// Members in insertion order, wrapped. Subscribes to the size only.
    pub fn keys(&self) -> Vec<Value> {
        self.proxy
            .tracked_keys()
            .into_iter()
            .map(|member| self.proxy.wrap(member))
            .collect()
    }

    /// `(member, member)` pairs. Subscribes like `values`.
    pub fn entries(&self) -> Vec<(Value, Value)> {
        self.values()
            .into_iter()
            .map(|member| (member.clone(), member))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = Value> {
        self.values().into_iter()
    }

    pub fn for_each(&self, mut f: impl FnMut(Value)) {
        for member in self.values() {
            f(member);
        }
    }
}

impl std::fmt::Debug for ReactiveSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.proxy.fmt(f)
    }
}
