//! Object traps: records and arrays.

use std::cmp::Ordering;

use tracing::{debug, trace};

use super::nodes::FieldNode;
use super::{Proxy, ReactiveContainer};
use crate::reactive::{Computed, Signal};
use crate::value::{Getter, Object, ObjectKind, PropertyKey, Slot, Value};

/// Reactive view over a record or an array.
///
/// # Example
///
/// ```rust
/// use reactivity_core::{Object, ReactiveObject, Runtime, Value};
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let runtime = Runtime::new();
/// let _guard = runtime.enter();
///
/// let state = ReactiveObject::try_from(reactivity_core::reactive(
///     Object::record().field("count", 1).build(),
/// ))
/// .unwrap();
///
/// let seen = Rc::new(RefCell::new(Value::Undefined));
/// let _effect = reactivity_core::effect({
///     let (state, seen) = (state.clone(), seen.clone());
///     move || *seen.borrow_mut() = state.get("count")
/// });
///
/// state.set("count", 2);
/// runtime.flush();
/// assert_eq!(*seen.borrow(), Value::from(2));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct ReactiveObject {
    proxy: Proxy,
}

impl ReactiveObject {
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

    fn is_array(&self) -> bool {
        self.proxy.kind() == ObjectKind::Array
    }

    fn this(&self) -> Value {
        Value::Reactive(self.proxy.clone())
    }

    /// Read `key`.
    ///
    /// Data properties are tracked and come back wrapped. Getters run with
    /// the wrapper as receiver, so whatever they read is tracked too; cached
    /// getters are memoised as computeds. Absent keys read as `undefined`
    /// without subscribing.
    pub fn get(&self, key: impl Into<PropertyKey>) -> Value {
        let key = key.into();
        let node = self.proxy.fields().borrow().get(&key).cloned();
        if let Some(node) = node {
            return node.read();
        }

        match self.raw().slot(&key) {
            Slot::Absent | Slot::Accessor { get: None, .. } => Value::Undefined,
            Slot::Accessor { get: Some(getter), .. } => {
                if self.raw().caches_getter(&key) {
                    self.cached_getter(key, getter)
                } else {
                    getter(&self.this())
                }
            }
            Slot::Data(raw) => {
                let signal = self.proxy.signal(self.proxy.wrap(raw));
                trace!(object = %self.proxy.id(), %key, signal = %signal.id(), "creating field node");
                self.proxy
                    .fields()
                    .borrow_mut()
                    .insert(key, FieldNode::Signal(signal.clone()));
                signal.get()
            }
        }
    }

    fn cached_getter(&self, key: PropertyKey, getter: Getter) -> Value {
        let Some(runtime) = self.proxy.runtime() else {
            return getter(&self.this());
        };

        // The getter reads through the wrapper; holding it weakly keeps the
        // node table from owning itself.
        let weak = self.proxy.downgrade();
        let computed = Computed::new_in(&runtime, move || match Proxy::upgrade(&weak) {
            Some(proxy) => getter(&Value::Reactive(proxy)),
            None => Value::Undefined,
        });
        debug!(object = %self.proxy.id(), %key, "caching getter");
        self.proxy
            .fields()
            .borrow_mut()
            .insert(key, FieldNode::Getter(computed.clone()));
        computed.get()
    }

    /// Write `key`.
    ///
    /// Setters run with the wrapper as receiver; getter-only properties
    /// ignore writes. A data write that is `Object.is` the current raw value
    /// notifies nobody. Otherwise the key's readers are scheduled and the raw
    /// value is stored in the target.
    ///
    /// On arrays only indices and whole-number `length`s are accepted.
    /// Writing past the end refreshes `length`; shrinking `length` notifies
    /// the readers of the dropped indices.
    pub fn set(&self, key: impl Into<PropertyKey>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();

        match self.raw().slot(&key) {
            Slot::Accessor { set: Some(setter), .. } => {
                setter(&self.this(), value);
                return;
            }
            Slot::Accessor { set: None, .. } => {
                debug!(object = %self.proxy.id(), %key, "ignoring write to getter-only property");
                return;
            }
            Slot::Data(_) | Slot::Absent => {}
        }

        let raw = value.to_raw();
        if self.is_array() && !accepts_array_write(&key, &raw) {
            debug!(object = %self.proxy.id(), %key, "ignoring invalid array write");
            return;
        }

        let old_len = self.raw().array_len();
        let signal = self.field_signal(&key);
        if signal.peek().to_raw().same_value(&raw) {
            // Still create the key, as a plain assignment would
            if !self.raw().has(&key) {
                self.raw().write_data(key.clone(), raw);
                if let Some(old_len) = old_len {
                    self.sync_array(&key, old_len);
                }
            }
            return;
        }

        signal.set(self.proxy.wrap(raw.clone()));
        self.raw().write_data(key.clone(), raw);
        if let Some(old_len) = old_len {
            self.sync_array(&key, old_len);
        }
    }

    /// Find or create the data node for `key`.
    fn field_signal(&self, key: &PropertyKey) -> Signal<Value> {
        if let Some(FieldNode::Signal(signal)) = self.proxy.fields().borrow().get(key) {
            return signal.clone();
        }
        let seed = match self.raw().slot(key) {
            Slot::Data(raw) => self.proxy.wrap(raw),
            _ => Value::Undefined,
        };
        let signal = self.proxy.signal(seed);
        self.proxy
            .fields()
            .borrow_mut()
            .insert(key.clone(), FieldNode::Signal(signal.clone()));
        signal
    }

    fn sync_array(&self, key: &PropertyKey, old_len: usize) {
        let new_len = self.raw().array_len().unwrap_or(old_len);
        if new_len == old_len {
            return;
        }

        if !key.is_length() {
            let length = self.proxy.fields().borrow().get(&PropertyKey::length()).cloned();
            if let Some(FieldNode::Signal(length)) = length {
                length.set(Value::from(new_len));
            }
        }

        if new_len < old_len {
            let dropped: Vec<PropertyKey> = self
                .proxy
                .fields()
                .borrow()
                .keys()
                .filter(|key| {
                    key.as_index()
                        .is_some_and(|index| (new_len..old_len).contains(&index))
                })
                .cloned()
                .collect();
            trace!(object = %self.proxy.id(), dropped = dropped.len(), "array truncated");
            for key in &dropped {
                self.vacate(key);
            }
        }
    }

    /// Point the readers of `key` at `undefined`, notifying them even when
    /// the node already held it.
    ///
    /// The key keeps a data node afterwards: absent keys are read untracked,
    /// so this node is what lets a re-run reader see the next write.
    fn vacate(&self, key: &PropertyKey) {
        let node = self.proxy.fields().borrow().get(key).cloned();
        match node {
            Some(FieldNode::Signal(signal)) => signal.replace(Value::Undefined),
            Some(FieldNode::Getter(computed)) => {
                let signal = self.proxy.signal(Value::Undefined);
                self.proxy
                    .fields()
                    .borrow_mut()
                    .insert(key.clone(), FieldNode::Signal(signal));
                computed.retire();
            }
            None => {}
        }
    }

    /// Whether the target has `key`. Not tracked.
    pub fn has(&self, key: impl Into<PropertyKey>) -> bool {
        self.raw().has(key)
    }

    /// Delete `key`, notifying its readers.
    pub fn delete(&self, key: impl Into<PropertyKey>) -> bool {
        let key = key.into();
        self.vacate(&key);
        self.raw().remove(key)
    }

    /// Own keys of the target, in order. Not tracked.
    pub fn keys(&self) -> Vec<PropertyKey> {
        self.raw().keys()
    }

    // ------------------------------------------------------------------
    // Array helpers
    // ------------------------------------------------------------------

    /// Tracked `length`; zero for records without one.
    pub fn len(&self) -> usize {
        self.get(PropertyKey::length()).as_index().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw length, without subscribing.
    fn raw_len(&self) -> Option<usize> {
        self.raw().array_len()
    }

    fn raw_item(&self, index: usize) -> Value {
        self.raw().get(index)
    }

    /// Append `value`, returning the new length.
    pub fn push(&self, value: impl Into<Value>) -> usize {
        let Some(len) = self.raw_len() else {
            return 0;
        };
        self.set(len, value);
        len + 1
    }

    /// Remove and return the last element.
    pub fn pop(&self) -> Value {
        match self.raw_len() {
            Some(len) if len > 0 => {
                let last = self.proxy.wrap(self.raw_item(len - 1));
                self.truncate(len - 1);
                last
            }
            _ => Value::Undefined,
        }
    }

    /// Remove and return the first element.
    pub fn shift(&self) -> Value {
        self.remove(0)
    }

    /// Remove the element at `index`, moving later elements down.
    pub fn remove(&self, index: usize) -> Value {
        let Some(len) = self.raw_len().filter(|len| index < *len) else {
            return Value::Undefined;
        };
        let removed = self.proxy.wrap(self.raw_item(index));
        for i in index + 1..len {
            self.set(i - 1, self.raw_item(i));
        }
        self.truncate(len - 1);
        removed
    }

    /// Insert `value` at `index`, moving later elements up. Indices past the
    /// end append.
    pub fn insert(&self, index: usize, value: impl Into<Value>) {
        let Some(len) = self.raw_len() else {
            return;
        };
        let index = index.min(len);
        for i in (index..len).rev() {
            self.set(i + 1, self.raw_item(i));
        }
        self.set(index, value);
    }

    pub fn truncate(&self, len: usize) {
        if self.raw_len().is_some_and(|current| len < current) {
            self.set(PropertyKey::length(), len);
        }
    }

    /// Sort in place; only indices whose value moved are notified.
    pub fn sort_by<F>(&self, mut compare: F)
    where
        F: FnMut(&Value, &Value) -> Ordering,
    {
        let Some(mut items) = self.raw().array_items() else {
            return;
        };
        items.sort_by(|a, b| compare(a, b));
        for (index, item) in items.into_iter().enumerate() {
            self.set(index, item);
        }
    }

    /// Tracked snapshot of the elements.
    pub fn to_vec(&self) -> Vec<Value> {
        (0..self.len()).map(|index| self.get(index)).collect()
    }
}

fn accepts_array_write(key: &PropertyKey, value: &Value) -> bool {
    match key {
        PropertyKey::Index(_) => key.as_array_index().is_some(),
        key if key.is_length() => value.as_index().is_some(),
        _ => false,
    }
}

impl ReactiveContainer for ReactiveObject {
    type Key = PropertyKey;

    fn get(&self, key: PropertyKey) -> Value {
        ReactiveObject::get(self, key)
    }

    fn set(&self, key: PropertyKey, value: Value) {
        ReactiveObject::set(self, key, value)
    }

    fn has(&self, key: PropertyKey) -> bool {
        ReactiveObject::has(self, key)
    }

    fn delete(&self, key: PropertyKey) -> bool {
        ReactiveObject::delete(self, key)
    }
}

impl std::fmt::Debug for ReactiveObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.proxy.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Effect, Runtime};
    use crate::value::CacheGetters;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn wrap(runtime: &Runtime, object: Object) -> ReactiveObject {
        ReactiveObject::try_from(runtime.reactive(object)).expect("record or array")
    }

    fn observe(runtime: &Runtime, f: impl Fn() -> Value + 'static) -> (Effect, Rc<RefCell<Value>>) {
        let seen = Rc::new(RefCell::new(Value::Undefined));
        let effect = runtime.effect({
            let seen = seen.clone();
            move || *seen.borrow_mut() = f()
        });
        (effect, seen)
    }

    #[test]
    fn reads_are_tracked_per_key() {
        let runtime = Runtime::new();
        let state = wrap(&runtime, Object::record().field("a", 1).field("b", 2).build());
        let runs = Rc::new(Cell::new(0));
        let _effect = runtime.effect({
            let (state, runs) = (state.clone(), runs.clone());
            move || {
                state.get("a");
                runs.set(runs.get() + 1);
            }
        });

        state.set("b", 3);
        runtime.flush();
        assert_eq!(runs.get(), 1);

        state.set("a", 5);
        runtime.flush();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn writes_reach_the_target() {
        let runtime = Runtime::new();
        let raw = Object::record().field("a", 1).build();
        let state = wrap(&runtime, raw.clone());

        state.set("a", 2);
        state.set("b", "new");
        assert_eq!(raw.get("a"), Value::from(2));
        assert_eq!(raw.get("b").as_str(), Some("new"));
    }

    #[test]
    fn same_value_write_is_silent() {
        let runtime = Runtime::new();
        let state = wrap(&runtime, Object::record().field("a", 1).build());
        let (effect, _) = observe(&runtime, {
            let state = state.clone();
            move || state.get("a")
        });

        state.set("a", 1);
        assert!(!effect.is_queued());
    }

    #[test]
    fn writing_undefined_creates_the_key() {
        let runtime = Runtime::new();
        let state = wrap(&runtime, Object::record().build());
        state.set("missing", ());
        assert!(state.has("missing"));
    }

    #[test]
    fn absent_keys_read_undefined() {
        let runtime = Runtime::new();
        let state = wrap(&runtime, Object::record().build());
        assert!(state.get("nope").is_undefined());
        assert!(!state.has("nope"));
    }

    #[test]
    fn nested_objects_come_back_wrapped() {
        let runtime = Runtime::new();
        let inner = Object::record().field("first", "Foo").build();
        let state = wrap(&runtime, Object::record().field("names", inner.clone()).build());

        let names = state.get("names");
        assert!(names.is_reactive());
        assert_eq!(names.object_id(), Some(inner.id()));
        // Same wrapper every time
        assert_eq!(state.get("names"), names);
    }

    #[test]
    fn wrapped_values_are_stored_raw() {
        let runtime = Runtime::new();
        let raw = Object::record().build();
        let state = wrap(&runtime, raw.clone());
        let child = runtime.reactive(Object::record().build());

        state.set("child", child.clone());
        assert!(!raw.get("child").is_reactive());
        assert_eq!(state.get("child"), child);

        // Writing the raw counterpart is not a change
        let (effect, _) = observe(&runtime, {
            let state = state.clone();
            move || state.get("child")
        });
        state.set("child", child.to_raw());
        assert!(!effect.is_queued());
    }

    #[test]
    fn uncached_getters_rerun_on_every_read() {
        let runtime = Runtime::new();
        let calls = Rc::new(Cell::new(0));
        let raw = Object::record()
            .field("inner", 42)
            .getter("outer", {
                let calls = calls.clone();
                move |this| {
                    calls.set(calls.get() + 1);
                    this.get("inner")
                }
            })
            .build();
        let state = wrap(&runtime, raw);

        assert_eq!(state.get("outer"), Value::from(42));
        assert_eq!(state.get("outer"), Value::from(42));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn cached_getters_are_memoised_and_reactive() {
        let runtime = Runtime::new();
        let calls = Rc::new(Cell::new(0));
        let raw = Object::record()
            .field("inner", 1)
            .getter("double", {
                let calls = calls.clone();
                move |this| {
                    calls.set(calls.get() + 1);
                    Value::from(this.get("inner").as_number().unwrap_or(0.0) * 2.0)
                }
            })
            .cache_getters(CacheGetters::All)
            .build();
        let state = wrap(&runtime, raw);
        let (_effect, seen) = observe(&runtime, {
            let state = state.clone();
            move || state.get("double")
        });

        assert_eq!(*seen.borrow(), Value::from(2));
        state.get("double");
        assert_eq!(calls.get(), 1);

        state.set("inner", 5);
        runtime.flush();
        assert_eq!(*seen.borrow(), Value::from(10));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn only_named_getters_are_cached() {
        let runtime = Runtime::new();
        let calls = Rc::new(Cell::new(0));
        let counting = |calls: &Rc<Cell<usize>>| {
            let calls = calls.clone();
            move |_: &Value| {
                calls.set(calls.get() + 1);
                Value::Null
            }
        };
        let raw = Object::record()
            .getter("cached", counting(&calls))
            .getter("fresh", counting(&calls))
            .cache_getters(CacheGetters::Only(vec![PropertyKey::from("cached")]))
            .build();
        let state = wrap(&runtime, raw);

        state.get("cached");
        state.get("cached");
        assert_eq!(calls.get(), 1);
        state.get("fresh");
        state.get("fresh");
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn setters_receive_the_wrapper() {
        let runtime = Runtime::new();
        let raw = Object::record()
            .field("inner", 42)
            .setter("outer", |this, value| {
                assert!(this.is_reactive());
                this.set("inner", value);
            })
            .build();
        let state = wrap(&runtime, raw.clone());
        let (_effect, seen) = observe(&runtime, {
            let state = state.clone();
            move || state.get("inner")
        });

        state.set("outer", 7);
        runtime.flush();
        assert_eq!(*seen.borrow(), Value::from(7));
        assert_eq!(raw.get("inner"), Value::from(7));
    }

    #[test]
    fn getter_only_properties_ignore_writes() {
        let runtime = Runtime::new();
        let state = wrap(&runtime, Object::record().getter("fixed", |_| Value::from(1)).build());
        state.set("fixed", 2);
        assert_eq!(state.get("fixed"), Value::from(1));
    }

    #[test]
    fn delete_notifies_readers() {
        let runtime = Runtime::new();
        let state = wrap(&runtime, Object::record().field("a", 1).build());
        let (_effect, seen) = observe(&runtime, {
            let state = state.clone();
            move || state.get("a")
        });

        assert!(state.delete("a"));
        runtime.flush();
        assert!(seen.borrow().is_undefined());
        assert!(!state.has("a"));
        assert!(!state.delete("a"));
    }

    #[test]
    fn readers_of_an_undefined_field_follow_it_through_delete() {
        let runtime = Runtime::new();
        let state = wrap(&runtime, Object::record().field("a", ()).build());
        let (effect, seen) = observe(&runtime, {
            let state = state.clone();
            move || state.get("a")
        });

        // The node already holds undefined; deleting it must still notify
        assert!(state.delete("a"));
        assert!(effect.is_queued());
        runtime.flush();

        state.set("a", 5);
        runtime.flush();
        assert_eq!(*seen.borrow(), Value::from(5));
    }

    #[test]
    fn deleting_a_cached_getter_notifies_readers() {
        let runtime = Runtime::new();
        let raw = Object::record()
            .getter("answer", |_| Value::from(42))
            .cache_getters(CacheGetters::All)
            .build();
        let state = wrap(&runtime, raw);
        let (_effect, seen) = observe(&runtime, {
            let state = state.clone();
            move || state.get("answer")
        });
        assert_eq!(*seen.borrow(), Value::from(42));

        assert!(state.delete("answer"));
        runtime.flush();
        assert!(seen.borrow().is_undefined());

        state.set("answer", 7);
        runtime.flush();
        assert_eq!(*seen.borrow(), Value::from(7));
    }

    #[test]
    fn push_and_index_writes_refresh_length() {
        let runtime = Runtime::new();
        let list = wrap(&runtime, Object::array([1, 2]));
        let len = Rc::new(Cell::new(0));
        let _effect = runtime.effect({
            let (list, len) = (list.clone(), len.clone());
            move || len.set(list.len())
        });
        assert_eq!(len.get(), 2);

        assert_eq!(list.push(3), 3);
        runtime.flush();
        assert_eq!(len.get(), 3);

        list.set(9, 10);
        runtime.flush();
        assert_eq!(len.get(), 10);
    }

    #[test]
    fn shrinking_notifies_dropped_indices() {
        let runtime = Runtime::new();
        let list = wrap(&runtime, Object::array(["a", "b", "c"]));
        let (_effect, seen) = observe(&runtime, {
            let list = list.clone();
            move || list.get(2)
        });
        assert_eq!(seen.borrow().as_str(), Some("c"));

        assert_eq!(list.pop().as_str(), Some("c"));
        runtime.flush();
        assert!(seen.borrow().is_undefined());
        assert_eq!(list.to_vec(), vec![Value::from("a"), Value::from("b")]);
    }

    #[test]
    fn readers_of_popped_indices_see_them_refilled() {
        let runtime = Runtime::new();
        let list = wrap(&runtime, Object::array(["a", "b"]));
        let (_effect, seen) = observe(&runtime, {
            let list = list.clone();
            move || list.get(1)
        });

        list.pop();
        runtime.flush();
        assert!(seen.borrow().is_undefined());

        list.push("c");
        runtime.flush();
        assert_eq!(seen.borrow().as_str(), Some("c"));
    }

    #[test]
    fn pushing_undefined_still_refreshes_length() {
        let runtime = Runtime::new();
        let list = wrap(&runtime, Object::array([1, 2]));
        let len = Rc::new(Cell::new(0));
        let _effect = runtime.effect({
            let (list, len) = (list.clone(), len.clone());
            move || len.set(list.len())
        });
        list.get(1);
        list.pop();
        runtime.flush();
        assert_eq!(len.get(), 1);

        // Index 1 still has a node holding undefined
        list.push(());
        runtime.flush();
        assert_eq!(len.get(), 2);
    }

    #[test]
    fn shift_moves_elements_down() {
        let runtime = Runtime::new();
        let list = wrap(&runtime, Object::array([1, 2, 3]));
        let (_effect, seen) = observe(&runtime, {
            let list = list.clone();
            move || list.get(0)
        });

        assert_eq!(list.shift(), Value::from(1));
        runtime.flush();
        assert_eq!(*seen.borrow(), Value::from(2));
        assert_eq!(list.to_vec(), vec![Value::from(2), Value::from(3)]);
    }

    #[test]
    fn insert_and_remove_keep_order() {
        let runtime = Runtime::new();
        let list = wrap(&runtime, Object::array([1, 3]));
        list.insert(1, 2);
        list.insert(10, 4);
        assert_eq!(
            list.to_vec(),
            vec![Value::from(1), Value::from(2), Value::from(3), Value::from(4)]
        );

        assert_eq!(list.remove(1), Value::from(2));
        assert!(list.remove(10).is_undefined());
        assert_eq!(list.to_vec(), vec![Value::from(1), Value::from(3), Value::from(4)]);
    }

    #[test]
    fn sort_only_notifies_moved_indices() {
        let runtime = Runtime::new();
        let list = wrap(&runtime, Object::array([1, 3, 2]));
        let (first, _) = observe(&runtime, {
            let list = list.clone();
            move || list.get(0)
        });

        list.sort_by(|a, b| {
            let (a, b) = (a.as_number().unwrap_or(0.0), b.as_number().unwrap_or(0.0));
            a.total_cmp(&b)
        });
        assert!(!first.is_queued());
        assert_eq!(list.to_vec(), vec![Value::from(1), Value::from(2), Value::from(3)]);
    }

    #[test]
    fn invalid_array_writes_are_ignored() {
        let runtime = Runtime::new();
        let list = wrap(&runtime, Object::array([1]));
        list.set("label", "x");
        list.set("length", -1);
        assert!(!list.has("label"));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn out_of_range_indices_are_ignored() {
        let runtime = Runtime::new();
        let list = wrap(&runtime, Object::array([1]));
        list.set(usize::MAX, 2);
        list.set(crate::value::MAX_ARRAY_LENGTH, 2);
        list.set("99999999999", 2);
        assert_eq!(list.len(), 1);
        assert_eq!(list.to_vec(), vec![Value::from(1)]);
    }

    #[test]
    fn array_helpers_ignore_records() {
        let runtime = Runtime::new();
        let record = wrap(&runtime, Object::record().build());
        assert_eq!(record.push(1), 0);
        assert!(record.pop().is_undefined());
        assert!(record.is_empty());
    }
}
