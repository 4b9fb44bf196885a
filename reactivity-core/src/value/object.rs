//! Raw objects.
//!
//! An [`Object`] is a shared handle to mutable data: cloning the handle
//! aliases the same object, and two handles are equal only if they point to
//! the same object. The operations here are the "native" ones: they never
//! track or notify. The reactive layer calls them after doing its own
//! bookkeeping so raw reads stay consistent with what the signals hold.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::key::{MapKey, PropertyKey, MAX_ARRAY_LENGTH};
use super::Value;
use crate::reactive::ObjectId;

/// Getter of an accessor property; receives the receiver (`this`).
pub type Getter = Rc<dyn Fn(&Value) -> Value>;

/// Setter of an accessor property; receives the receiver and the new value.
pub type Setter = Rc<dyn Fn(&Value, Value)>;

/// A record property.
#[derive(Clone)]
pub enum Property {
    Data(Value),
    Accessor {
        get: Option<Getter>,
        set: Option<Setter>,
    },
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Property::Data(value) => f.debug_tuple("Data").field(value).finish(),
            Property::Accessor { get, set } => f
                .debug_struct("Accessor")
                .field("get", &get.is_some())
                .field("set", &set.is_some())
                .finish(),
        }
    }
}

/// Which getters a reactive wrapper memoises as computeds.
///
/// Uncached getters run on every read. Cached getters run once, then again
/// only when something they read changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CacheGetters {
    #[default]
    None,
    All,
    Only(Vec<PropertyKey>),
}

impl CacheGetters {
    pub fn caches(&self, key: &PropertyKey) -> bool {
        match self {
            CacheGetters::None => false,
            CacheGetters::All => true,
            CacheGetters::Only(keys) => keys.contains(key),
        }
    }
}

/// A string-keyed object with ordered properties.
#[derive(Debug, Clone, Default)]
pub struct Record {
    props: IndexMap<PropertyKey, Property>,
    cache_getters: CacheGetters,
}

/// The closed set of object shapes the reactive layer can wrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Record,
    Array,
    Map,
    Set,
    WeakMap,
    WeakSet,
}

impl ObjectKind {
    pub fn name(self) -> &'static str {
        match self {
            ObjectKind::Record => "record",
            ObjectKind::Array => "array",
            ObjectKind::Map => "map",
            ObjectKind::Set => "set",
            ObjectKind::WeakMap => "weak map",
            ObjectKind::WeakSet => "weak set",
        }
    }

    /// Maps and sets (weak or not) use the collection traps.
    pub fn is_collection(self) -> bool {
        !matches!(self, ObjectKind::Record | ObjectKind::Array)
    }

    pub fn is_weak(self) -> bool {
        matches!(self, ObjectKind::WeakMap | ObjectKind::WeakSet)
    }

    pub fn is_map(self) -> bool {
        matches!(self, ObjectKind::Map | ObjectKind::WeakMap)
    }

    pub fn is_set(self) -> bool {
        matches!(self, ObjectKind::Set | ObjectKind::WeakSet)
    }
}

enum ObjectData {
    Record(Record),
    Array(Vec<Value>),
    Map(IndexMap<MapKey, (Value, Value)>),
    Set(IndexMap<MapKey, Value>),
    WeakMap(IndexMap<MapKey, (WeakObject, Value)>),
    WeakSet(IndexMap<MapKey, WeakObject>),
}

impl ObjectData {
    fn kind(&self) -> ObjectKind {
        match self {
            ObjectData::Record(_) => ObjectKind::Record,
            ObjectData::Array(_) => ObjectKind::Array,
            ObjectData::Map(_) => ObjectKind::Map,
            ObjectData::Set(_) => ObjectKind::Set,
            ObjectData::WeakMap(_) => ObjectKind::WeakMap,
            ObjectData::WeakSet(_) => ObjectKind::WeakSet,
        }
    }
}

struct ObjectCell {
    id: ObjectId,
    data: RefCell<ObjectData>,
}

/// Shared handle to a raw object.
#[derive(Clone)]
pub struct Object {
    cell: Rc<ObjectCell>,
}

/// Non-owning handle to a raw object.
#[derive(Clone)]
pub struct WeakObject {
    id: ObjectId,
    cell: Weak<ObjectCell>,
}

impl WeakObject {
    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn upgrade(&self) -> Option<Object> {
        self.cell.upgrade().map(|cell| Object { cell })
    }

    fn is_alive(&self) -> bool {
        self.cell.strong_count() > 0
    }
}

impl fmt::Debug for WeakObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WeakObject({})", self.id)
    }
}

/// Result of looking a property up on the raw object.
pub(crate) enum Slot {
    Absent,
    Data(Value),
    Accessor {
        get: Option<Getter>,
        set: Option<Setter>,
    },
}

impl Object {
    fn from_data(data: ObjectData) -> Self {
        Self {
            cell: Rc::new(ObjectCell {
                id: ObjectId::new(),
                data: RefCell::new(data),
            }),
        }
    }

    /// Start building a record.
    pub fn record() -> RecordBuilder {
        RecordBuilder::default()
    }

    pub fn array<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let items = items.into_iter().map(|item| item.into().to_raw()).collect();
        Self::from_data(ObjectData::Array(items))
    }

    pub fn map() -> Self {
        Self::from_data(ObjectData::Map(IndexMap::new()))
    }

    pub fn map_from<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Value>,
        V: Into<Value>,
    {
        let map = Self::map();
        for (key, value) in entries {
            map.collection_insert(key.into(), value.into());
        }
        map
    }

    pub fn new_set() -> Self {
        Self::from_data(ObjectData::Set(IndexMap::new()))
    }

    pub fn set_from<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let set = Self::new_set();
        for value in values {
            set.collection_insert(value.into(), Value::Undefined);
        }
        set
    }

    pub fn weak_map() -> Self {
        Self::from_data(ObjectData::WeakMap(IndexMap::new()))
    }

    pub fn weak_set() -> Self {
        Self::from_data(ObjectData::WeakSet(IndexMap::new()))
    }

    pub fn id(&self) -> ObjectId {
        self.cell.id
    }

    pub fn kind(&self) -> ObjectKind {
        self.cell.data.borrow().kind()
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }

    /// Whether anything besides this handle holds the object.
    pub(crate) fn is_shared(&self) -> bool {
        Rc::strong_count(&self.cell) > 1
    }

    pub fn downgrade(&self) -> WeakObject {
        WeakObject {
            id: self.cell.id,
            cell: Rc::downgrade(&self.cell),
        }
    }

    fn this(&self) -> Value {
        Value::Object(self.clone())
    }

    // ------------------------------------------------------------------
    // Properties (records and arrays)
    // ------------------------------------------------------------------

    pub(crate) fn slot(&self, key: &PropertyKey) -> Slot {
        match &*self.cell.data.borrow() {
            ObjectData::Record(record) => match record.props.get(key) {
                Some(Property::Data(value)) => Slot::Data(value.clone()),
                Some(Property::Accessor { get, set }) => Slot::Accessor {
                    get: get.clone(),
                    set: set.clone(),
                },
                None => Slot::Absent,
            },
            ObjectData::Array(items) => match key {
                PropertyKey::Index(index) => items
                    .get(*index)
                    .map_or(Slot::Absent, |value| Slot::Data(value.clone())),
                key if key.is_length() => Slot::Data(Value::from(items.len())),
                _ => Slot::Absent,
            },
            _ => Slot::Absent,
        }
    }

    /// Read a property. Getters run with this object as the receiver.
    pub fn get(&self, key: impl Into<PropertyKey>) -> Value {
        match self.slot(&key.into()) {
            Slot::Data(value) => value,
            Slot::Accessor { get: Some(get), .. } => get(&self.this()),
            Slot::Accessor { get: None, .. } | Slot::Absent => Value::Undefined,
        }
    }

    /// Write a property. Setters run with this object as the receiver;
    /// writes to getter-only properties are ignored.
    pub fn set(&self, key: impl Into<PropertyKey>, value: impl Into<Value>) {
        let key = key.into();
        match self.slot(&key) {
            Slot::Accessor { set: Some(set), .. } => set(&self.this(), value.into()),
            Slot::Accessor { set: None, .. } => {}
            Slot::Data(_) | Slot::Absent => self.write_data(key, value.into().to_raw()),
        }
    }

    /// Store a data value, bypassing accessors.
    ///
    /// On arrays, writing past the end pads with `undefined` and writing
    /// `length` resizes; a `length` that is not a whole number is ignored,
    /// as are indices at or beyond [`MAX_ARRAY_LENGTH`].
    ///
    /// [`MAX_ARRAY_LENGTH`]: super::MAX_ARRAY_LENGTH
    pub(crate) fn write_data(&self, key: PropertyKey, value: Value) {
        match &mut *self.cell.data.borrow_mut() {
            ObjectData::Record(record) => {
                record.props.insert(key, Property::Data(value));
            }
            ObjectData::Array(items) => match key {
                PropertyKey::Index(index) if index >= MAX_ARRAY_LENGTH => {}
                PropertyKey::Index(index) => {
                    if index >= items.len() {
                        items.resize(index + 1, Value::Undefined);
                    }
                    items[index] = value;
                }
                key if key.is_length() => {
                    if let Some(len) = value.as_index() {
                        items.resize(len, Value::Undefined);
                    }
                }
                _ => {}
            },
            _ => {}
        }
    }

    pub fn has(&self, key: impl Into<PropertyKey>) -> bool {
        !matches!(self.slot(&key.into()), Slot::Absent)
    }

    /// Delete a property. Deleting an array element leaves a hole.
    pub fn remove(&self, key: impl Into<PropertyKey>) -> bool {
        let key = key.into();
        match &mut *self.cell.data.borrow_mut() {
            ObjectData::Record(record) => record.props.shift_remove(&key).is_some(),
            ObjectData::Array(items) => match key {
                PropertyKey::Index(index) if index < items.len() => {
                    items[index] = Value::Undefined;
                    true
                }
                _ => false,
            },
            _ => false,
        }
    }

    /// Own enumerable keys: record properties in insertion order, or
    /// array indices.
    pub fn keys(&self) -> Vec<PropertyKey> {
        match &*self.cell.data.borrow() {
            ObjectData::Record(record) => record.props.keys().cloned().collect(),
            ObjectData::Array(items) => (0..items.len()).map(PropertyKey::Index).collect(),
            _ => Vec::new(),
        }
    }

    pub fn caches_getter(&self, key: &PropertyKey) -> bool {
        match &*self.cell.data.borrow() {
            ObjectData::Record(record) => record.cache_getters.caches(key),
            _ => false,
        }
    }

    pub fn array_len(&self) -> Option<usize> {
        match &*self.cell.data.borrow() {
            ObjectData::Array(items) => Some(items.len()),
            _ => None,
        }
    }

    /// Copy of the array elements, or `None` for other kinds.
    pub fn array_items(&self) -> Option<Vec<Value>> {
        match &*self.cell.data.borrow() {
            ObjectData::Array(items) => Some(items.clone()),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Collections (maps and sets)
    // ------------------------------------------------------------------

    /// Value stored under `key`; for sets, the member itself.
    pub fn collection_get(&self, key: &Value) -> Option<Value> {
        let key = MapKey::of(key);
        match &*self.cell.data.borrow() {
            ObjectData::Map(entries) => entries.get(&key).map(|(_, value)| value.clone()),
            ObjectData::Set(members) => members.get(&key).cloned(),
            ObjectData::WeakMap(entries) => entries
                .get(&key)
                .filter(|(owner, _)| owner.is_alive())
                .map(|(_, value)| value.clone()),
            ObjectData::WeakSet(members) => members
                .get(&key)
                .and_then(WeakObject::upgrade)
                .map(Value::Object),
            _ => None,
        }
    }

    pub fn collection_has(&self, key: &Value) -> bool {
        self.collection_get(key).is_some()
    }

    /// Insert an entry (sets ignore `value`).
    ///
    /// Existing keys keep their position. Weak collections only accept
    /// objects; other keys are ignored and `false` is returned.
    pub fn collection_insert(&self, key: Value, value: Value) -> bool {
        let key = key.to_raw();
        let value = value.to_raw();
        let map_key = MapKey::of(&key);
        match &mut *self.cell.data.borrow_mut() {
            ObjectData::Map(entries) => {
                entries.insert(map_key, (key, value));
                true
            }
            ObjectData::Set(members) => {
                members.entry(map_key).or_insert(key);
                true
            }
            ObjectData::WeakMap(entries) => match key {
                Value::Object(object) => {
                    entries.retain(|_, (owner, _)| owner.is_alive());
                    entries.insert(map_key, (object.downgrade(), value));
                    true
                }
                _ => false,
            },
            ObjectData::WeakSet(members) => match key {
                Value::Object(object) => {
                    members.retain(|_, member| member.is_alive());
                    members.entry(map_key).or_insert_with(|| object.downgrade());
                    true
                }
                _ => false,
            },
            _ => false,
        }
    }

    pub fn collection_remove(&self, key: &Value) -> bool {
        let key = MapKey::of(key);
        match &mut *self.cell.data.borrow_mut() {
            ObjectData::Map(entries) => entries.shift_remove(&key).is_some(),
            ObjectData::Set(members) => members.shift_remove(&key).is_some(),
            ObjectData::WeakMap(entries) => entries
                .shift_remove(&key)
                .is_some_and(|(owner, _)| owner.is_alive()),
            ObjectData::WeakSet(members) => members
                .shift_remove(&key)
                .is_some_and(|member| member.is_alive()),
            _ => false,
        }
    }

    pub fn collection_clear(&self) {
        match &mut *self.cell.data.borrow_mut() {
            ObjectData::Map(entries) => entries.clear(),
            ObjectData::Set(members) => members.clear(),
            ObjectData::WeakMap(entries) => entries.clear(),
            ObjectData::WeakSet(members) => members.clear(),
            _ => {}
        }
    }

    /// Number of live entries.
    pub fn collection_len(&self) -> usize {
        match &*self.cell.data.borrow() {
            ObjectData::Map(entries) => entries.len(),
            ObjectData::Set(members) => members.len(),
            ObjectData::WeakMap(entries) => entries
                .values()
                .filter(|(owner, _)| owner.is_alive())
                .count(),
            ObjectData::WeakSet(members) => members.values().filter(|m| m.is_alive()).count(),
            _ => 0,
        }
    }

    /// Live entries in insertion order; sets yield `(member, member)`.
    pub fn collection_entries(&self) -> Vec<(Value, Value)> {
        match &*self.cell.data.borrow() {
            ObjectData::Map(entries) => entries.values().cloned().collect(),
            ObjectData::Set(members) => members
                .values()
                .map(|member| (member.clone(), member.clone()))
                .collect(),
            ObjectData::WeakMap(entries) => entries
                .values()
                .filter_map(|(owner, value)| {
                    owner
                        .upgrade()
                        .map(|owner| (Value::Object(owner), value.clone()))
                })
                .collect(),
            ObjectData::WeakSet(members) => members
                .values()
                .filter_map(WeakObject::upgrade)
                .map(|member| (Value::Object(member.clone()), Value::Object(member)))
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Identity only: objects may contain themselves.
        write!(f, "Object({} {})", self.kind().name(), self.id())
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Object {}

/// Builder for records with data and accessor properties.
///
/// ```rust
/// use reactivity_core::{CacheGetters, Object, Value};
///
/// let person = Object::record()
///     .field("first", "Ada")
///     .field("last", "Lovelace")
///     .getter("full", |this| {
///         let first = this.get("first");
///         let last = this.get("last");
///         Value::from(format!("{} {}", first.as_str().unwrap_or(""), last.as_str().unwrap_or("")))
///     })
///     .cache_getters(CacheGetters::All)
///     .build();
///
/// assert_eq!(person.get("full").as_str(), Some("Ada Lovelace"));
/// ```
#[derive(Default)]
pub struct RecordBuilder {
    record: Record,
}

impl RecordBuilder {
    pub fn field(mut self, key: impl Into<PropertyKey>, value: impl Into<Value>) -> Self {
        self.record
            .props
            .insert(key.into(), Property::Data(value.into().to_raw()));
        self
    }

    /// Declare a getter, keeping a setter already declared for `key`.
    pub fn getter<F>(mut self, key: impl Into<PropertyKey>, getter: F) -> Self
    where
        F: Fn(&Value) -> Value + 'static,
    {
        let getter: Getter = Rc::new(getter);
        if let Property::Accessor { get, .. } = self.accessor(key.into()) {
            *get = Some(getter);
        }
        self
    }

    /// Declare a setter, keeping a getter already declared for `key`.
    pub fn setter<F>(mut self, key: impl Into<PropertyKey>, setter: F) -> Self
    where
        F: Fn(&Value, Value) + 'static,
    {
        let setter: Setter = Rc::new(setter);
        if let Property::Accessor { set, .. } = self.accessor(key.into()) {
            *set = Some(setter);
        }
        self
    }

    pub fn cache_getters(mut self, policy: CacheGetters) -> Self {
        self.record.cache_getters = policy;
        self
    }

    pub fn build(self) -> Object {
        Object::from_data(ObjectData::Record(self.record))
    }

    fn accessor(&mut self, key: PropertyKey) -> &mut Property {
        let slot = self.record.props.entry(key).or_insert(Property::Accessor {
            get: None,
            set: None,
        });
        if matches!(slot, Property::Data(_)) {
            *slot = Property::Accessor {
                get: None,
                set: None,
            };
        }
        slot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_keep_insertion_order() {
        let record = Object::record().field("b", 1).field("a", 2).build();
        assert_eq!(record.keys(), vec![PropertyKey::from("b"), PropertyKey::from("a")]);
        assert_eq!(record.kind(), ObjectKind::Record);
    }

    #[test]
    fn handles_alias_the_same_object() {
        let record = Object::record().field("x", 1).build();
        let alias = record.clone();
        alias.set("x", 2);
        assert_eq!(record.get("x"), Value::from(2));
        assert_eq!(record, alias);
        assert_ne!(record, Object::record().field("x", 2).build());
    }

    #[test]
    fn accessors_receive_the_receiver() {
        let record = Object::record()
            .field("inner", 42)
            .getter("outer", |this| this.get("inner"))
            .setter("outer", |this, value| this.set("inner", value))
            .build();

        assert_eq!(record.get("outer"), Value::from(42));
        record.set("outer", 7);
        assert_eq!(record.get("inner"), Value::from(7));
    }

    #[test]
    fn getter_only_properties_ignore_writes() {
        let record = Object::record().getter("answer", |_| Value::from(42)).build();
        record.set("answer", 1);
        assert_eq!(record.get("answer"), Value::from(42));
    }

    #[test]
    fn arrays_resize_through_length_and_indices() {
        let array = Object::array([1, 2, 3]);
        assert_eq!(array.get("length"), Value::from(3));

        array.set(5, 6);
        assert_eq!(array.array_len(), Some(6));
        assert!(array.get(4).is_undefined());

        array.set("length", 2);
        assert_eq!(array.array_items(), Some(vec![Value::from(1), Value::from(2)]));

        // Not a valid length
        array.set("length", 1.5);
        assert_eq!(array.array_len(), Some(2));
    }

    #[test]
    fn arrays_ignore_indices_past_the_maximum_length() {
        let list = Object::array([1]);
        list.set(usize::MAX, 2);
        list.set(MAX_ARRAY_LENGTH, 2);
        assert_eq!(list.array_len(), Some(1));
        assert_eq!(PropertyKey::from(MAX_ARRAY_LENGTH - 1).as_array_index(), Some(MAX_ARRAY_LENGTH - 1));
        assert_eq!(PropertyKey::from(MAX_ARRAY_LENGTH).as_array_index(), None);
    }

    #[test]
    fn maps_keep_positions_on_overwrite() {
        let map = Object::map_from([("a", 1), ("b", 2)]);
        map.collection_insert(Value::from("a"), Value::from(3));

        let entries = map.collection_entries();
        assert_eq!(entries[0], (Value::from("a"), Value::from(3)));
        assert_eq!(entries[1], (Value::from("b"), Value::from(2)));
        assert_eq!(map.collection_len(), 2);
    }

    #[test]
    fn sets_deduplicate_members() {
        let set = Object::set_from([1, 2, 2, 3]);
        assert_eq!(set.collection_len(), 3);
        assert!(set.collection_has(&Value::from(2)));
        assert!(set.collection_remove(&Value::from(2)));
        assert!(!set.collection_has(&Value::from(2)));
    }

    #[test]
    fn weak_collections_reject_primitives_and_drop_dead_keys() {
        let weak = Object::weak_map();
        assert!(!weak.collection_insert(Value::from("key"), Value::from(1)));

        let key = Object::record().build();
        assert!(weak.collection_insert(Value::from(key.clone()), Value::from(1)));
        assert_eq!(weak.collection_get(&Value::from(key.clone())), Some(Value::from(1)));
        assert_eq!(weak.collection_len(), 1);

        drop(key);
        assert_eq!(weak.collection_len(), 0);
        assert!(weak.collection_entries().is_empty());
    }

    #[test]
    fn weak_sets_do_not_keep_members_alive() {
        let weak = Object::weak_set();
        let member = Object::record().build();
        let handle = member.downgrade();

        weak.collection_insert(Value::from(member.clone()), Value::Undefined);
        assert!(weak.collection_has(&Value::from(member.clone())));

        drop(member);
        assert!(handle.upgrade().is_none());
        assert_eq!(weak.collection_len(), 0);
    }
}
