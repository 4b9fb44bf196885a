//! Reactive Wrappers
//!
//! [`reactive`](crate::reactive()) turns a raw object into a [`Proxy`]: a
//! wrapper that derives a signal for every key it is asked about, so effects
//! reading through it subscribe per key, and writes through it notify exactly
//! the readers of the keys that changed.
//!
//! # Wrapping
//!
//! 1. The value is unwrapped first, so wrapping a wrapper is idempotent.
//! 2. Primitives pass through unchanged.
//! 3. Each runtime caches one wrapper per raw object; wrapping the same
//!    object again returns the identical wrapper.
//! 4. The trap set is chosen once, from the object's kind: object traps for
//!    records and arrays, collection traps for maps, sets and their weak
//!    variants.
//!
//! # Views
//!
//! A `Proxy` is untyped. The typed views [`ReactiveObject`], [`ReactiveMap`]
//! and [`ReactiveSet`] carry the operations of each trap set, and the
//! [`ReactiveContainer`] trait covers what they have in common.
//!
//! Values stored through a wrapper are stored raw in the target; values read
//! through a wrapper come back wrapped, which is what makes nested objects
//! reactive.

mod collection;
mod nodes;
mod object;
mod scope;

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::debug;

pub use collection::{ReactiveMap, ReactiveSet};
pub use object::ReactiveObject;
pub use scope::MergedScope;

use nodes::{EntryNodes, FieldNodes};

use crate::error::{ReactiveError, Result};
use crate::reactive::{ObjectId, Runtime, RuntimeInner, Signal};
use crate::value::{Object, ObjectKind, Value};

/// Operations shared by every reactive container.
///
/// Reads through `get` are tracked; `has` follows the tracking rules of the
/// container (untracked for objects, tracked for maps).
pub trait ReactiveContainer {
    type Key;

    fn get(&self, key: Self::Key) -> Value;

    fn set(&self, key: Self::Key, value: Value);

    fn has(&self, key: Self::Key) -> bool;

    /// Remove `key`, returning whether it was present.
    fn delete(&self, key: Self::Key) -> bool;
}

enum Traps {
    Object(RefCell<FieldNodes>),
    Collection(RefCell<EntryNodes>),
}

struct ProxyInner {
    target: Object,
    kind: ObjectKind,
    traps: Traps,
    runtime: Weak<RuntimeInner>,
}

/// Reactive wrapper around a raw object.
///
/// Cloning the handle shares the wrapper.
#[derive(Clone)]
pub struct Proxy {
    inner: Rc<ProxyInner>,
}

impl Proxy {
    fn new(runtime: &Runtime, target: Object) -> Self {
        let kind = target.kind();
        let traps = if kind.is_collection() {
            Traps::Collection(RefCell::new(EntryNodes::default()))
        } else {
            Traps::Object(RefCell::new(FieldNodes::default()))
        };
        Self {
            inner: Rc::new(ProxyInner {
                target,
                kind,
                traps,
                runtime: runtime.downgrade(),
            }),
        }
    }

    /// The raw object behind the wrapper.
    pub fn raw(&self) -> &Object {
        &self.inner.target
    }

    /// Id of the raw object.
    pub fn id(&self) -> ObjectId {
        self.inner.target.id()
    }

    pub fn kind(&self) -> ObjectKind {
        self.inner.kind
    }

    pub fn ptr_eq(&self, other: &Proxy) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Whether the wrapper or its raw object is held besides this handle.
    fn is_shared(&self) -> bool {
        Rc::strong_count(&self.inner) > 1 || self.inner.target.is_shared()
    }

    /// The runtime this wrapper belongs to, if it is still alive.
    pub fn runtime(&self) -> Option<Runtime> {
        self.inner.runtime.upgrade().map(Runtime::from_inner)
    }

    /// View over a wrapped record or array.
    pub fn as_object(&self) -> Option<ReactiveObject> {
        matches!(self.kind(), ObjectKind::Record | ObjectKind::Array)
            .then(|| ReactiveObject::from_proxy(self.clone()))
    }

    /// View over a wrapped map or weak map.
    pub fn as_map(&self) -> Option<ReactiveMap> {
        self.kind()
            .is_map()
            .then(|| ReactiveMap::from_proxy(self.clone()))
    }

    /// View over a wrapped set or weak set.
    pub fn as_set(&self) -> Option<ReactiveSet> {
        self.kind()
            .is_set()
            .then(|| ReactiveSet::from_proxy(self.clone()))
    }

    fn downgrade(&self) -> Weak<ProxyInner> {
        Rc::downgrade(&self.inner)
    }

    fn upgrade(weak: &Weak<ProxyInner>) -> Option<Proxy> {
        weak.upgrade().map(|inner| Proxy { inner })
    }

    /// Wrap a raw value read from the target, in this wrapper's runtime.
    fn wrap(&self, raw: Value) -> Value {
        match self.runtime() {
            Some(runtime) => wrap_in(&runtime, raw),
            None => raw,
        }
    }

    /// New node signal in this wrapper's runtime.
    fn signal<T: 'static>(&self, value: T) -> Signal<T> {
        Signal::with_runtime(self.inner.runtime.clone(), value)
    }

    fn fields(&self) -> &RefCell<FieldNodes> {
        match &self.inner.traps {
            Traps::Object(fields) => fields,
            Traps::Collection(_) => unreachable!("object view over {} wrapper", self.kind().name()),
        }
    }

    fn entries(&self) -> &RefCell<EntryNodes> {
        match &self.inner.traps {
            Traps::Collection(entries) => entries,
            Traps::Object(_) => unreachable!("collection view over {} wrapper", self.kind().name()),
        }
    }

    /// Typed-view conversion shared by the `TryFrom` impls.
    fn view(value: &Value, expected: &'static str, accepts: fn(ObjectKind) -> bool) -> Result<Proxy> {
        let proxy = match value {
            Value::Reactive(proxy) => proxy.clone(),
            Value::Object(object) => proxy_in(&Runtime::current(), object.clone()),
            other => {
                return Err(ReactiveError::NotAnObject {
                    found: other.type_name(),
                })
            }
        };
        if accepts(proxy.kind()) {
            Ok(proxy)
        } else {
            Err(ReactiveError::KindMismatch {
                expected,
                found: proxy.kind().name(),
            })
        }
    }
}

impl PartialEq for Proxy {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Proxy {}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Reactive({} {})", self.kind().name(), self.id())
    }
}

/// Cache size at which unreachable wrappers are first pruned.
const PRUNE_THRESHOLD: usize = 64;

/// Map from raw objects to their canonical wrapper, owned by a runtime.
///
/// An entry stays while the wrapper or its raw object is held anywhere
/// besides the cache. Once neither is, nobody can observe the wrapper's
/// identity any more and the entry is pruned: when the cache has doubled
/// since the last prune, or on [`Runtime::prune_proxies`].
pub(crate) struct ProxyCache {
    entries: HashMap<ObjectId, Proxy>,
    prune_at: usize,
}

impl ProxyCache {
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
            prune_at: PRUNE_THRESHOLD,
        }
    }

    pub(crate) fn get(&self, object_id: ObjectId) -> Option<Proxy> {
        self.entries.get(&object_id).cloned()
    }

    /// Cache `proxy`. Returns the wrappers pruned on the way, to be dropped
    /// once the cache is no longer borrowed.
    #[must_use]
    pub(crate) fn insert(&mut self, object_id: ObjectId, proxy: Proxy) -> Vec<Proxy> {
        let pruned = if self.entries.len() >= self.prune_at {
            self.prune()
        } else {
            Vec::new()
        };
        self.entries.insert(object_id, proxy);
        pruned
    }

    /// Remove every entry nothing else can reach.
    #[must_use]
    pub(crate) fn prune(&mut self) -> Vec<Proxy> {
        let unreachable: Vec<ObjectId> = self
            .entries
            .iter()
            .filter(|(_, proxy)| !proxy.is_shared())
            .map(|(id, _)| *id)
            .collect();
        let pruned: Vec<Proxy> = unreachable
            .iter()
            .filter_map(|id| self.entries.remove(id))
            .collect();
        self.prune_at = PRUNE_THRESHOLD.max(self.entries.len() * 2);
        if !pruned.is_empty() {
            debug!(pruned = pruned.len(), remaining = self.entries.len(), "pruned proxy cache");
        }
        pruned
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// The canonical wrapper of `object` in `runtime`, creating it if needed.
pub(crate) fn proxy_in(runtime: &Runtime, object: Object) -> Proxy {
    if let Some(proxy) = runtime.proxy_of(object.id()) {
        return proxy;
    }
    let id = object.id();
    let proxy = Proxy::new(runtime, object);
    debug!(object = %id, kind = proxy.kind().name(), "wrapping object");
    runtime.cache_proxy(id, proxy.clone());
    proxy
}

/// Wrap `value` in `runtime`: objects get their canonical wrapper, anything
/// else passes through.
pub(crate) fn wrap_in(runtime: &Runtime, value: Value) -> Value {
    match value.to_raw() {
        Value::Object(object) => Value::Reactive(proxy_in(runtime, object)),
        _ => value,
    }
}

/// The raw object behind a wrapper, or `value` unchanged.
pub fn to_raw(value: &Value) -> Value {
    value.to_raw()
}

macro_rules! impl_view {
    ($view:ty, $expected:literal, $accepts:expr) => {
        impl TryFrom<&Value> for $view {
            type Error = ReactiveError;

            fn try_from(value: &Value) -> Result<Self> {
                Proxy::view(value, $expected, $accepts).map(<$view>::from_proxy)
            }
        }

        impl TryFrom<Value> for $view {
            type Error = ReactiveError;

            fn try_from(value: Value) -> Result<Self> {
                <$view>::try_from(&value)
            }
        }

        impl From<$view> for Value {
            fn from(view: $view) -> Self {
                Value::Reactive(view.into_proxy())
            }
        }

        impl From<&$view> for Value {
            fn from(view: &$view) -> Self {
                Value::Reactive(view.proxy().clone())
            }
        }
    };
}

impl_view!(ReactiveObject, "record or array", |kind| matches!(
    kind,
    ObjectKind::Record | ObjectKind::Array
));
impl_view!(ReactiveMap, "map", ObjectKind::is_map);
impl_view!(ReactiveSet, "set", ObjectKind::is_set);
