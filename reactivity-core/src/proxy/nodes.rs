//! Per-object node tables.
//!
//! A wrapper derives one signal per key it has seen, created on first read
//! or first write. Records and arrays keep a field table whose nodes
//! outlive deleted keys, holding `undefined`. Maps and sets keep an entry
//! table plus an optional size signal; a deleted entry's node holds `None`
//! and is dropped, so readers can tell "absent" apart from a stored
//! `undefined` and re-subscribe to the node created by a later write.
//!
//! Vacating a node always schedules its readers, even when it already held
//! the empty value.

use indexmap::IndexMap;

use crate::reactive::{Computed, Signal};
use crate::value::{MapKey, PropertyKey, Value};

/// Signal behind a record or array key.
#[derive(Clone)]
pub(crate) enum FieldNode {
    /// A data property.
    Signal(Signal<Value>),
    /// A cached getter.
    Getter(Computed<Value>),
}

impl FieldNode {
    pub(crate) fn read(&self) -> Value {
        match self {
            FieldNode::Signal(signal) => signal.get(),
            FieldNode::Getter(computed) => computed.get(),
        }
    }

}

pub(crate) type FieldNodes = IndexMap<PropertyKey, FieldNode>;

#[derive(Default)]
pub(crate) struct EntryNodes {
    pub(crate) entries: IndexMap<MapKey, Signal<Option<Value>>>,
    pub(crate) size: Option<Signal<usize>>,
}
