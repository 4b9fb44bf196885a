//! Identifiers for nodes in the reactive graph.
//!
//! Every signal, effect and object gets a unique, monotonically increasing ID
//! when created. IDs key the dependency sets and the pending queue, and give
//! the debug output a stable ordering. They are never reused, so an ID that
//! outlives its node can never alias a newer one.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u64);

        impl $name {
            /// Generate a new unique ID.
            pub fn new() -> Self {
                static COUNTER: AtomicU64 = AtomicU64::new(1);
                Self(COUNTER.fetch_add(1, Ordering::Relaxed))
            }

            /// Get the raw ID value.
            pub fn raw(&self) -> u64 {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

define_id!(
    /// Unique identifier for a signal.
    SignalId,
    "s"
);

define_id!(
    /// Unique identifier for an effect.
    ///
    /// Effects are the only subscribers in the graph, so this is also the key
    /// of a signal's dependents set and of the scheduler's pending queue.
    EffectId,
    "e"
);

define_id!(
    /// Unique identifier for a raw object.
    ///
    /// Objects are compared by identity; the ID is what the proxy cache, the
    /// map/set key hashing and the weak collections key on.
    ObjectId,
    "o"
);
