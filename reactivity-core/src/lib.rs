//! Reactivity Core
//!
//! This crate provides the fine-grained reactivity layer of a small
//! templating toolkit. It implements:
//!
//! - Reactive primitives (signals, effects, computeds)
//! - A batched scheduler that runs each affected effect once per turn
//! - Reactive wrappers that derive per-key signals for records, arrays,
//!   maps, sets and their weak variants
//!
//! Directives, expression evaluation and DOM work live elsewhere and only use
//! [`reactive`], [`effect`] and [`computed`] as black boxes.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: signals, effects, computeds and the runtime that owns the
//!   active-effect stack, pending queue and wrapper cache
//! - `value`: the dynamic value model the wrappers operate on
//! - `proxy`: the reactive wrappers and their typed views
//! - `error`: the crate's error type
//!
//! # Turns
//!
//! Writes never run effects synchronously. They queue them, and the queue is
//! drained at the end of the turn: call [`flush`] from synchronous code, or
//! await [`settle`] from async code.
//!
//! # Example
//!
//! ```rust
//! use reactivity_core::{computed, effect, flush, reactive, Object};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let data = reactive(Object::record().field("foo", 1).field("bar", 2).build());
//!
//! let total = computed({
//!     let data = data.clone();
//!     move || {
//!         let foo = data.get("foo").as_number().unwrap_or(0.0);
//!         let bar = data.get("bar").as_number().unwrap_or(0.0);
//!         foo + bar
//!     }
//! });
//!
//! let seen = Rc::new(RefCell::new(0.0));
//! let _effect = effect({
//!     let (total, seen) = (total.clone(), seen.clone());
//!     move || *seen.borrow_mut() = total.get()
//! });
//! assert_eq!(*seen.borrow(), 3.0);
//!
//! data.set("foo", 4);
//! assert_eq!(*seen.borrow(), 3.0); // not until the turn ends
//! flush();
//! assert_eq!(*seen.borrow(), 6.0);
//! ```

pub mod error;
pub mod proxy;
pub mod reactive;
pub mod value;

pub use error::{ReactiveError, Result};
pub use proxy::{MergedScope, Proxy, ReactiveContainer, ReactiveMap, ReactiveObject, ReactiveSet};
pub use reactive::{
    Computed, Effect, EffectId, ObjectId, Runtime, RuntimeConfig, RuntimeGuard, Signal, SignalId,
};
pub use value::{CacheGetters, MapKey, Object, ObjectKind, PropertyKey, Value};

/// Wrap `value` in the current runtime.
///
/// Objects come back as their canonical reactive wrapper; wrapping a wrapper
/// returns it unchanged and primitives pass through.
pub fn reactive(value: impl Into<Value>) -> Value {
    Runtime::current().reactive(value)
}

/// The raw object behind a wrapper, or `value` unchanged.
pub fn to_raw(value: &Value) -> Value {
    proxy::to_raw(value)
}

/// Create an effect in the current runtime and run it once.
pub fn effect<F>(operation: F) -> Effect
where
    F: Fn() + 'static,
{
    Effect::new(operation)
}

/// Create a computed value in the current runtime.
pub fn computed<T, F>(derive: F) -> Computed<T>
where
    T: Clone + PartialEq + 'static,
    F: Fn() -> T + 'static,
{
    Computed::new(derive)
}

/// Run `f` without recording signal reads.
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    Runtime::current().untrack(f)
}

/// End the current turn: run every pending effect.
pub fn flush() {
    Runtime::current().flush();
}

/// Yield to the executor, then end the turn.
pub async fn settle() {
    Runtime::current().settle().await;
}
