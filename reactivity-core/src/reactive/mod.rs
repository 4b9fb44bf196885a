//! Reactive Primitives
//!
//! This module implements the signal/effect graph: signals, effects,
//! computeds, and the runtime that schedules them.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal is read while an
//! effect is running, the effect becomes a dependent. When the signal is set
//! to a different value, its dependents are queued for a re-run.
//!
//! ## Effects
//!
//! An Effect is a computation that runs once on creation and again whenever a
//! signal it read changes. Re-runs are batched: any number of writes in one
//! turn produce a single re-run that sees the final values.
//!
//! ## Computeds
//!
//! A Computed is a signal kept up to date by an internal effect. It is the
//! derived-value primitive, and what cached getters on reactive objects are
//! built from.
//!
//! # Implementation Notes
//!
//! Dependency tracking is automatic: each runtime keeps a stack of running
//! effects, and a signal read links to whatever is on top. The same approach
//! is used by SolidJS, Vue 3 and Leptos.

mod computed;
mod context;
mod effect;
mod id;
mod runtime;
mod scheduler;
mod signal;

pub use computed::Computed;
pub use effect::Effect;
pub use id::{EffectId, ObjectId, SignalId};
pub use runtime::{Runtime, RuntimeConfig, RuntimeGuard};
pub(crate) use runtime::RuntimeInner;
pub use signal::Signal;
