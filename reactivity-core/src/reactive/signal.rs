//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which effects depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read while an effect is running, the signal and the
//!    effect link to each other: the effect joins the signal's dependents and
//!    the signal joins the effect's dependencies.
//!
//! 2. When a signal is set to a value different from the current one, every
//!    dependent is asked to re-run. Setting an equal value does nothing.
//!
//! 3. Re-runs are not immediate. They go through the runtime's scheduler and
//!    happen on the next flush.
//!
//! # Ownership
//!
//! A signal owns its value and holds its dependents strongly; effects only
//! hold their dependencies weakly. An effect therefore stays alive as long as
//! any signal it read is alive, and a dropped signal never keeps an effect's
//! bookkeeping from being released.

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::trace;

use super::effect::Effect;
use super::id::{EffectId, SignalId};
use super::runtime::{Runtime, RuntimeInner};

/// Type-erased view of a signal, as seen from an effect's dependency set.
pub(crate) trait Source {
    fn source_id(&self) -> SignalId;

    /// Remove `effect_id` from this signal's dependents.
    fn release(&self, effect_id: EffectId);
}

pub(crate) struct SignalInner<T> {
    id: SignalId,
    value: RefCell<T>,
    dependents: RefCell<IndexMap<EffectId, Effect>>,
    runtime: Weak<RuntimeInner>,
}

impl<T> Source for SignalInner<T> {
    fn source_id(&self) -> SignalId {
        self.id
    }

    fn release(&self, effect_id: EffectId) {
        if self.dependents.borrow_mut().shift_remove(&effect_id).is_some() {
            trace!(signal = %self.id, effect = %effect_id, "released effect from signal");
        }
    }
}

/// A reactive signal holding a value of type T.
///
/// Cloning a signal yields another handle to the same cell.
///
/// # Example
///
/// ```rust
/// use reactivity_core::{Runtime, Signal, Effect};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let runtime = Runtime::new();
/// let _guard = runtime.enter();
///
/// let count = Signal::new(1);
/// let seen = Rc::new(Cell::new(0));
///
/// let _effect = Effect::new({
///     let (count, seen) = (count.clone(), seen.clone());
///     move || seen.set(count.get())
/// });
/// assert_eq!(seen.get(), 1);
///
/// count.set(2);
/// assert_eq!(seen.get(), 1); // re-runs are batched
/// runtime.flush();
/// assert_eq!(seen.get(), 2);
/// ```
pub struct Signal<T: 'static> {
    inner: Rc<SignalInner<T>>,
}

impl<T: 'static> Signal<T> {
    /// Create a new signal in the current runtime.
    pub fn new(value: T) -> Self {
        Self::new_in(&Runtime::current(), value)
    }

    /// Create a new signal in `runtime`.
    pub fn new_in(runtime: &Runtime, value: T) -> Self {
        Self::with_runtime(runtime.downgrade(), value)
    }

    /// Create a signal tied to a runtime that may already be gone.
    pub(crate) fn with_runtime(runtime: Weak<RuntimeInner>, value: T) -> Self {
        let id = SignalId::new();
        trace!(signal = %id, "creating signal");
        Self {
            inner: Rc::new(SignalInner {
                id,
                value: RefCell::new(value),
                dependents: RefCell::new(IndexMap::new()),
                runtime,
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> SignalId {
        self.inner.id
    }

    /// Borrow the current value, tracking the read.
    ///
    /// `f` must not write to this same signal.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        f(&self.inner.value.borrow())
    }

    /// Remove `effect_id` from this signal's dependents.
    ///
    /// Effects call this when they drop their dependencies. Releasing an
    /// effect that is not a dependent is a no-op.
    pub fn release(&self, effect_id: EffectId) {
        Source::release(&*self.inner, effect_id);
    }

    /// Get the number of dependent effects.
    pub fn dependent_count(&self) -> usize {
        self.inner.dependents.borrow().len()
    }

    /// Whether `effect_id` is currently a dependent.
    pub fn has_dependent(&self, effect_id: EffectId) -> bool {
        self.inner.dependents.borrow().contains_key(&effect_id)
    }

    /// Link this signal to the running effect, if any.
    fn track(&self) {
        let Some(runtime) = self.inner.runtime.upgrade() else {
            return;
        };
        if runtime.context.is_untracked() {
            return;
        }
        let Some(effect) = runtime.context.current() else {
            return;
        };

        trace!(signal = %self.inner.id, effect = %effect.id(), "registering dependency");
        let weak: Weak<SignalInner<T>> = Rc::downgrade(&self.inner);
        let source: Weak<dyn Source> = weak;
        effect.register(self.inner.id, source);
        self.inner
            .dependents
            .borrow_mut()
            .insert(effect.id(), effect);
    }

    /// Store `value` and schedule every dependent, even when it equals the
    /// current value.
    ///
    /// Node tables use this when they drop a node: its readers have to
    /// re-run so they subscribe to whatever node replaces it.
    pub(crate) fn replace(&self, value: T) {
        *self.inner.value.borrow_mut() = value;
        trace!(signal = %self.inner.id, "replacing signal");
        self.notify();
    }

    /// Ask every dependent to re-run.
    pub(crate) fn notify(&self) {
        // Snapshot first: `rerun` releases the effect from this very set.
        let dependents: SmallVec<[Effect; 4]> =
            self.inner.dependents.borrow().values().cloned().collect();

        for effect in dependents {
            effect.rerun();
        }
    }
}

impl<T> Signal<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Get the current value.
    ///
    /// If called while an effect is running (and not inside `untrack`), the
    /// effect becomes a dependent of this signal.
    pub fn get(&self) -> T {
        self.track();
        self.inner.value.borrow().clone()
    }

    /// Get the current value without tracking the read.
    pub fn peek(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Set a new value and schedule dependents.
    ///
    /// Setting a value equal to the current one is a no-op: nothing is
    /// scheduled. Equality is `T`'s `PartialEq`. For [`Value`] that is
    /// `Object.is`, so `NaN` equals `NaN` and `-0` differs from `+0`; a
    /// `Signal<f64>` follows IEEE comparison instead and re-notifies on
    /// every `NaN` write.
    ///
    /// [`Value`]: crate::Value
    pub fn set(&self, value: T) {
        {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                trace!(signal = %self.inner.id, "value unchanged, skipping notify");
                return;
            }
            *current = value;
        }
        trace!(signal = %self.inner.id, "setting signal");
        self.notify();
    }

    /// Update the value using a function of the current one.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = f(&self.inner.value.borrow());
        self.set(next);
    }
}

impl<T: 'static> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug + 'static> Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .field("dependent_count", &self.dependent_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn counting_effect(runtime: &Runtime, signal: &Signal<i32>) -> (Effect, Rc<Cell<usize>>) {
        let runs = Rc::new(Cell::new(0));
        let effect = Effect::new_in(runtime, {
            let (signal, runs) = (signal.clone(), runs.clone());
            move || {
                signal.get();
                runs.set(runs.get() + 1);
            }
        });
        (effect, runs)
    }

    #[test]
    fn signal_get_and_set() {
        let runtime = Runtime::new();
        let signal = Signal::new_in(&runtime, 0);
        assert_eq!(signal.get(), 0);

        signal.set(42);
        assert_eq!(signal.get(), 42);
    }

    #[test]
    fn signal_update() {
        let runtime = Runtime::new();
        let signal = Signal::new_in(&runtime, 10);
        signal.update(|v| v + 5);
        assert_eq!(signal.get(), 15);
    }

    #[test]
    fn signal_clone_shares_state() {
        let runtime = Runtime::new();
        let signal1 = Signal::new_in(&runtime, 0);
        let signal2 = signal1.clone();

        signal1.set(42);
        assert_eq!(signal2.get(), 42);
        assert_eq!(signal1.id(), signal2.id());
    }

    #[test]
    fn signal_ids_are_unique() {
        let runtime = Runtime::new();
        let s1 = Signal::new_in(&runtime, 0);
        let s2 = Signal::new_in(&runtime, 0);
        assert_ne!(s1.id(), s2.id());
    }

    #[test]
    fn read_inside_effect_links_both_ways() {
        let runtime = Runtime::new();
        let signal = Signal::new_in(&runtime, 1);
        let (effect, _) = counting_effect(&runtime, &signal);

        assert!(signal.has_dependent(effect.id()));
        assert_eq!(effect.dependency_count(), 1);
    }

    #[test]
    fn value_signals_compare_with_object_is() {
        use crate::value::Value;

        let runtime = Runtime::new();
        let signal = Signal::new_in(&runtime, Value::from(f64::NAN));
        let effect = Effect::new_in(&runtime, {
            let signal = signal.clone();
            move || {
                signal.get();
            }
        });

        signal.set(Value::from(f64::NAN));
        assert!(!effect.is_queued());

        signal.set(Value::from(-0.0));
        signal.set(Value::from(0.0));
        assert!(effect.is_queued());
    }

    #[test]
    fn replace_notifies_even_when_equal() {
        let runtime = Runtime::new();
        let signal = Signal::new_in(&runtime, 7);
        let (effect, runs) = counting_effect(&runtime, &signal);

        signal.replace(7);
        assert!(effect.is_queued());
        runtime.flush();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn equal_set_does_not_schedule() {
        let runtime = Runtime::new();
        let signal = Signal::new_in(&runtime, 7);
        let (effect, runs) = counting_effect(&runtime, &signal);

        signal.set(7);
        assert!(!effect.is_queued());
        assert!(!runtime.is_flush_scheduled());

        runtime.flush();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn peek_does_not_track() {
        let runtime = Runtime::new();
        let signal = Signal::new_in(&runtime, 1);
        let effect = Effect::new_in(&runtime, {
            let signal = signal.clone();
            move || {
                signal.peek();
            }
        });

        assert_eq!(signal.dependent_count(), 0);
        assert_eq!(effect.dependency_count(), 0);
    }

    #[test]
    fn with_tracks_and_borrows() {
        let runtime = Runtime::new();
        let signal = Signal::new_in(&runtime, String::from("hello"));
        let len = Rc::new(Cell::new(0));
        let _effect = Effect::new_in(&runtime, {
            let (signal, len) = (signal.clone(), len.clone());
            move || len.set(signal.with(|s| s.len()))
        });
        assert_eq!(len.get(), 5);

        signal.set(String::from("hi"));
        runtime.flush();
        assert_eq!(len.get(), 2);
    }

    #[test]
    fn release_removes_dependent() {
        let runtime = Runtime::new();
        let signal = Signal::new_in(&runtime, 1);
        let (effect, _) = counting_effect(&runtime, &signal);

        signal.release(effect.id());
        assert!(!signal.has_dependent(effect.id()));

        // Releasing again is harmless
        signal.release(effect.id());
        assert_eq!(signal.dependent_count(), 0);
    }

    #[test]
    fn signal_outlives_runtime() {
        let runtime = Runtime::new();
        let signal = Signal::new_in(&runtime, 1);
        drop(runtime);

        // No runtime left to track against: reads and writes still work
        signal.set(2);
        assert_eq!(signal.get(), 2);
    }
}
