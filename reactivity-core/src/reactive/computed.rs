//! Computed Implementation
//!
//! A Computed is a read-only signal whose value is maintained by an internal
//! effect.
//!
//! # How Computeds Work
//!
//! 1. On creation, a signal is seeded with the empty marker (`None`) and an
//!    effect is built whose operation is `signal.set(Some(derive()))`. The
//!    effect runs immediately, so the value is populated before `new` returns.
//!
//! 2. The effect tracks whatever `derive` reads. When one of those signals
//!    changes, the effect is queued like any other and recomputes on the
//!    next flush.
//!
//! 3. Because signal writes skip equal values, readers of the computed are
//!    only scheduled when the derived value actually changes.
//!
//! Unlike a lazy memo, a computed is eager: it recomputes on every flush
//! that touches its inputs, whether or not anybody reads it.

use std::fmt::{self, Debug};

use super::effect::Effect;
use super::runtime::Runtime;
use super::signal::Signal;

/// A derived, memoised, reactive value.
///
/// # Example
///
/// ```rust
/// use reactivity_core::{Runtime, Signal, Computed};
///
/// let runtime = Runtime::new();
/// let _guard = runtime.enter();
///
/// let count = Signal::new(2);
/// let doubled = Computed::new({
///     let count = count.clone();
///     move || count.get() * 2
/// });
/// assert_eq!(doubled.get(), 4);
///
/// count.set(5);
/// runtime.flush();
/// assert_eq!(doubled.get(), 10);
/// ```
pub struct Computed<T: 'static> {
    signal: Signal<Option<T>>,
    effect: Effect,
}

impl<T> Computed<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Create a computed in the current runtime.
    pub fn new<F>(derive: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        Self::new_in(&Runtime::current(), derive)
    }

    /// Create a computed in `runtime`.
    ///
    /// # Panics
    ///
    /// A panic in `derive` during this first run propagates to the caller.
    pub fn new_in<F>(runtime: &Runtime, derive: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let signal = Signal::new_in(runtime, None);
        let effect = Effect::new_in(runtime, {
            let signal = signal.clone();
            move || signal.set(Some(derive()))
        });
        Self { signal, effect }
    }

    /// Get the current value, tracking the read.
    pub fn get(&self) -> T {
        self.signal
            .get()
            .expect("computed value is populated by its first run")
    }

    /// Get the current value without tracking the read.
    pub fn peek(&self) -> T {
        self.signal
            .peek()
            .expect("computed value is populated by its first run")
    }
}

impl<T: 'static> Computed<T> {
    /// The effect that keeps the value up to date.
    pub fn effect(&self) -> &Effect {
        &self.effect
    }

    /// Number of effects depending on this value.
    pub fn dependent_count(&self) -> usize {
        self.signal.dependent_count()
    }

    /// Stop recomputing. The last value stays readable.
    pub fn dispose(&self) {
        self.effect.release(true);
    }

    /// Dispose and schedule every reader, so they stop depending on a value
    /// that will never change again.
    pub(crate) fn retire(&self) {
        self.dispose();
        self.signal.notify();
    }
}

impl<T: 'static> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
            effect: self.effect.clone(),
        }
    }
}

impl<T: Debug + 'static> Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("signal", &self.signal)
            .field("effect", &self.effect)
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
    use std::rc::Rc;

    #[test]
    fn computed_has_value_after_construction() {
        let runtime = Runtime::new();
        let computed = Computed::new_in(&runtime, || 42);
        assert_eq!(computed.get(), 42);
        assert_eq!(computed.peek(), 42);
    }

    #[test]
    fn computed_tracks_signal_dependency() {
        let runtime = Runtime::new();
        let signal = Signal::new_in(&runtime, 10);
        let computed = Computed::new_in(&runtime, {
            let signal = signal.clone();
            move || signal.get() * 2
        });
        assert_eq!(computed.get(), 20);

        signal.set(5);
        // Batched like any effect
        assert_eq!(computed.get(), 20);
        runtime.flush();
        assert_eq!(computed.get(), 10);
    }

    #[test]
    fn computed_caches_between_changes() {
        let runtime = Runtime::new();
        let calls = Rc::new(Cell::new(0));
        let computed = Computed::new_in(&runtime, {
            let calls = calls.clone();
            move || {
                calls.set(calls.get() + 1);
                42
            }
        });

        computed.get();
        computed.get();
        computed.get();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn computed_depends_on_computed() {
        let runtime = Runtime::new();
        let base = Signal::new_in(&runtime, 5);
        let doubled = Computed::new_in(&runtime, {
            let base = base.clone();
            move || base.get() * 2
        });
        let plus_ten = Computed::new_in(&runtime, {
            let doubled = doubled.clone();
            move || doubled.get() + 10
        });

        assert_eq!(plus_ten.get(), 20);

        base.set(10);
        runtime.flush();
        assert_eq!(doubled.get(), 20);
        assert_eq!(plus_ten.get(), 30);
    }

    #[test]
    fn unchanged_result_does_not_notify_readers() {
        let runtime = Runtime::new();
        let number = Signal::new_in(&runtime, 2);
        let parity = Computed::new_in(&runtime, {
            let number = number.clone();
            move || number.get() % 2
        });
        let runs = Rc::new(Cell::new(0));
        let _reader = Effect::new_in(&runtime, {
            let (parity, runs) = (parity.clone(), runs.clone());
            move || {
                parity.get();
                runs.set(runs.get() + 1);
            }
        });

        number.set(4);
        runtime.flush();
        assert_eq!(runs.get(), 1);

        number.set(5);
        runtime.flush();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn dispose_freezes_value() {
        let runtime = Runtime::new();
        let signal = Signal::new_in(&runtime, 1);
        let computed = Computed::new_in(&runtime, {
            let signal = signal.clone();
            move || signal.get()
        });

        computed.dispose();
        signal.set(2);
        runtime.flush();
        assert_eq!(computed.get(), 1);
        assert!(computed.effect().is_disposed());
    }
}
