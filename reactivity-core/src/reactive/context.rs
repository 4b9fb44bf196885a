//! Reactive Context
//!
//! The reactive context tracks which effect is currently running. This is
//! what makes dependency tracking automatic: when a signal is read, it links
//! itself to the effect on top of the stack.
//!
//! # Implementation
//!
//! Each [`Runtime`](super::Runtime) owns one context. Running an effect pushes
//! it onto the stack and the returned guard pops it again. Nested runs (an
//! effect constructed inside another effect, or a computed created during a
//! run) simply stack up; only the top entry receives dependencies.
//!
//! The context also carries the untrack flag. While it is set, signal reads
//! return their value without linking anything.

use std::cell::{Cell, RefCell};

use smallvec::SmallVec;

use super::effect::Effect;
use super::id::EffectId;

/// The active-effect stack and untrack flag of one runtime.
pub(crate) struct ReactiveContext {
    stack: RefCell<SmallVec<[Effect; 8]>>,
    untracked: Cell<bool>,
}

impl ReactiveContext {
    pub(crate) fn new() -> Self {
        Self {
            stack: RefCell::new(SmallVec::new()),
            untracked: Cell::new(false),
        }
    }

    /// Enter the context of `effect`.
    ///
    /// Signals read until the returned guard is dropped register with
    /// `effect`. The guard pops the stack even if the effect panics.
    pub(crate) fn enter(&self, effect: Effect) -> ContextGuard<'_> {
        let effect_id = effect.id();
        self.stack.borrow_mut().push(effect);
        ContextGuard {
            context: self,
            effect_id,
        }
    }

    /// The effect currently running, if any.
    pub(crate) fn current(&self) -> Option<Effect> {
        self.stack.borrow().last().cloned()
    }

    /// Whether `effect_id` is the effect on top of the stack.
    pub(crate) fn is_current(&self, effect_id: EffectId) -> bool {
        self.stack
            .borrow()
            .last()
            .is_some_and(|effect| effect.id() == effect_id)
    }

    /// Number of effects currently on the stack.
    pub(crate) fn depth(&self) -> usize {
        self.stack.borrow().len()
    }

    pub(crate) fn is_untracked(&self) -> bool {
        self.untracked.get()
    }

    /// Run `f` with tracking suspended, restoring the previous mode afterwards.
    pub(crate) fn untrack<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = UntrackGuard {
            context: self,
            previous: self.untracked.replace(true),
        };
        f()
    }
}

/// Guard that pops the active effect when dropped.
pub(crate) struct ContextGuard<'a> {
    context: &'a ReactiveContext,
    effect_id: EffectId,
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        let popped = self.context.stack.borrow_mut().pop();

        if let Some(effect) = popped {
            debug_assert_eq!(
                effect.id(),
                self.effect_id,
                "ReactiveContext mismatch: expected {}, got {}",
                self.effect_id,
                effect.id()
            );
        }
    }
}

struct UntrackGuard<'a> {
    context: &'a ReactiveContext,
    previous: bool,
}

impl Drop for UntrackGuard<'_> {
    fn drop(&mut self) {
        self.context.untracked.set(self.previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Runtime;

    #[test]
    fn context_tracks_current_effect() {
        let runtime = Runtime::new();
        let effect = Effect::new_lazy_in(&runtime, || {});
        let context = ReactiveContext::new();

        assert!(context.current().is_none());

        {
            let _guard = context.enter(effect.clone());
            assert!(context.is_current(effect.id()));
            assert_eq!(context.depth(), 1);
        }

        // Context should be cleaned up after drop
        assert!(context.current().is_none());
        assert_eq!(context.depth(), 0);
    }

    #[test]
    fn nested_contexts() {
        let runtime = Runtime::new();
        let outer = Effect::new_lazy_in(&runtime, || {});
        let inner = Effect::new_lazy_in(&runtime, || {});
        let context = ReactiveContext::new();

        {
            let _outer = context.enter(outer.clone());
            {
                let _inner = context.enter(inner.clone());
                assert!(context.is_current(inner.id()));
                assert!(!context.is_current(outer.id()));
            }

            // After inner context drops, outer should be current
            assert!(context.is_current(outer.id()));
        }

        assert!(context.current().is_none());
    }

    #[test]
    fn untrack_restores_previous_mode() {
        let context = ReactiveContext::new();

        context.untrack(|| {
            assert!(context.is_untracked());
            context.untrack(|| assert!(context.is_untracked()));
            // Leaving the inner scope must not re-enable tracking early
            assert!(context.is_untracked());
        });

        assert!(!context.is_untracked());
    }

    #[test]
    fn guard_pops_on_panic() {
        let runtime = Runtime::new();
        let effect = Effect::new_lazy_in(&runtime, || {});
        let context = ReactiveContext::new();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = context.enter(effect.clone());
            panic!("boom");
        }));

        assert!(result.is_err());
        assert_eq!(context.depth(), 0);
    }
}
