//! Effect Scheduler
//!
//! The scheduler collapses many invalidations into one re-run per effect.
//!
//! # Algorithm
//!
//! 1. A signal write calls `rerun` on each dependent effect, which releases the
//!    effect's dependencies and enqueues it here.
//! 2. The pending queue is a set with stable insertion order: enqueueing an
//!    effect that is already pending is a no-op, so it keeps its original
//!    position.
//! 3. The first enqueue of a turn marks a flush as scheduled.
//! 4. A flush pops effects from the front and runs them until the queue is
//!    empty. Effects enqueued while flushing (by writes inside other effects)
//!    are drained by the same flush.
//! 5. When the queue is empty the scheduled flag resets.
//!
//! Nothing here catches panics. A panicking effect unwinds out of `flush`;
//! the guard below restores the flags so the rest of the queue drains on the
//! next flush.

use std::cell::{Cell, RefCell};

use indexmap::IndexMap;
use tracing::{debug, trace};

use super::effect::Effect;
use super::id::EffectId;

/// Pending-effect queue and flush state of one runtime.
pub(crate) struct Scheduler {
    queue: RefCell<IndexMap<EffectId, Effect>>,
    flush_scheduled: Cell<bool>,
    flushing: Cell<bool>,
    max_flush_runs: usize,
}

impl Scheduler {
    pub(crate) fn new(max_flush_runs: usize) -> Self {
        Self {
            queue: RefCell::new(IndexMap::new()),
            flush_scheduled: Cell::new(false),
            flushing: Cell::new(false),
            max_flush_runs,
        }
    }

    /// Add `effect` to the pending queue.
    ///
    /// Returns `false` if it was already pending.
    pub(crate) fn enqueue(&self, effect: Effect) -> bool {
        let effect_id = effect.id();
        let mut queue = self.queue.borrow_mut();
        if queue.contains_key(&effect_id) {
            trace!(effect = %effect_id, "effect already queued");
            return false;
        }
        queue.insert(effect_id, effect);

        if !self.flush_scheduled.replace(true) {
            debug!(effect = %effect_id, "scheduling flush");
        }
        true
    }

    /// Remove `effect_id` from the pending queue.
    pub(crate) fn dequeue(&self, effect_id: EffectId) -> bool {
        self.queue.borrow_mut().shift_remove(&effect_id).is_some()
    }

    pub(crate) fn is_queued(&self, effect_id: EffectId) -> bool {
        self.queue.borrow().contains_key(&effect_id)
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.queue.borrow().len()
    }

    pub(crate) fn is_flush_scheduled(&self) -> bool {
        self.flush_scheduled.get()
    }

    /// Run every pending effect once, in FIFO order, until the queue is empty.
    ///
    /// A flush requested from inside a running flush is a no-op: the outer
    /// loop is already draining the queue.
    ///
    /// # Panics
    ///
    /// Propagates panics from effect operations, and panics when a single
    /// flush performs more than `max_flush_runs` effect runs.
    pub(crate) fn flush(&self) {
        if self.flushing.get() {
            trace!("flush requested while flushing");
            return;
        }
        if self.queue.borrow().is_empty() {
            self.flush_scheduled.set(false);
            return;
        }

        let _guard = FlushGuard::new(self);
        debug!(queued = self.pending_count(), "flushing effects");

        let mut runs = 0usize;
        loop {
            // Release the borrow before running: the effect may enqueue others.
            let next = self.queue.borrow_mut().shift_remove_index(0);
            let Some((_, effect)) = next else { break };

            runs += 1;
            if runs > self.max_flush_runs {
                panic!(
                    "Maximum update depth exceeded. An effect keeps writing to a \
                     signal that re-triggers it ({} runs in one flush).",
                    self.max_flush_runs
                );
            }

            effect.run();
        }

        debug!(runs, "flush complete");
    }
}

/// Marks the scheduler as flushing for the guard's lifetime.
///
/// On drop (normal or unwinding) the scheduled flag is recomputed from the
/// queue, so a flush interrupted by a panic stays scheduled.
struct FlushGuard<'a> {
    scheduler: &'a Scheduler,
}

impl<'a> FlushGuard<'a> {
    fn new(scheduler: &'a Scheduler) -> Self {
        scheduler.flushing.set(true);
        Self { scheduler }
    }
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        let scheduler = self.scheduler;
        scheduler.flushing.set(false);
        scheduler
            .flush_scheduled
            .set(!scheduler.queue.borrow().is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Runtime;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recording_effect(runtime: &Runtime, log: &Rc<RefCell<Vec<u32>>>, tag: u32) -> Effect {
        let log = log.clone();
        Effect::new_lazy_in(runtime, move || log.borrow_mut().push(tag))
    }

    #[test]
    fn enqueue_deduplicates() {
        let runtime = Runtime::new();
        let scheduler = Scheduler::new(100);
        let effect = Effect::new_lazy_in(&runtime, || {});

        assert!(scheduler.enqueue(effect.clone()));
        assert!(!scheduler.enqueue(effect.clone()));
        assert_eq!(scheduler.pending_count(), 1);
        assert!(scheduler.is_flush_scheduled());
    }

    #[test]
    fn flush_runs_in_fifo_order() {
        let runtime = Runtime::new();
        let scheduler = Scheduler::new(100);
        let log = Rc::new(RefCell::new(Vec::new()));

        let first = recording_effect(&runtime, &log, 1);
        let second = recording_effect(&runtime, &log, 2);
        let third = recording_effect(&runtime, &log, 3);

        scheduler.enqueue(second.clone());
        scheduler.enqueue(first.clone());
        scheduler.enqueue(third.clone());
        // Re-enqueueing keeps the original position
        scheduler.enqueue(second.clone());

        scheduler.flush();

        assert_eq!(*log.borrow(), vec![2, 1, 3]);
        assert_eq!(scheduler.pending_count(), 0);
        assert!(!scheduler.is_flush_scheduled());
    }

    #[test]
    fn dequeue_removes_pending_effect() {
        let runtime = Runtime::new();
        let scheduler = Scheduler::new(100);
        let log = Rc::new(RefCell::new(Vec::new()));
        let effect = recording_effect(&runtime, &log, 7);

        scheduler.enqueue(effect.clone());
        assert!(scheduler.is_queued(effect.id()));
        assert!(scheduler.dequeue(effect.id()));
        assert!(!scheduler.is_queued(effect.id()));

        scheduler.flush();
        assert!(log.borrow().is_empty());
        assert!(!scheduler.is_flush_scheduled());
    }

    #[test]
    fn flush_guard_keeps_remaining_queue_after_panic() {
        let runtime = Runtime::new();
        let scheduler = Scheduler::new(100);
        let log = Rc::new(RefCell::new(Vec::new()));

        let failing = Effect::new_lazy_in(&runtime, || panic!("effect failed"));
        let after = recording_effect(&runtime, &log, 1);

        scheduler.enqueue(failing);
        scheduler.enqueue(after);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| scheduler.flush()));
        assert!(result.is_err());
        assert!(scheduler.is_flush_scheduled());
        assert_eq!(scheduler.pending_count(), 1);

        scheduler.flush();
        assert_eq!(*log.borrow(), vec![1]);
        assert!(!scheduler.is_flush_scheduled());
    }
}
