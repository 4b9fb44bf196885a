//! Effect Implementation
//!
//! An Effect is a side-effecting computation that re-runs whenever a signal
//! it read during its last run changes.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its operation immediately to establish
//!    initial dependencies.
//!
//! 2. When a dependency changes, the effect drops *all* of its dependencies
//!    and queues itself. Dropping everything first is what makes conditional
//!    reads correct: the next run re-subscribes to exactly the signals it
//!    reads, so a branch that is no longer taken stops triggering it.
//!
//! 3. An effect never re-queues itself while it is the running effect. An
//!    operation may read and write the same signal without looping.
//!
//! # Release
//!
//! [`Effect::release`] unsubscribes immediately. A permanent release also
//! swaps the operation for a no-op, which drops everything the closure
//! captured; this is how an effect is torn down. A non-permanent release
//! leaves the effect dormant: a manual [`Effect::run`] brings it back.
//!
//! # Failures
//!
//! The operation is never wrapped in `catch_unwind`. A panic during
//! construction or a manual `run` unwinds to the caller; a panic during a
//! batched re-run unwinds out of `Runtime::flush`.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use tracing::{debug, trace, warn};

use super::id::{EffectId, SignalId};
use super::runtime::{Runtime, RuntimeInner};
use super::signal::Source;

type Operation = Rc<dyn Fn()>;

pub(crate) struct EffectInner {
    id: EffectId,
    operation: RefCell<Operation>,
    dependencies: RefCell<IndexMap<SignalId, Weak<dyn Source>>>,
    runtime: Weak<RuntimeInner>,
    run_count: Cell<usize>,
    disposed: Cell<bool>,
}

/// A side-effecting computation that re-runs when its dependencies change.
///
/// Cloning an effect yields another handle to the same computation.
///
/// # Example
///
/// ```rust
/// use reactivity_core::{Runtime, Signal, Effect};
///
/// let runtime = Runtime::new();
/// let _guard = runtime.enter();
///
/// let count = Signal::new(0);
/// let effect = Effect::new({
///     let count = count.clone();
///     move || println!("Count is: {}", count.get())
/// });
///
/// count.set(5);
/// runtime.flush(); // Prints: "Count is: 5"
///
/// effect.release(true);
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Rc<EffectInner>,
}

impl Effect {
    /// Create an effect in the current runtime and run it once.
    pub fn new<F>(operation: F) -> Self
    where
        F: Fn() + 'static,
    {
        Self::new_in(&Runtime::current(), operation)
    }

    /// Create an effect in `runtime` and run it once.
    pub fn new_in<F>(runtime: &Runtime, operation: F) -> Self
    where
        F: Fn() + 'static,
    {
        let effect = Self::new_lazy_in(runtime, operation);
        effect.run();
        effect
    }

    /// Create an effect in the current runtime without running it.
    ///
    /// The effect has no dependencies until its first [`run`](Self::run).
    pub fn new_lazy<F>(operation: F) -> Self
    where
        F: Fn() + 'static,
    {
        Self::new_lazy_in(&Runtime::current(), operation)
    }

    /// Create an effect in `runtime` without running it.
    pub fn new_lazy_in<F>(runtime: &Runtime, operation: F) -> Self
    where
        F: Fn() + 'static,
    {
        let id = EffectId::new();
        debug!(effect = %id, "creating effect");
        Self {
            inner: Rc::new(EffectInner {
                id,
                operation: RefCell::new(Rc::new(operation)),
                dependencies: RefCell::new(IndexMap::new()),
                runtime: runtime.downgrade(),
                run_count: Cell::new(0),
                disposed: Cell::new(false),
            }),
        }
    }

    /// Get the effect's unique ID.
    pub fn id(&self) -> EffectId {
        self.inner.id
    }

    /// Run the operation now, tracking the signals it reads.
    ///
    /// Dependencies from the previous run are dropped first, so afterwards
    /// the effect depends on exactly what this run read.
    pub fn run(&self) {
        self.release_dependencies();

        // Clone out of the cell: the operation may release this effect.
        let operation = self.inner.operation.borrow().clone();

        match self.inner.runtime.upgrade() {
            Some(runtime) => {
                trace!(effect = %self.inner.id, "running effect");
                let _ctx = runtime.context.enter(self.clone());
                operation();
            }
            None => {
                warn!(effect = %self.inner.id, "runtime dropped, running effect untracked");
                operation();
            }
        }

        self.inner.run_count.set(self.inner.run_count.get() + 1);
    }

    /// Record that the running operation read the signal `signal_id`.
    pub(crate) fn register(&self, signal_id: SignalId, source: Weak<dyn Source>) {
        self.inner
            .dependencies
            .borrow_mut()
            .insert(signal_id, source);
    }

    /// Request a re-run on the next flush.
    ///
    /// Signals call this when they change. It is ignored while this effect
    /// is the one running; otherwise the effect unsubscribes from everything
    /// and joins the pending queue (once, however many times it is asked).
    pub fn rerun(&self) {
        let Some(runtime) = self.inner.runtime.upgrade() else {
            warn!(effect = %self.inner.id, "runtime dropped, ignoring rerun");
            return;
        };
        if runtime.context.is_current(self.inner.id) {
            trace!(effect = %self.inner.id, "ignoring self-triggered rerun");
            return;
        }

        self.release_dependencies();
        if runtime.scheduler.enqueue(self.clone()) {
            debug!(effect = %self.inner.id, "effect queued");
        }
    }

    /// Unsubscribe from every dependency and leave the pending queue.
    ///
    /// With `permanent`, the operation is also replaced by a no-op so later
    /// manual runs do nothing. Releasing is idempotent.
    pub fn release(&self, permanent: bool) {
        debug!(effect = %self.inner.id, permanent, "releasing effect");
        self.release_dependencies();

        if let Some(runtime) = self.inner.runtime.upgrade() {
            runtime.scheduler.dequeue(self.inner.id);
        }

        if permanent && !self.inner.disposed.replace(true) {
            *self.inner.operation.borrow_mut() = Rc::new(|| {});
        }
    }

    fn release_dependencies(&self) {
        let dependencies = std::mem::take(&mut *self.inner.dependencies.borrow_mut());
        for source in dependencies.values() {
            if let Some(source) = source.upgrade() {
                source.release(self.inner.id);
            }
        }
    }

    /// Whether the effect was permanently released.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Whether the effect is waiting in the pending queue.
    pub fn is_queued(&self) -> bool {
        self.inner
            .runtime
            .upgrade()
            .is_some_and(|runtime| runtime.scheduler.is_queued(self.inner.id))
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Get the number of dependencies.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.borrow().len()
    }

    /// Whether the last run read the signal `signal_id`.
    pub fn depends_on(&self, signal_id: SignalId) -> bool {
        self.inner.dependencies.borrow().contains_key(&signal_id)
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
