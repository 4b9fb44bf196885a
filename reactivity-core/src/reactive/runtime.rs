//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, effects and
//! reactive wrappers. Everything that would otherwise be process-wide state
//! lives here:
//!
//! - the active-effect stack and untrack flag ([`ReactiveContext`])
//! - the pending-effect queue and flush flags ([`Scheduler`])
//! - the proxy cache mapping raw objects to their canonical wrapper, which
//!   forgets wrappers once nothing else can reach them
//!
//! # How It Works
//!
//! 1. Signals, effects and wrappers are created *in* a runtime and keep a
//!    weak handle to it.
//!
//! 2. A signal read consults the runtime's context to find the running
//!    effect and link to it.
//!
//! 3. A signal write asks each dependent to re-run, which queues it in the
//!    runtime's scheduler.
//!
//! 4. The host ends a turn with [`Runtime::flush`] or awaits
//!    [`Runtime::settle`]; either drains the queue.
//!
//! # Current Runtime
//!
//! Each thread has an implicit default runtime. [`Runtime::enter`] makes
//! another runtime current until the returned guard drops, which is how tests
//! get an isolated graph and deterministic teardown. Dropping the last handle
//! to a runtime drops its queue and proxy cache; signals and effects that
//! outlive it keep working as plain values but no longer track or schedule.

use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

use tracing::debug;

use super::computed::Computed;
use super::context::ReactiveContext;
use super::effect::Effect;
use super::id::{EffectId, ObjectId};
use super::scheduler::Scheduler;
use super::signal::Signal;
use crate::proxy::{self, Proxy, ProxyCache};
use crate::value::Value;

/// Runtime configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Effect runs allowed in a single flush before it is treated as a
    /// runaway update loop and panics.
    pub max_flush_runs: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_flush_runs: 10_000,
        }
    }
}

pub(crate) struct RuntimeInner {
    pub(crate) config: RuntimeConfig,
    pub(crate) context: ReactiveContext,
    pub(crate) scheduler: Scheduler,
    proxies: RefCell<ProxyCache>,
}

/// Handle to one independent reactive graph.
///
/// Cloning the handle shares the runtime.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

thread_local! {
    static RUNTIME_STACK: RefCell<Vec<Runtime>> = const { RefCell::new(Vec::new()) };
    static DEFAULT_RUNTIME: Runtime = Runtime::new();
}

impl Runtime {
    /// Create a new runtime with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a new runtime.
    pub fn with_config(config: RuntimeConfig) -> Self {
        debug!(?config, "creating runtime");
        Self {
            inner: Rc::new(RuntimeInner {
                config,
                context: ReactiveContext::new(),
                scheduler: Scheduler::new(config.max_flush_runs),
                proxies: RefCell::new(ProxyCache::new()),
            }),
        }
    }

    /// The runtime new signals, effects and wrappers are created in.
    ///
    /// This is the innermost entered runtime, or the thread's default one.
    pub fn current() -> Runtime {
        RUNTIME_STACK
            .with(|stack| stack.borrow().last().cloned())
            .unwrap_or_else(|| DEFAULT_RUNTIME.with(Runtime::clone))
    }

    /// Make this runtime current until the guard is dropped.
    pub fn enter(&self) -> RuntimeGuard {
        RUNTIME_STACK.with(|stack| stack.borrow_mut().push(self.clone()));
        RuntimeGuard {
            _not_send: PhantomData,
        }
    }

    /// Run `f` with this runtime current.
    pub fn scope<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.enter();
        f()
    }

    pub fn config(&self) -> RuntimeConfig {
        self.inner.config
    }

    pub(crate) fn downgrade(&self) -> Weak<RuntimeInner> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn from_inner(inner: Rc<RuntimeInner>) -> Self {
        Self { inner }
    }

    /// Whether both handles refer to the same runtime.
    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // ------------------------------------------------------------------
    // Scheduling
    // ------------------------------------------------------------------

    /// Run every pending effect, including effects queued along the way.
    ///
    /// # Panics
    ///
    /// Panics raised by effect operations propagate out of this call. So
    /// does exceeding [`RuntimeConfig::max_flush_runs`].
    pub fn flush(&self) {
        self.inner.scheduler.flush();
    }

    /// Yield to the executor once, then flush.
    ///
    /// Resolves once the batch pending at the time of the call has run;
    /// afterwards every effect observes the final values of the turn.
    pub async fn settle(&self) {
        tokio::task::yield_now().await;
        self.flush();
    }

    /// Number of effects waiting for the next flush.
    pub fn pending_effects(&self) -> usize {
        self.inner.scheduler.pending_count()
    }

    /// Whether a flush is due.
    pub fn is_flush_scheduled(&self) -> bool {
        self.inner.scheduler.is_flush_scheduled()
    }

    // ------------------------------------------------------------------
    // Tracking
    // ------------------------------------------------------------------

    /// Run `f` without recording any signal reads.
    pub fn untrack<R>(&self, f: impl FnOnce() -> R) -> R {
        self.inner.context.untrack(f)
    }

    /// Run `f` with tracking suppressed in every one of `runtimes`.
    pub(crate) fn untrack_all<R>(runtimes: &[Runtime], f: impl FnOnce() -> R) -> R {
        match runtimes.split_first() {
            Some((first, rest)) => first.untrack(|| Runtime::untrack_all(rest, f)),
            None => f(),
        }
    }

    /// Whether a signal read right now would be recorded.
    pub fn is_tracking(&self) -> bool {
        !self.inner.context.is_untracked() && self.inner.context.current().is_some()
    }

    /// The effect currently running, if any.
    pub fn active_effect(&self) -> Option<EffectId> {
        self.inner.context.current().map(|effect| effect.id())
    }

    pub(crate) fn context_depth(&self) -> usize {
        self.inner.context.depth()
    }

    // ------------------------------------------------------------------
    // Constructors
    // ------------------------------------------------------------------

    /// Create a signal in this runtime.
    pub fn signal<T: 'static>(&self, value: T) -> Signal<T> {
        Signal::new_in(self, value)
    }

    /// Create and run an effect in this runtime.
    pub fn effect<F>(&self, operation: F) -> Effect
    where
        F: Fn() + 'static,
    {
        Effect::new_in(self, operation)
    }

    /// Create a computed value in this runtime.
    pub fn computed<T, F>(&self, derive: F) -> Computed<T>
    where
        T: Clone + PartialEq + 'static,
        F: Fn() -> T + 'static,
    {
        Computed::new_in(self, derive)
    }

    /// Wrap `value` in this runtime. See [`crate::reactive()`].
    pub fn reactive(&self, value: impl Into<Value>) -> Value {
        proxy::wrap_in(self, value.into())
    }

    // ------------------------------------------------------------------
    // Proxy cache
    // ------------------------------------------------------------------

    /// The canonical wrapper of the raw object `object_id`, if one exists.
    pub fn proxy_of(&self, object_id: ObjectId) -> Option<Proxy> {
        self.inner.proxies.borrow().get(object_id)
    }

    pub(crate) fn cache_proxy(&self, object_id: ObjectId, proxy: Proxy) {
        let _pruned = self.inner.proxies.borrow_mut().insert(object_id, proxy);
    }

    /// Drop cached wrappers that neither the host nor any reachable object
    /// still refers to, returning how many were dropped.
    ///
    /// The cache also prunes itself as it grows; this forces a full pass,
    /// including wrappers that only became unreachable because another
    /// pruned wrapper held them.
    pub fn prune_proxies(&self) -> usize {
        let mut total = 0;
        loop {
            let pruned = self.inner.proxies.borrow_mut().prune();
            if pruned.is_empty() {
                return total;
            }
            total += pruned.len();
        }
    }

    /// Number of objects wrapped by this runtime.
    pub fn proxy_count(&self) -> usize {
        self.inner.proxies.borrow().len()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .field("pending_effects", &self.pending_effects())
            .field("flush_scheduled", &self.is_flush_scheduled())
            .field("proxy_count", &self.proxy_count())
            .finish()
    }
}

/// Keeps a runtime current; returned by [`Runtime::enter`].
///
/// Guards must be dropped in reverse order of creation.
pub struct RuntimeGuard {
    _not_send: PhantomData<Rc<()>>,
}

impl Drop for RuntimeGuard {
    fn drop(&mut self) {
        RUNTIME_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}
