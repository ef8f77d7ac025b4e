//! Scope
//!
//! The scope owns every piece of shared state in the reactive system: the
//! signal and effect arenas, the observer stack, the pending queue, the
//! batch depth, and the error hook. Nothing in this crate is process-wide.
//! Two scopes never interfere, so independent reactive graphs (one per
//! terminal session, or one per test case) can coexist freely.
//!
//! # Observer stack
//!
//! While an effect runs, its ID sits on top of the scope's observer
//! stack, and every signal read attributes the subscription to whatever
//! is on top. The stack nests: an effect created inside another effect's
//! run tracks its own reads, then tracking returns to the outer effect.
//! [`Scope::untrack`] empties the stack for the duration of a closure so
//! that diagnostic reads subscribe nothing.
//!
//! # Flushing
//!
//! A write outside any batch, flush, or effect run drains the pending
//! queue before returning. Writes made while an effect is running only
//! enqueue; the drain in control picks them up after the run returns, so
//! an effect is never re-entered while it is still on the call stack.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use slotmap::SlotMap;
use tracing::{debug, error, trace};

use crate::error::ReactiveError;
use crate::graph::{
    EffectId, EffectSlot, Scheduler, SignalId, SignalSlot, MAX_FLUSH_STEPS,
};

use super::effect::{dispose_effect, run_effect, Effect, Runner};
use super::memo::Memo;
use super::signal::{dispose_signal, Signal};

type ErrorHook = Box<dyn Fn(&ReactiveError)>;

/// Shared state behind every handle created by one [`Scope`].
pub(crate) struct ScopeInner {
    pub(crate) signals: RefCell<SlotMap<SignalId, SignalSlot>>,
    pub(crate) effects: RefCell<SlotMap<EffectId, EffectSlot>>,

    /// Stack of currently running effects. The top entry, if any, is the
    /// subscription target for signal reads.
    pub(crate) observers: RefCell<Vec<EffectId>>,

    pub(crate) scheduler: Scheduler,

    /// Receives failed effect runs and detected cycles.
    error_hook: RefCell<Option<ErrorHook>>,

    /// Open `with_root` frames collecting created nodes for bulk disposal.
    collectors: RefCell<Vec<Vec<OwnedNode>>>,
}

impl ScopeInner {
    fn new() -> Self {
        Self {
            signals: RefCell::new(SlotMap::with_key()),
            effects: RefCell::new(SlotMap::with_key()),
            observers: RefCell::new(Vec::new()),
            scheduler: Scheduler::new(),
            error_hook: RefCell::new(None),
            collectors: RefCell::new(Vec::new()),
        }
    }

    /// Record a freshly created signal with the innermost open root, if
    /// any.
    pub(crate) fn record_signal(&self, id: SignalId) {
        if let Some(frame) = self.collectors.borrow_mut().last_mut() {
            frame.push(OwnedNode::Signal(id));
        }
    }

    /// Record a freshly created effect with the innermost open root, if
    /// any.
    pub(crate) fn record_effect(&self, id: EffectId) {
        if let Some(frame) = self.collectors.borrow_mut().last_mut() {
            frame.push(OwnedNode::Effect(id));
        }
    }

    /// Route an engine error to the installed hook, or log it.
    pub(crate) fn report(&self, err: &ReactiveError) {
        let hook = self.error_hook.borrow();
        match hook.as_ref() {
            Some(hook) => hook(err),
            None => error!("unhandled reactive error: {err}"),
        }
    }
}

/// A node owned by a [`Root`], recorded in creation order.
enum OwnedNode {
    Signal(SignalId),
    Effect(EffectId),
}

/// Entry point to the reactive system.
///
/// A scope creates signals, effects, and memos, and coordinates how
/// updates flow between them. Cloning a scope yields another handle to
/// the same state.
///
/// # Example
///
/// ```
/// use weft_core::Scope;
///
/// let scope = Scope::new();
/// let name = scope.create_signal(String::from("weft"));
///
/// let greeter = scope.create_effect({
///     let name = name.clone();
///     move || println!("hello, {}", name.get())
/// });
///
/// name.set(String::from("world")); // greeter re-runs
/// # greeter.dispose();
/// # name.dispose();
/// ```
#[derive(Clone)]
pub struct Scope {
    inner: Rc<ScopeInner>,
}

impl Scope {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ScopeInner::new()),
        }
    }

    /// Create a signal holding `value`. Every write notifies subscribers,
    /// even when the new value equals the old one; use
    /// [`create_signal_with`](Scope::create_signal_with) to suppress
    /// redundant writes.
    pub fn create_signal<T: 'static>(&self, value: T) -> Signal<T> {
        Signal::new(Rc::clone(&self.inner), value, None)
    }

    /// Create a signal with an equality predicate. A write whose value
    /// compares equal to the current one is dropped before it notifies
    /// anything.
    pub fn create_signal_with<T, F>(&self, value: T, equals: F) -> Signal<T>
    where
        T: 'static,
        F: Fn(&T, &T) -> bool + 'static,
    {
        Signal::new(
            Rc::clone(&self.inner),
            value,
            Some(Signal::<T>::erase_eq(equals)),
        )
    }

    /// Create an effect and run it once, synchronously, to establish its
    /// initial source list. From then on it re-runs whenever one of the
    /// signals it read during its latest run changes.
    ///
    /// Anything implementing [`Runner`] works; plain `FnMut()` closures
    /// are the common case.
    pub fn create_effect<R>(&self, runner: R) -> Effect
    where
        R: Runner + 'static,
    {
        Effect::new(Rc::clone(&self.inner), runner)
    }

    /// Create a cached derived value. `compute` runs once immediately and
    /// again whenever one of the signals it reads changes; subscribers of
    /// the memo only run when the computed value actually differs.
    pub fn create_memo<T, F>(&self, compute: F) -> Memo<T>
    where
        T: Clone + PartialEq + 'static,
        F: FnMut() -> T + 'static,
    {
        Memo::new(self, compute)
    }

    /// Run `body` with update propagation suspended. Writes made inside
    /// only enqueue their subscribers; the queue drains once, when the
    /// outermost batch exits. Nested batches compose with no extra
    /// flushes.
    ///
    /// ```
    /// use weft_core::Scope;
    ///
    /// let scope = Scope::new();
    /// let ticks = scope.create_signal(0);
    ///
    /// scope.batch(|| {
    ///     for n in 1..=10 {
    ///         ticks.set(n);
    ///     }
    /// });
    /// // subscribers of `ticks` ran once, seeing 10
    /// # ticks.dispose();
    /// ```
    pub fn batch<R>(&self, body: impl FnOnce() -> R) -> R {
        let out = {
            self.inner.scheduler.enter_batch();
            let _guard = BatchExit(&*self.inner);
            body()
        };
        maybe_flush(&self.inner);
        out
    }

    /// Run `body` with dependency tracking disabled. Signal and memo
    /// reads inside subscribe nothing; the observer stack is restored
    /// afterwards, panics included. Useful for logging a value from
    /// inside an effect without depending on it.
    pub fn untrack<R>(&self, body: impl FnOnce() -> R) -> R {
        let saved = self.inner.observers.take();
        let _guard = TrackRestore {
            inner: &*self.inner,
            saved: Some(saved),
        };
        body()
    }

    /// Register a cleanup callback on the currently running effect. The
    /// callback runs before the effect's next run, or on disposal,
    /// whichever comes first; callbacks from one run execute in reverse
    /// registration order.
    ///
    /// # Panics
    ///
    /// Panics when no effect is running.
    pub fn on_cleanup(&self, f: impl FnOnce() + 'static) {
        let observer = self.inner.observers.borrow().last().copied();
        let Some(id) = observer else {
            panic!("on_cleanup called outside a running effect");
        };

        let mut effects = self.inner.effects.borrow_mut();
        match effects.get_mut(id) {
            Some(slot) => slot.cleanups.push(Box::new(f)),
            // The effect disposed itself earlier in this run; this is the
            // callback's only chance to release anything.
            None => {
                drop(effects);
                f();
            }
        }
    }

    /// Install the handler for effect failures and detected cycles. Until
    /// one is installed, errors are logged through `tracing` and
    /// otherwise ignored.
    pub fn set_error_hook(&self, hook: impl Fn(&ReactiveError) + 'static) {
        *self.inner.error_hook.borrow_mut() = Some(Box::new(hook));
    }

    /// Run `body`, collecting every signal, effect, and memo it creates
    /// under a [`Root`] that can tear them all down at once.
    pub fn with_root<R>(&self, body: impl FnOnce() -> R) -> (R, Root) {
        self.inner.collectors.borrow_mut().push(Vec::new());
        let mut guard = CollectorGuard {
            inner: &*self.inner,
            armed: true,
        };
        let out = body();
        guard.armed = false;

        let nodes = self
            .inner
            .collectors
            .borrow_mut()
            .pop()
            .expect("open collector frame");
        debug!(nodes = nodes.len(), "root captured");
        (out, Root {
            inner: Rc::clone(&self.inner),
            nodes,
        })
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("signals", &self.inner.signals.borrow().len())
            .field("effects", &self.inner.effects.borrow().len())
            .field("pending", &self.inner.scheduler.pending())
            .finish()
    }
}

/// Bulk owner of the nodes created inside one [`Scope::with_root`] call.
///
/// Disposal walks the collected nodes in reverse creation order, so
/// downstream effects detach before the signals they read are torn down.
pub struct Root {
    inner: Rc<ScopeInner>,
    nodes: Vec<OwnedNode>,
}

impl Root {
    /// Number of nodes this root owns.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Dispose every owned node, newest first.
    pub fn dispose(self) {
        let Root { inner, nodes } = self;
        for node in nodes.into_iter().rev() {
            match node {
                OwnedNode::Effect(id) => dispose_effect(&inner, id),
                OwnedNode::Signal(id) => dispose_signal(&inner, id),
            }
        }
    }
}

impl Debug for Root {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Root").field("nodes", &self.len()).finish()
    }
}

/// Drain the pending queue, running each effect once per wave until no
/// more work is produced. Effects re-queued while draining (by writes
/// made inside their siblings) extend the same drain. A call while a
/// drain is already in progress is a no-op.
pub(crate) fn flush(inner: &ScopeInner) {
    if !inner.scheduler.begin_flush() {
        return;
    }
    let _guard = FlushDone(inner);

    let mut steps = 0usize;
    while let Some(id) = inner.scheduler.pop_front() {
        steps += 1;
        if steps > MAX_FLUSH_STEPS {
            let dropped = inner.scheduler.pending() + 1;
            inner.scheduler.clear();
            debug!(dropped, "flush aborted by cycle guard");
            inner.report(&ReactiveError::CycleDetected {
                limit: MAX_FLUSH_STEPS,
            });
            return;
        }
        trace!(?id, step = steps, "draining effect");
        run_effect(inner, id);
    }
}

/// Drain unless a batch, a flush, or an effect run is already in control;
/// each of those ends with its own drain.
pub(crate) fn maybe_flush(inner: &ScopeInner) {
    if inner.scheduler.in_batch()
        || inner.scheduler.is_flushing()
        || inner.scheduler.in_run()
    {
        return;
    }
    flush(inner);
}

struct BatchExit<'a>(&'a ScopeInner);

impl Drop for BatchExit<'_> {
    fn drop(&mut self) {
        self.0.scheduler.exit_batch();
    }
}

struct FlushDone<'a>(&'a ScopeInner);

impl Drop for FlushDone<'_> {
    fn drop(&mut self) {
        self.0.scheduler.end_flush();
    }
}

struct TrackRestore<'a> {
    inner: &'a ScopeInner,
    saved: Option<Vec<EffectId>>,
}

impl Drop for TrackRestore<'_> {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            *self.inner.observers.borrow_mut() = saved;
        }
    }
}

struct CollectorGuard<'a> {
    inner: &'a ScopeInner,
    armed: bool,
}

impl Drop for CollectorGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.inner.collectors.borrow_mut().pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn scopes_are_independent() {
        let a = Scope::new();
        let b = Scope::new();

        let sig_a = a.create_signal(0);
        let sig_b = b.create_signal(0);

        let runs_b = Rc::new(Cell::new(0));
        let _eff = b.create_effect({
            let runs_b = runs_b.clone();
            let sig_b = sig_b.clone();
            move || {
                sig_b.get();
                runs_b.set(runs_b.get() + 1);
            }
        });
        assert_eq!(runs_b.get(), 1);

        // Traffic in one scope never reaches the other.
        sig_a.set(5);
        sig_a.set(6);
        assert_eq!(runs_b.get(), 1);
    }

    #[test]
    fn untracked_reads_do_not_subscribe() {
        let scope = Scope::new();
        let watched = scope.create_signal(0);
        let peeked = scope.create_signal(0);

        let runs = Rc::new(Cell::new(0));
        let _eff = scope.create_effect({
            let runs = runs.clone();
            let scope = scope.clone();
            let watched = watched.clone();
            let peeked = peeked.clone();
            move || {
                runs.set(runs.get() + 1);
                watched.get();
                scope.untrack(|| peeked.get());
            }
        });
        assert_eq!(runs.get(), 1);
        assert_eq!(peeked.subscriber_count(), 0);

        peeked.set(99);
        assert_eq!(runs.get(), 1);

        watched.set(1);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn untrack_restores_tracking_afterwards() {
        let scope = Scope::new();
        let before = scope.create_signal(0);
        let after = scope.create_signal(0);

        let runs = Rc::new(Cell::new(0));
        let _eff = scope.create_effect({
            let runs = runs.clone();
            let scope = scope.clone();
            let before = before.clone();
            let after = after.clone();
            move || {
                runs.set(runs.get() + 1);
                scope.untrack(|| before.get());
                after.get();
            }
        });

        // Reads after the untracked section still subscribe.
        after.set(1);
        assert_eq!(runs.get(), 2);
        assert_eq!(before.subscriber_count(), 0);
        assert_eq!(after.subscriber_count(), 1);
    }

    #[test]
    fn batch_coalesces_writes() {
        let scope = Scope::new();
        let counter = scope.create_signal(0);

        let runs = Rc::new(Cell::new(0));
        let _eff = scope.create_effect({
            let runs = runs.clone();
            let counter = counter.clone();
            move || {
                counter.get();
                runs.set(runs.get() + 1);
            }
        });
        assert_eq!(runs.get(), 1);

        scope.batch(|| {
            for n in 1..=10 {
                counter.set(n);
            }
        });
        assert_eq!(runs.get(), 2);
        assert_eq!(counter.get(), 10);
    }

    #[test]
    fn nested_batches_flush_once() {
        let scope = Scope::new();
        let counter = scope.create_signal(0);

        let runs = Rc::new(Cell::new(0));
        let _eff = scope.create_effect({
            let runs = runs.clone();
            let counter = counter.clone();
            move || {
                counter.get();
                runs.set(runs.get() + 1);
            }
        });

        scope.batch(|| {
            counter.set(1);
            scope.batch(|| {
                counter.set(2);
                counter.set(3);
            });
            // The inner batch exiting must not drain early.
            assert_eq!(runs.get(), 1);
            counter.set(4);
        });
        assert_eq!(runs.get(), 2);
    }

    #[test]
    #[should_panic(expected = "outside a running effect")]
    fn on_cleanup_outside_effect_panics() {
        let scope = Scope::new();
        scope.on_cleanup(|| {});
    }

    #[test]
    fn with_root_disposes_in_bulk() {
        let scope = Scope::new();
        let input = scope.create_signal(1);

        let runs = Rc::new(Cell::new(0));
        let ((), root) = scope.with_root(|| {
            let doubled = scope.create_memo({
                let input = input.clone();
                move || input.get() * 2
            });
            let _eff = scope.create_effect({
                let runs = runs.clone();
                let doubled = doubled.clone();
                move || {
                    doubled.get();
                    runs.set(runs.get() + 1);
                }
            });
        });
        assert_eq!(root.len(), 3);
        assert_eq!(runs.get(), 1);

        root.dispose();

        // The whole subgraph is gone: no run, no lingering subscription.
        input.set(10);
        assert_eq!(runs.get(), 1);
        assert_eq!(input.subscriber_count(), 0);
    }

    #[test]
    fn scope_debug_reports_counts() {
        let scope = Scope::new();
        let _sig = scope.create_signal(0);
        let repr = format!("{scope:?}");
        assert!(repr.contains("signals: 1"));
    }
}
