//! Effect Implementation
//!
//! An Effect is a side-effecting computation that re-runs whenever one of
//! the signals it read during its latest run changes.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs immediately to establish its initial
//!    source list.
//!
//! 2. A write to any of those sources enqueues the effect; the scheduler
//!    drains the queue and re-runs it once per wave.
//!
//! 3. Every run re-derives the source list from scratch. Sources read
//!    last time but not this time are unsubscribed, so an effect that
//!    stops reading a signal (a branch flipped, a list emptied) stops
//!    being notified by it. Subscriber sets shrink as well as grow.
//!
//! # Cleanup
//!
//! Resources acquired during a run are released through cleanup
//! callbacks, registered with
//! [`Scope::on_cleanup`](super::Scope::on_cleanup). Callbacks run in
//! reverse registration order before the next run and on disposal, so a
//! run never observes leftovers from its predecessor. A [`Runner`] can
//! additionally override [`cleanup`](Runner::cleanup) for resources held
//! across the effect's whole lifetime.
//!
//! # Errors
//!
//! A runner returning `Err` does not unwind: the error goes to the
//! scope's error hook, the effect keeps its (freshly re-derived) source
//! list, and the rest of the wave runs normally.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use tracing::trace;

use crate::error::{BoxError, ReactiveError};
use crate::graph::{EffectId, EffectSlot, SignalId};

use super::scope::ScopeInner;

/// A unit of side-effecting reactive work.
///
/// Implemented for all `FnMut()` closures, which is the common case.
/// Implement it by hand to carry explicit state, report failures, or
/// release long-lived resources:
///
/// ```
/// use weft_core::{BoxError, Runner, Scope, Signal};
///
/// struct TitleBar {
///     title: Signal<String>,
/// }
///
/// impl Runner for TitleBar {
///     fn run(&mut self) -> Result<(), BoxError> {
///         print!("\x1b]0;{}\x07", self.title.get());
///         Ok(())
///     }
/// }
///
/// let scope = Scope::new();
/// let title = scope.create_signal(String::from("weft"));
/// let bar = scope.create_effect(TitleBar { title: title.clone() });
/// # bar.dispose();
/// # title.dispose();
/// ```
pub trait Runner {
    /// Execute the computation. Signal and memo reads made here subscribe
    /// the effect. An `Err` is routed to the scope's error hook; it does
    /// not detach the effect or stop the current flush.
    fn run(&mut self) -> Result<(), BoxError>;

    /// Release resources held for the effect's whole lifetime. Called
    /// once on disposal, after the registered cleanup callbacks.
    fn cleanup(&mut self) {}
}

impl<F: FnMut()> Runner for F {
    fn run(&mut self) -> Result<(), BoxError> {
        self();
        Ok(())
    }
}

/// Handle to a side-effecting computation registered with a scope.
///
/// Created through
/// [`Scope::create_effect`](super::Scope::create_effect), which also
/// performs the first run. Cloned handles address the same effect.
pub struct Effect {
    scope: Rc<ScopeInner>,
    id: EffectId,
}

impl Effect {
    pub(crate) fn new<R>(scope: Rc<ScopeInner>, runner: R) -> Self
    where
        R: Runner + 'static,
    {
        let runner: Rc<RefCell<dyn Runner>> = Rc::new(RefCell::new(runner));
        let id = scope.effects.borrow_mut().insert(EffectSlot::new(runner));
        scope.record_effect(id);
        trace!(?id, "created effect");

        // First run happens synchronously, establishing the initial
        // source list. Writes it makes are queued and drained right
        // after, not re-entered.
        run_effect(&scope, id);
        super::scope::maybe_flush(&scope);

        Self { scope, id }
    }

    /// Get the effect's ID within its scope.
    pub fn id(&self) -> EffectId {
        self.id
    }

    /// Dispose of the effect: drop its subscriptions, run its pending
    /// cleanup callbacks, and release its slot. Idempotent, and safe to
    /// call from within the effect's own run.
    pub fn dispose(&self) {
        dispose_effect(&self.scope, self.id);
    }

    pub fn is_disposed(&self) -> bool {
        !self.scope.effects.borrow().contains_key(self.id)
    }
}

impl Clone for Effect {
    fn clone(&self) -> Self {
        Self {
            scope: Rc::clone(&self.scope),
            id: self.id,
        }
    }
}

impl Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Pops the observer stack even if the run unwinds, so a panicking
/// effect cannot misattribute later subscriptions.
struct ObserverFrame<'a>(&'a ScopeInner);

impl Drop for ObserverFrame<'_> {
    fn drop(&mut self) {
        self.0.observers.borrow_mut().pop();
    }
}

/// Marks an effect run in progress for the scheduler, so writes made
/// during the run are queued instead of drained re-entrantly.
struct RunMarker<'a>(&'a ScopeInner);

impl Drop for RunMarker<'_> {
    fn drop(&mut self) {
        self.0.scheduler.exit_run();
    }
}

/// Run one effect. The sequence the whole engine hangs off:
///
/// 1. Drain the cleanup callbacks registered during the previous run,
///    last registered first.
/// 2. Reset the read accumulator; the previous source list stays put for
///    the diff in step 5.
/// 3. Push the effect onto the observer stack and invoke the runner.
///    Every signal read lands in the accumulator and in that signal's
///    subscriber set.
/// 4. Pop the observer stack (guarded; unwinding included).
/// 5. Unsubscribe from every signal read last run but not this run, then
///    commit the accumulator as the new source list.
/// 6. Route a run error to the scope's error hook.
pub(crate) fn run_effect(scope: &ScopeInner, id: EffectId) {
    scope.scheduler.enter_run();
    let _running = RunMarker(scope);

    let (runner, cleanups) = {
        let mut effects = scope.effects.borrow_mut();
        let Some(slot) = effects.get_mut(id) else {
            // Disposed between enqueue and drain.
            return;
        };
        slot.reading.clear();
        (Rc::clone(&slot.runner), std::mem::take(&mut slot.cleanups))
    };
    trace!(?id, cleanups = cleanups.len(), "running effect");

    for cleanup in cleanups.into_iter().rev() {
        cleanup();
    }

    scope.observers.borrow_mut().push(id);
    let result = {
        let _frame = ObserverFrame(scope);
        runner.borrow_mut().run()
    };

    // Shrink subscriber sets for sources not read this run. An effect
    // that disposed itself mid-run has no slot left and nothing to diff.
    let stale: Vec<SignalId> = {
        let mut effects = scope.effects.borrow_mut();
        match effects.get_mut(id) {
            Some(slot) => {
                let old = std::mem::replace(
                    &mut slot.sources,
                    std::mem::take(&mut slot.reading),
                );
                old.into_iter()
                    .filter(|source| !slot.sources.contains(source))
                    .collect()
            }
            None => Vec::new(),
        }
    };
    if !stale.is_empty() {
        trace!(?id, dropped = stale.len(), "pruning stale sources");
        let mut signals = scope.signals.borrow_mut();
        for source in stale {
            if let Some(slot) = signals.get_mut(source) {
                slot.subscribers.shift_remove(&id);
            }
        }
    }

    if let Err(err) = result {
        scope.report(&ReactiveError::EffectFailed(err));
    }
}

pub(crate) fn dispose_effect(scope: &ScopeInner, id: EffectId) {
    let Some(mut slot) = scope.effects.borrow_mut().remove(id) else {
        return;
    };
    scope.scheduler.cancel(id);

    {
        let mut signals = scope.signals.borrow_mut();
        for source in slot.sources.drain(..) {
            if let Some(signal) = signals.get_mut(source) {
                signal.subscribers.shift_remove(&id);
            }
        }
        // Reads already made by a self-disposing run.
        for source in slot.reading.drain(..) {
            if let Some(signal) = signals.get_mut(source) {
                signal.subscribers.shift_remove(&id);
            }
        }
    }

    for cleanup in slot.cleanups.drain(..).rev() {
        cleanup();
    }

    // Skipped when the effect disposes itself mid-run: the frame still
    // executing holds the runner borrow, and its resources are live.
    if let Ok(mut runner) = slot.runner.try_borrow_mut() {
        runner.cleanup();
    }
    trace!(?id, "disposed effect");
}
