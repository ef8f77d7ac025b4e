//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which effects depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read while an effect is running, the signal
//!    registers that effect as a subscriber. Subscription is idempotent;
//!    re-reading adds nothing.
//!
//! 2. When the value changes, every subscriber is enqueued with the
//!    scope's scheduler. Outside a batch the queue drains immediately.
//!
//! 3. A signal created with an equality predicate drops writes whose
//!    value compares equal to the current one before any of that
//!    happens, so redundant writes propagate nowhere.
//!
//! # Storage
//!
//! The handle is a generational key into the scope's signal arena plus a
//! reference to the scope itself. Cloning a handle clones neither value
//! nor subscribers; both clones address the same slot. The value sits
//! behind its own `Rc<RefCell>` so user code (clone, equality predicate)
//! never runs while the arena is borrowed.

use std::any::Any;
use std::cell::RefCell;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::rc::Rc;

use tracing::trace;

use crate::graph::{EqFn, SignalId};

use super::effect::Effect;
use super::scope::{maybe_flush, ScopeInner};

/// A reactive signal holding a value of type `T`.
///
/// Created through [`Scope::create_signal`](super::Scope::create_signal)
/// or [`Scope::create_signal_with`](super::Scope::create_signal_with).
/// Reads and writes after [`dispose`](Signal::dispose) are usage errors
/// and panic.
pub struct Signal<T: 'static> {
    scope: Rc<ScopeInner>,
    id: SignalId,
    ty: PhantomData<T>,
}

impl<T: 'static> Signal<T> {
    pub(crate) fn new(scope: Rc<ScopeInner>, value: T, equals: Option<EqFn>) -> Self {
        let value: Rc<RefCell<dyn Any>> = Rc::new(RefCell::new(value));
        let id = scope
            .signals
            .borrow_mut()
            .insert(crate::graph::SignalSlot::new(value, equals));
        scope.record_signal(id);
        trace!(?id, "created signal");
        Self {
            scope,
            id,
            ty: PhantomData,
        }
    }

    /// Wrap a typed equality predicate for storage in the type-erased
    /// slot.
    pub(crate) fn erase_eq<F>(equals: F) -> EqFn
    where
        F: Fn(&T, &T) -> bool + 'static,
    {
        Rc::new(move |a: &dyn Any, b: &dyn Any| {
            match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
                (Some(a), Some(b)) => equals(a, b),
                _ => false,
            }
        })
    }

    /// Get the signal's ID within its scope.
    pub fn id(&self) -> SignalId {
        self.id
    }

    /// Set a new value and notify subscribers.
    ///
    /// With an equality predicate configured, a write equal to the
    /// current value returns without storing or notifying anything.
    pub fn set(&self, value: T) {
        let (slot_value, equals) = {
            let signals = self.scope.signals.borrow();
            let slot = signals.get(self.id).expect("signal used after dispose");
            (Rc::clone(&slot.value), slot.equals.clone())
        };

        if let Some(equals) = equals {
            let current = slot_value.borrow();
            if equals(&*current, &value) {
                trace!(id = ?self.id, "write suppressed by equality predicate");
                return;
            }
        }

        *slot_value
            .borrow_mut()
            .downcast_mut::<T>()
            .expect("signal value type") = value;

        let mut queued = 0usize;
        {
            let signals = self.scope.signals.borrow();
            if let Some(slot) = signals.get(self.id) {
                for &subscriber in slot.subscribers.iter() {
                    if self.scope.scheduler.enqueue(subscriber) {
                        queued += 1;
                    }
                }
            }
        }
        trace!(id = ?self.id, queued, "signal written");

        maybe_flush(&self.scope);
    }

    /// Dispose of the signal, releasing its slot. No-op if already
    /// disposed through a root.
    ///
    /// # Panics
    ///
    /// Panics while any live effect is still subscribed; dependents must
    /// be disposed (or re-run without reading this signal) first.
    pub fn dispose(&self) {
        dispose_signal(&self.scope, self.id);
    }

    /// Number of effects currently subscribed. Zero once disposed.
    pub fn subscriber_count(&self) -> usize {
        self.scope
            .signals
            .borrow()
            .get(self.id)
            .map(|slot| slot.subscribers.len())
            .unwrap_or(0)
    }

    /// Whether `effect` is subscribed to this signal.
    pub fn is_observed_by(&self, effect: &Effect) -> bool {
        self.scope
            .signals
            .borrow()
            .get(self.id)
            .map(|slot| slot.subscribers.contains(&effect.id()))
            .unwrap_or(false)
    }

    /// Register the running effect, if any, as a subscriber, and record
    /// this signal in that effect's read accumulator.
    fn track(&self) {
        let Some(observer) = self.scope.observers.borrow().last().copied() else {
            return;
        };

        {
            let mut effects = self.scope.effects.borrow_mut();
            // A missing slot means the effect disposed itself earlier in
            // this run; its reads must not subscribe anything.
            let Some(slot) = effects.get_mut(observer) else {
                return;
            };
            if !slot.reading.contains(&self.id) {
                slot.reading.push(self.id);
            }
        }

        self.scope
            .signals
            .borrow_mut()
            .get_mut(self.id)
            .expect("signal used after dispose")
            .subscribers
            .insert(observer);
    }

    fn value_rc(&self) -> Rc<RefCell<dyn Any>> {
        let signals = self.scope.signals.borrow();
        let slot = signals.get(self.id).expect("signal used after dispose");
        Rc::clone(&slot.value)
    }
}

impl<T: Clone + 'static> Signal<T> {
    /// Get the current value.
    ///
    /// Called while an effect is running, this subscribes the effect; it
    /// will re-run when the signal changes. Outside any effect the read
    /// has no side effect.
    pub fn get(&self) -> T {
        self.track();
        let value = self.value_rc();
        let value = value.borrow();
        value.downcast_ref::<T>().expect("signal value type").clone()
    }

    /// Get the current value without establishing a dependency.
    pub fn get_untracked(&self) -> T {
        let value = self.value_rc();
        let value = value.borrow();
        value.downcast_ref::<T>().expect("signal value type").clone()
    }

    /// Update the value with a function of the current value. The read
    /// does not track; only the resulting write propagates.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = f(&self.get_untracked());
        self.set(next);
    }
}

pub(crate) fn dispose_signal(scope: &ScopeInner, id: SignalId) {
    let live = {
        let mut signals = scope.signals.borrow_mut();
        let Some(slot) = signals.get_mut(id) else {
            return;
        };
        // Ignore leftovers from effects that disposed themselves mid-run;
        // only subscriptions of live effects make disposal an error.
        let effects = scope.effects.borrow();
        slot.subscribers.retain(|e| effects.contains_key(*e));
        slot.subscribers.len()
    };
    assert!(
        live == 0,
        "signal disposed while still observed by {live} effect(s)"
    );

    scope.signals.borrow_mut().remove(id);
    trace!(?id, "disposed signal");
}

impl<T: 'static> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            scope: Rc::clone(&self.scope),
            id: self.id,
            ty: PhantomData,
        }
    }
}

impl<T: Clone + Debug + 'static> Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id)
            .field("value", &self.get_untracked())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::super::Scope;

    #[test]
    fn signal_get_and_set() {
        let scope = Scope::new();
        let signal = scope.create_signal(0);
        assert_eq!(signal.get(), 0);

        signal.set(42);
        assert_eq!(signal.get(), 42);
    }

    #[test]
    fn signal_update() {
        let scope = Scope::new();
        let signal = scope.create_signal(10);
        signal.update(|v| v + 5);
        assert_eq!(signal.get(), 15);
    }

    #[test]
    fn signal_clone_shares_state() {
        let scope = Scope::new();
        let signal1 = scope.create_signal(0);
        let signal2 = signal1.clone();

        signal1.set(42);
        assert_eq!(signal2.get(), 42);

        signal2.set(100);
        assert_eq!(signal1.get(), 100);
    }

    #[test]
    fn equality_predicate_suppresses_redundant_writes() {
        let scope = Scope::new();
        let signal = scope.create_signal_with(0, |a: &i32, b: &i32| a == b);

        let runs = Rc::new(Cell::new(0));
        let _eff = scope.create_effect({
            let runs = runs.clone();
            let signal = signal.clone();
            move || {
                signal.get();
                runs.set(runs.get() + 1);
            }
        });
        assert_eq!(runs.get(), 1);

        signal.set(5);
        assert_eq!(runs.get(), 2);

        // Equal writes go nowhere.
        signal.set(5);
        signal.set(5);
        assert_eq!(runs.get(), 2);
        assert_eq!(signal.get(), 5);

        signal.set(6);
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn reads_outside_effects_do_not_subscribe() {
        let scope = Scope::new();
        let signal = scope.create_signal(1);

        signal.get();
        signal.get_untracked();
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn subscriber_count_tracks_subscriptions() {
        let scope = Scope::new();
        let signal = scope.create_signal(0);

        let eff = scope.create_effect({
            let signal = signal.clone();
            move || {
                signal.get();
            }
        });
        assert_eq!(signal.subscriber_count(), 1);
        assert!(signal.is_observed_by(&eff));

        eff.dispose();
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    #[should_panic(expected = "signal used after dispose")]
    fn read_after_dispose_panics() {
        let scope = Scope::new();
        let signal = scope.create_signal(0);
        signal.dispose();
        signal.get();
    }

    #[test]
    #[should_panic(expected = "signal used after dispose")]
    fn write_after_dispose_panics() {
        let scope = Scope::new();
        let signal = scope.create_signal(0);
        signal.dispose();
        signal.set(1);
    }

    #[test]
    #[should_panic(expected = "still observed")]
    fn dispose_with_live_subscriber_panics() {
        let scope = Scope::new();
        let signal = scope.create_signal(0);
        let _eff = scope.create_effect({
            let signal = signal.clone();
            move || {
                signal.get();
            }
        });
        signal.dispose();
    }
}
