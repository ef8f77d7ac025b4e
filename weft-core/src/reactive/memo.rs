//! Memo Implementation
//!
//! A Memo is a cached derived value: one internal signal holds the cache
//! and one internal effect recomputes it whenever a dependency changes.
//!
//! The cache signal carries an equality predicate, so a recomputation
//! that lands on the same value writes nothing and wakes nobody. That is
//! what makes memos worth interposing: ten effects reading a memo of an
//! expensive computation re-run only when the result actually moved, not
//! every time an input wiggled.
//!
//! Reading a memo behaves exactly like reading a signal, including
//! subscription of whichever effect is currently running.

use std::fmt::Debug;

use super::effect::Effect;
use super::scope::Scope;
use super::signal::Signal;

/// A cached derived value that recomputes when its dependencies change.
///
/// Created through [`Scope::create_memo`]. Cloned handles address the
/// same cache.
pub struct Memo<T: 'static> {
    cache: Signal<Option<T>>,
    effect: Effect,
}

impl<T> Memo<T>
where
    T: Clone + PartialEq + 'static,
{
    pub(crate) fn new<F>(scope: &Scope, mut compute: F) -> Self
    where
        F: FnMut() -> T + 'static,
    {
        // The cache starts unset; the effect's first, synchronous run
        // fills it before `new` returns. The old cached value is dropped
        // only after the new one is stored.
        let cache =
            scope.create_signal_with(None::<T>, |a: &Option<T>, b: &Option<T>| a == b);
        let effect = scope.create_effect({
            let cache = cache.clone();
            move || cache.set(Some(compute()))
        });
        Self { cache, effect }
    }
}

impl<T: Clone + 'static> Memo<T> {
    /// Get the cached value, recomputed on dependency changes. Subscribes
    /// the running effect, if any, the same way a signal read does.
    pub fn get(&self) -> T {
        self.cache.get().expect("memo cache is filled at creation")
    }

    /// Get the cached value without establishing a dependency.
    pub fn get_untracked(&self) -> T {
        self.cache
            .get_untracked()
            .expect("memo cache is filled at creation")
    }
}

impl<T: 'static> Memo<T> {
    /// Number of effects currently subscribed to the cache.
    pub fn subscriber_count(&self) -> usize {
        self.cache.subscriber_count()
    }

    /// Dispose of the memo: the recompute effect first, then the cache
    /// signal.
    ///
    /// # Panics
    ///
    /// Panics while other live effects still read the memo, like
    /// [`Signal::dispose`].
    pub fn dispose(&self) {
        self.effect.dispose();
        self.cache.dispose();
    }
}

impl<T: 'static> Clone for Memo<T> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            effect: self.effect.clone(),
        }
    }
}

impl<T: Clone + Debug + 'static> Debug for Memo<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo")
            .field("value", &self.get_untracked())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
