//! Error types surfaced through a scope's error hook.

use thiserror::Error;

/// Boxed error returned by a fallible [`Runner`](crate::reactive::Runner).
pub type BoxError = Box<dyn std::error::Error>;

/// Errors reported by the reactive engine.
///
/// Neither variant unwinds out of a flush: a failed effect leaves the rest
/// of the wave running, and a detected cycle only discards the wave that
/// produced it. Install a hook with
/// [`Scope::set_error_hook`](crate::reactive::Scope::set_error_hook) to
/// observe them; the default hook logs through `tracing`.
#[derive(Debug, Error)]
pub enum ReactiveError {
    /// An effect's run procedure returned an error. The effect keeps its
    /// subscriptions and will run again the next time a source changes.
    #[error("effect run failed: {0}")]
    EffectFailed(BoxError),

    /// A flush exceeded the bounded iteration guard, which means some
    /// effect writes a signal it also depends on, directly or through a
    /// chain of other effects.
    #[error("update cycle detected: flush exceeded {limit} effect runs")]
    CycleDetected {
        /// The iteration bound that was exceeded.
        limit: usize,
    },
}
