//! Reactive Primitives
//!
//! This module implements the reactive system: scopes, signals, memos,
//! and effects. These primitives form the foundation of Weft's
//! fine-grained reactivity.
//!
//! # Concepts
//!
//! ## Scopes
//!
//! A [`Scope`] owns all shared reactive state. Every primitive is created
//! through one, and scopes are fully independent of each other.
//!
//! ## Signals
//!
//! A [`Signal`] is a container for mutable state. Reading it inside a
//! running effect registers that effect as a dependent; writing it
//! re-runs the dependents. An optional equality predicate suppresses
//! writes that change nothing.
//!
//! ## Effects
//!
//! An [`Effect`] is a side-effecting computation that re-runs whenever a
//! signal it read during its latest run changes. Effects synchronize
//! reactive state with the outside world: drawing to the terminal,
//! logging, writing files.
//!
//! ## Memos
//!
//! A [`Memo`] is a derived value cached in its own signal and recomputed
//! by its own effect. Downstream effects wake only when the derived
//! value actually changes.
//!
//! # Implementation Notes
//!
//! Dependencies are discovered at execution time through the scope's
//! observer stack: while an effect runs, its ID is on top, and every
//! signal read attributes itself to it. Each run rebuilds the effect's
//! source list from scratch and unsubscribes whatever was not read
//! again, which is how conditional dependencies stop notifying. This
//! approach (sometimes called "automatic dependency tracking") is the
//! one used by SolidJS, Vue, and Leptos.

mod effect;
mod memo;
mod scope;
mod signal;

pub use effect::{Effect, Runner};
pub use memo::Memo;
pub use scope::{Root, Scope};
pub use signal::Signal;
