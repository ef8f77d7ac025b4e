//! Weft Core
//!
//! This crate provides the core reactive runtime for the Weft terminal UI
//! framework. It implements:
//!
//! - Reactive primitives (signals, memos, effects)
//! - Automatic dependency tracking with stale-subscription pruning
//! - Batched, deduplicated update scheduling with cycle containment
//!
//! The crate knows nothing about terminals, layout, or rendering. Outer
//! layers consume it through "create a signal", "read or write a
//! signal", "register an effect", and "dispose"; a renderer integrates
//! by wrapping its top-level draw call in a single effect, which then
//! re-runs exactly when something it displayed has changed.
//!
//! # Architecture
//!
//! The crate is organized into two modules:
//!
//! - `reactive`: the public primitives and the scope that owns all
//!   shared state
//! - `graph`: arena storage and scheduler state for the dependency graph
//!
//! Everything hangs off a [`Scope`]. Scopes are single-threaded and
//! fully independent; creating several (one per test, say) is cheap and
//! safe.
//!
//! # Example
//!
//! ```
//! use weft_core::Scope;
//!
//! let scope = Scope::new();
//! let count = scope.create_signal(0);
//!
//! let doubled = scope.create_memo({
//!     let count = count.clone();
//!     move || count.get() * 2
//! });
//!
//! let printer = scope.create_effect({
//!     let doubled = doubled.clone();
//!     move || println!("doubled is {}", doubled.get())
//! });
//!
//! count.set(5); // printer re-runs, printing "doubled is 10"
//! # printer.dispose();
//! # doubled.dispose();
//! # count.dispose();
//! ```
//!
//! # Scheduling
//!
//! Updates run in first-became-dirty (FIFO) order with duplicate
//! suppression: however many of an effect's sources change in one wave,
//! it runs once. The order is not topological, so an effect whose
//! sources sit at different depths of the graph can briefly observe a
//! partially settled wave; wrap multi-signal updates in
//! [`Scope::batch`] when that matters. A bounded iteration guard turns
//! runaway propagation (an effect writing a signal it also reads) into a
//! reported error instead of a hang.

#![forbid(unsafe_code)]

pub mod error;
pub mod graph;
pub mod reactive;

pub use error::{BoxError, ReactiveError};
pub use graph::{EffectId, SignalId, MAX_FLUSH_STEPS};
pub use reactive::{Effect, Memo, Root, Runner, Scope, Signal};
