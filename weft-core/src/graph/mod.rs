//! Dependency Graph
//!
//! Storage and scheduling state for the reactive dependency graph.
//!
//! # Overview
//!
//! The graph is bidirectional: each signal slot records the effects
//! subscribed to it, and each effect slot records the signals it read on
//! its last run. Edges are discovered at execution time (a read inside a
//! running effect adds one) and shrunk after every run (a source not read
//! again is dropped), so the graph always mirrors the most recent runs.
//!
//! # Design Decisions
//!
//! 1. Nodes live in slot-map arenas owned by the scope and reference each
//!    other through generational keys, never through pointers. The
//!    signal/effect relationship is cyclic by nature; keys make disposal
//!    of either side safe without reference-counting cycles.
//!
//! 2. The pending queue is an insertion-ordered set, which gives FIFO
//!    scheduling with duplicate suppression in one structure.

mod node;
mod scheduler;

pub use node::{EffectId, SignalId};
pub use scheduler::MAX_FLUSH_STEPS;

pub(crate) use node::{EffectSlot, EqFn, SignalSlot};
pub(crate) use scheduler::Scheduler;
