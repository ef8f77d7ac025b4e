//! Graph Nodes
//!
//! Storage slots for the dependency graph. Signals and effects live in
//! slot-map arenas owned by their scope, and the rest of the crate refers
//! to them through the small generational keys defined here. A disposed
//! node leaves behind an invalidated key rather than a dangling pointer,
//! so use-after-dispose is detected instead of undefined.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexSet;
use smallvec::SmallVec;

use crate::reactive::Runner;

slotmap::new_key_type! {
    /// Unique ID assigned to a signal.
    pub struct SignalId;

    /// Unique ID assigned to an effect.
    pub struct EffectId;
}

/// Type-erased equality predicate over a signal's value type.
pub(crate) type EqFn = Rc<dyn Fn(&dyn Any, &dyn Any) -> bool>;

/// Signals read during one effect run. Most effects read a handful, so
/// the list stays inline.
pub(crate) type SourceList = SmallVec<[SignalId; 4]>;

/// Arena slot for one signal.
pub(crate) struct SignalSlot {
    /// The current value. Kept behind its own `Rc<RefCell>` so reads and
    /// the equality predicate can run without holding the arena borrow.
    pub value: Rc<RefCell<dyn Any>>,

    /// Optional equality predicate. When present, a write that compares
    /// equal to the stored value is suppressed entirely.
    pub equals: Option<EqFn>,

    /// Effects subscribed to this signal, in subscription order. An
    /// effect appears at most once.
    pub subscribers: IndexSet<EffectId>,
}

impl SignalSlot {
    pub fn new(value: Rc<RefCell<dyn Any>>, equals: Option<EqFn>) -> Self {
        Self {
            value,
            equals,
            subscribers: IndexSet::new(),
        }
    }
}

/// Arena slot for one effect.
pub(crate) struct EffectSlot {
    /// The user computation. Behind `Rc<RefCell>` so the scope can invoke
    /// it after releasing the arena borrow; the run is free to create and
    /// dispose other nodes.
    pub runner: Rc<RefCell<dyn Runner>>,

    /// Signals read during the last completed run.
    pub sources: SourceList,

    /// Accumulator for signals read during the run in progress.
    pub reading: SourceList,

    /// Cleanup callbacks registered during the current run. Drained in
    /// reverse registration order before the next run and on disposal.
    pub cleanups: Vec<Box<dyn FnOnce()>>,
}

impl EffectSlot {
    pub fn new(runner: Rc<RefCell<dyn Runner>>) -> Self {
        Self {
            runner,
            sources: SourceList::new(),
            reading: SourceList::new(),
            cleanups: Vec::new(),
        }
    }
}
