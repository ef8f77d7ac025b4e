//! Update Scheduler
//!
//! Pending-queue and flush bookkeeping for one scope.
//!
//! The queue is an insertion-ordered set: an effect enqueued twice in the
//! same wave runs once, which is what collapses diamond-shaped updates
//! into a single downstream run. Draining is FIFO in first-became-dirty
//! order rather than topological order, so an effect whose sources sit at
//! different depths of the graph can observe a partially settled wave.
//! That trade-off is documented on [`crate::reactive::Scope::batch`] and
//! in the crate docs.
//!
//! The scheduler itself never invokes user code; it is pure state. The
//! drain loop lives with the scope, which owns the arenas the drain has
//! to touch.

use std::cell::{Cell, RefCell};

use indexmap::IndexSet;

use super::node::EffectId;

/// Upper bound on effect runs in a single flush. A drain that exceeds it
/// is treated as an update cycle: the remaining queue is discarded and a
/// cycle error is reported through the scope's error hook.
pub const MAX_FLUSH_STEPS: usize = 10_000;

/// Per-scope scheduling state: the deduplicated pending queue, the batch
/// depth, the flush flag, and the count of effect runs in progress.
pub(crate) struct Scheduler {
    queue: RefCell<IndexSet<EffectId>>,
    batch_depth: Cell<usize>,
    flushing: Cell<bool>,
    running: Cell<usize>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            queue: RefCell::new(IndexSet::new()),
            batch_depth: Cell::new(0),
            flushing: Cell::new(false),
            running: Cell::new(0),
        }
    }

    /// Add an effect to the pending queue. Returns false if it was
    /// already queued.
    pub fn enqueue(&self, id: EffectId) -> bool {
        self.queue.borrow_mut().insert(id)
    }

    /// Pop the oldest pending effect.
    pub fn pop_front(&self) -> Option<EffectId> {
        self.queue.borrow_mut().shift_remove_index(0)
    }

    /// Drop a disposed effect from the queue, keeping the order of the
    /// rest.
    pub fn cancel(&self, id: EffectId) {
        self.queue.borrow_mut().shift_remove(&id);
    }

    /// Discard everything still pending. Used when a flush aborts on the
    /// cycle guard.
    pub fn clear(&self) {
        self.queue.borrow_mut().clear();
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn enter_batch(&self) {
        self.batch_depth.set(self.batch_depth.get() + 1);
    }

    pub fn exit_batch(&self) {
        self.batch_depth.set(self.batch_depth.get() - 1);
    }

    pub fn in_batch(&self) -> bool {
        self.batch_depth.get() > 0
    }

    /// Mark a flush as in progress. Returns false if one already is; the
    /// caller must not start a nested drain.
    pub fn begin_flush(&self) -> bool {
        if self.flushing.get() {
            return false;
        }
        self.flushing.set(true);
        true
    }

    pub fn end_flush(&self) {
        self.flushing.set(false);
    }

    pub fn is_flushing(&self) -> bool {
        self.flushing.get()
    }

    pub fn enter_run(&self) {
        self.running.set(self.running.get() + 1);
    }

    pub fn exit_run(&self) {
        self.running.set(self.running.get() - 1);
    }

    /// True while any effect run is on the call stack. Writes made during
    /// a run are queued, never drained re-entrantly.
    pub fn in_run(&self) -> bool {
        self.running.get() > 0
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
