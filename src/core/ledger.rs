//! Registry of in-flight optimistic operations and replayable failures.

use hashbrown::HashMap;

use crate::{core::store::EntityState, types::OpId};

/// Default capacity of the failed-operation buffer.
pub const DEFAULT_FAILED_CAPACITY: usize = 32;

/// An operation that has been applied optimistically and is awaiting its
/// confirmation outcome.
///
/// The full typed mutation payload is retained so a failed operation can be
/// replayed later; `prior_future` is the redo branch that the optimistic
/// history push discarded, kept so rollback can restore it exactly.
#[derive(Debug, Clone)]
pub struct PendingOperation<S: EntityState> {
    /// Operation identifier.
    pub op_id: OpId,
    /// Short verb phrase naming the mutation, used in error strings.
    pub label: &'static str,
    /// The mutation payload as originally applied.
    pub mutation: S::Mutation,
    /// Redo branch displaced by the optimistic history push.
    pub prior_future: Vec<S>,
}

/// A rolled-back operation retained for replay via retry.
#[derive(Debug, Clone)]
pub struct FailedOperation<S: EntityState> {
    /// Operation identifier under which the mutation originally ran.
    pub op_id: OpId,
    /// Short verb phrase naming the mutation.
    pub label: &'static str,
    /// The mutation payload, kept so retry can replay it.
    pub mutation: S::Mutation,
    /// Human-readable failure message that was surfaced to the store.
    pub error: String,
}

/// Insertion-ordered map from operation id to pending operation, plus a
/// bounded buffer of failures kept for replay.
///
/// All insertion and removal goes through the explicit methods here; no
/// other component mutates ledger state.
#[derive(Debug)]
pub struct OperationLedger<S: EntityState> {
    entries: HashMap<OpId, PendingOperation<S>>,
    order: Vec<OpId>,
    failed: Vec<FailedOperation<S>>,
    failed_capacity: usize,
}

impl<S: EntityState> Default for OperationLedger<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: EntityState> OperationLedger<S> {
    /// Creates an empty ledger with the default failed-buffer capacity.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
            failed: Vec::new(),
            failed_capacity: DEFAULT_FAILED_CAPACITY,
        }
    }

    /// Registers a pending operation.
    pub fn insert(&mut self, op: PendingOperation<S>) {
        self.order.push(op.op_id);
        self.entries.insert(op.op_id, op);
    }

    /// Removes and returns a pending operation by id.
    pub fn remove(&mut self, op_id: OpId) -> Option<PendingOperation<S>> {
        let op = self.entries.remove(&op_id)?;
        if let Some(pos) = self.order.iter().position(|id| *id == op_id) {
            self.order.remove(pos);
        }
        Some(op)
    }

    /// Looks up a pending operation by id.
    pub fn get(&self, op_id: OpId) -> Option<&PendingOperation<S>> {
        self.entries.get(&op_id)
    }

    /// True when no operation is in flight.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of in-flight operations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// In-flight operation ids in insertion order.
    pub fn ordered_ids(&self) -> &[OpId] {
        &self.order
    }

    /// Records a rolled-back operation for later replay, evicting the oldest
    /// record when the buffer is full.
    pub fn record_failure(&mut self, failed: FailedOperation<S>) {
        self.failed.push(failed);
        if self.failed.len() > self.failed_capacity {
            self.failed.remove(0);
        }
    }

    /// Removes and returns a failure record by its original operation id.
    pub fn take_failed(&mut self, op_id: OpId) -> Option<FailedOperation<S>> {
        let pos = self.failed.iter().position(|f| f.op_id == op_id)?;
        Some(self.failed.remove(pos))
    }

    /// Failure records currently available for replay, oldest first.
    pub fn failed(&self) -> &[FailedOperation<S>] {
        &self.failed
    }
}
