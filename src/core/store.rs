//! Generic optimistic entity store: mutation lifecycle, undo/redo, rollback.

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::{
    core::{
        history::History,
        ledger::{FailedOperation, OperationLedger, PendingOperation},
    },
    types::OpId,
};

/// Effect of applying a mutation to a state value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyEffect {
    /// The state changed.
    Changed,
    /// The mutation had no effect; the reason is a short static label.
    Noop(&'static str),
}

/// Seam between the generic engine and a concrete store instance.
///
/// A state type owns its collections, knows how to apply its typed mutations
/// as a pure in-memory transform, and names them for logs and error strings.
pub trait EntityState:
    Clone + PartialEq + Default + Send + Serialize + DeserializeOwned + 'static
{
    /// Typed mutation payload for this store instance.
    type Mutation: Clone + Send + std::fmt::Debug + 'static;

    /// Durable storage key for this store instance. No two instances share
    /// a key.
    const STORAGE_KEY: &'static str;

    /// Applies `mutation` in place. Must perform no I/O. Mutations whose
    /// target id does not exist (and guarded duplicates) report
    /// [`ApplyEffect::Noop`] rather than erroring.
    fn apply(&mut self, mutation: &Self::Mutation) -> ApplyEffect;

    /// Short verb phrase naming the mutation, e.g. `"add task"`.
    fn label(mutation: &Self::Mutation) -> &'static str;
}

/// Errors from the synchronous store engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No pending operation with this id exists in the ledger.
    #[error("operation {0} is not pending")]
    UnknownOperation(OpId),
    /// No failure record with this id is available for replay.
    #[error("operation {0} has no failure record to retry")]
    NothingToRetry(OpId),
}

/// Result of starting a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginOutcome {
    /// The mutation was applied optimistically and awaits confirmation.
    Applied(OpId),
    /// The mutation had no effect and was skipped entirely.
    Noop(&'static str),
}

impl BeginOutcome {
    /// Operation id when the mutation was applied.
    pub fn op_id(&self) -> Option<OpId> {
        match self {
            Self::Applied(op_id) => Some(*op_id),
            Self::Noop(_) => None,
        }
    }
}

/// The orchestrating store: current collections, history stack, and
/// operation ledger, driven through the optimistic mutation lifecycle.
///
/// The visible state is `history.present`; there is no second copy. All
/// methods are synchronous; the async confirmation step between
/// [`begin`](Self::begin) and [`commit`](Self::commit)/[`fail`](Self::fail)
/// is driven externally (see [`crate::runtime`]).
///
/// `fail` reverts the most recent optimistic push, so operations must reach
/// their terminal disposition in LIFO order relative to `begin` calls. The
/// runtime guarantees this by serializing mutations per store: at most one
/// operation is awaiting confirmation at a time.
#[derive(Debug)]
pub struct EntityStore<S: EntityState> {
    history: History<S>,
    ledger: OperationLedger<S>,
    is_loading: bool,
    error: Option<String>,
}

impl<S: EntityState> Default for EntityStore<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: EntityState> EntityStore<S> {
    /// Creates a store with default (empty) state.
    pub fn new() -> Self {
        Self::hydrate(S::default())
    }

    /// Creates a store around previously persisted state.
    ///
    /// History and ledger start empty, `is_loading` false, `error` unset.
    pub fn hydrate(state: S) -> Self {
        Self {
            history: History::new(state),
            ledger: OperationLedger::new(),
            is_loading: false,
            error: None,
        }
    }

    /// Creates a store around persisted state with a capped history depth.
    pub fn with_history_limit(state: S, limit: usize) -> Self {
        Self {
            history: History::with_limit(state, limit),
            ..Self::new()
        }
    }

    /// Current visible state.
    pub fn state(&self) -> &S {
        self.history.present()
    }

    /// True while at least one operation awaits confirmation.
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Human-readable message from the most recent failed mutation.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Clears the error message.
    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// True when an undo step is available.
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// True when a redo step is available.
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Pending operations in insertion order.
    pub fn pending_ids(&self) -> &[OpId] {
        self.ledger.ordered_ids()
    }

    /// Looks up a pending operation.
    pub fn pending(&self, op_id: OpId) -> Option<&PendingOperation<S>> {
        self.ledger.get(op_id)
    }

    /// Failure records available for replay, oldest first.
    pub fn failed_operations(&self) -> &[FailedOperation<S>] {
        self.ledger.failed()
    }

    /// Starts a mutation: applies it optimistically, pushes a history
    /// snapshot, and registers a ledger entry awaiting confirmation.
    ///
    /// A mutation with no effect (missing target id, guarded duplicate) is
    /// skipped before any optimistic step: no history push, no ledger entry,
    /// and the error field is left untouched.
    pub fn begin(&mut self, mutation: S::Mutation) -> BeginOutcome {
        let label = S::label(&mutation);
        let mut next = self.state().clone();
        match next.apply(&mutation) {
            ApplyEffect::Noop(reason) => {
                tracing::warn!(operation = label, reason, "mutation had no effect; skipping");
                BeginOutcome::Noop(reason)
            }
            ApplyEffect::Changed => {
                let op_id = OpId::fresh();
                let prior_future = self.history.push(next);
                self.ledger.insert(PendingOperation {
                    op_id,
                    label,
                    mutation,
                    prior_future,
                });
                self.is_loading = true;
                self.error = None;
                tracing::debug!(operation = label, %op_id, "applied optimistically");
                BeginOutcome::Applied(op_id)
            }
        }
    }

    /// Confirms a pending operation: the ledger entry is dropped and the
    /// optimistic state stands.
    pub fn commit(&mut self, op_id: OpId) -> Result<(), StoreError> {
        let op = self
            .ledger
            .remove(op_id)
            .ok_or(StoreError::UnknownOperation(op_id))?;
        self.is_loading = !self.ledger.is_empty();
        tracing::debug!(operation = op.label, %op_id, "committed");
        Ok(())
    }

    /// Rolls back a pending operation after its confirmation failed.
    ///
    /// Restores the collection and history to their exact pre-mutation
    /// values, surfaces a mutation-specific error string, and moves the
    /// ledger entry to the failure buffer for later replay.
    pub fn fail(&mut self, op_id: OpId, reason: &str) -> Result<(), StoreError> {
        let op = self
            .ledger
            .remove(op_id)
            .ok_or(StoreError::UnknownOperation(op_id))?;
        self.history.revert_last_push(op.prior_future);
        self.is_loading = !self.ledger.is_empty();
        let message = format!("Failed to {}", op.label);
        tracing::warn!(operation = op.label, %op_id, reason, "rolled back");
        self.error = Some(message.clone());
        self.ledger.record_failure(FailedOperation {
            op_id,
            label: op.label,
            mutation: op.mutation,
            error: message,
        });
        Ok(())
    }

    /// Replays a previously failed operation as a fresh mutation with a new
    /// operation id and the full optimistic lifecycle.
    pub fn retry(&mut self, op_id: OpId) -> Result<BeginOutcome, StoreError> {
        let failed = self
            .ledger
            .take_failed(op_id)
            .ok_or(StoreError::NothingToRetry(op_id))?;
        tracing::debug!(operation = failed.label, original = %op_id, "retrying failed operation");
        Ok(self.begin(failed.mutation))
    }

    /// Steps the history one snapshot back. Never creates snapshots or
    /// ledger entries. No-op (returns false) when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        self.history.undo()
    }

    /// Steps the history one snapshot forward. No-op (returns false) when
    /// there is nothing to redo.
    pub fn redo(&mut self) -> bool {
        self.history.redo()
    }

    /// Replaces the visible state, clearing history branches. Used when
    /// re-hydrating an existing store from durable storage.
    pub fn reset(&mut self, state: S) {
        self.history.reset(state);
        self.error = None;
        self.is_loading = !self.ledger.is_empty();
    }

    /// History depths as `(past, future)`, for diagnostics and tests.
    pub fn history_depth(&self) -> (usize, usize) {
        (self.history.past_len(), self.history.future_len())
    }
}
