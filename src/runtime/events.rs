//! Store event stream payloads.

use crate::types::OpId;

/// Events emitted from a store's single-writer loop.
///
/// UI layers subscribe to drive toasts and refreshes; `Applied` fires as soon
/// as the optimistic state is visible, before the operation's confirmation
/// outcome is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A mutation was applied optimistically and awaits confirmation.
    Applied {
        /// Operation id.
        op_id: OpId,
        /// Short verb phrase naming the mutation.
        label: &'static str,
    },
    /// A pending operation was confirmed; its state stands.
    Committed {
        /// Operation id.
        op_id: OpId,
    },
    /// A pending operation failed and was rolled back.
    RolledBack {
        /// Operation id.
        op_id: OpId,
        /// Human-readable error surfaced on the store.
        error: String,
    },
    /// One undo step was applied.
    UndoApplied,
    /// One redo step was applied.
    RedoApplied,
    /// The latest state reached durable storage.
    Saved,
    /// A save failed after retries; in-memory state is ahead of disk until
    /// the next successful save.
    SaveFailed {
        /// Failure description.
        error: String,
    },
}
