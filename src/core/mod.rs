/// Undo/redo history stack.
pub mod history;
/// In-flight operation ledger.
pub mod ledger;
/// Generic optimistic entity store.
pub mod store;
