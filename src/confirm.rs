//! Injected confirmation boundary for optimistic mutations.
//!
//! Every mutation a store applies optimistically must eventually be confirmed
//! by an external collaborator (a backend call in a real deployment). The
//! boundary is a blocking trait driven from the runtime on a blocking worker
//! thread, so tests can inject deterministic success, failure, or hangs
//! without real delays.

use std::time::Duration;

use thiserror::Error;

use crate::types::OpId;

/// Errors from the confirmation step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfirmError {
    /// The collaborator rejected the mutation.
    #[error("confirmation rejected: {0}")]
    Rejected(String),
    /// No outcome arrived within the configured timeout; the runtime
    /// synthesizes this failure and rolls the mutation back.
    #[error("confirmation timed out")]
    TimedOut,
}

/// Description of the operation being confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpDescriptor {
    /// Operation identifier.
    pub op_id: OpId,
    /// Short verb phrase naming the mutation.
    pub label: &'static str,
    /// Storage key of the store instance that issued the operation.
    pub storage_key: &'static str,
}

/// External confirmation call awaited by every mutation.
///
/// Called once per operation, off the runtime thread. Implementations may
/// block.
pub trait Confirmer: Send + 'static {
    /// Confirms or rejects one operation.
    fn confirm(&mut self, op: &OpDescriptor) -> Result<(), ConfirmError>;
}

/// Confirmer that sleeps for a fixed interval and always succeeds, simulating
/// the latency of a well-behaved backend.
#[derive(Debug, Clone)]
pub struct FixedDelayConfirmer {
    delay: Duration,
}

impl FixedDelayConfirmer {
    /// Creates a confirmer that sleeps `delay` per operation.
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for FixedDelayConfirmer {
    fn default() -> Self {
        Self::new(Duration::from_millis(150))
    }
}

impl Confirmer for FixedDelayConfirmer {
    fn confirm(&mut self, _op: &OpDescriptor) -> Result<(), ConfirmError> {
        std::thread::sleep(self.delay);
        Ok(())
    }
}
