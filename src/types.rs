//! Shared identifier types.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for a domain entity (task, category, event, gig).
pub type EntityId = Uuid;

/// Persisted schema version number.
pub type SchemaVersion = u32;

/// Unique identifier assigned to each optimistic operation.
///
/// Freshly generated (uuid v4) per mutation call, so uniqueness holds even
/// under rapid back-to-back invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OpId(Uuid);

impl OpId {
    /// Generates a fresh operation identifier.
    pub fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
