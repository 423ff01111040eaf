//! Durable persistence: versioned envelopes, migration, retry, revival.

/// Key/value storage media.
pub mod kv;
/// Lenient serde for revived date fields.
pub mod revive;

use std::{marker::PhantomData, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{core::store::EntityState, persist::kv::KvMedium, types::SchemaVersion};

/// Current persisted schema version.
///
/// Version 1 predates task categories and gig call times; envelopes carrying
/// an older version are migrated on load by filling the missing fields with
/// defaults while preserving collection data verbatim.
pub const SCHEMA_VERSION: SchemaVersion = 2;

/// Errors from the persistence write/delete path.
///
/// The read path never errors; see [`PersistenceAdapter::load`].
#[derive(Debug, Error)]
pub enum PersistError {
    /// Serialization failed.
    #[error("serialize state: {0}")]
    Serde(#[from] serde_json::Error),
    /// The medium kept failing after all retry attempts.
    #[error("storage write to {key:?} failed after {attempts} attempts")]
    RetriesExhausted {
        /// Storage key being written or deleted.
        key: &'static str,
        /// Number of attempts made.
        attempts: u32,
        /// Final medium error.
        #[source]
        source: std::io::Error,
    },
    /// The persistence worker failed out-of-band.
    #[error("persistence worker: {0}")]
    Worker(String),
}

/// Result alias for persistence operations.
pub type PersistResult<T> = Result<T, PersistError>;

/// Durable on-disk shape: collection state plus schema version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedEnvelope<S> {
    /// Collection fields of the owning store.
    pub state: S,
    /// Schema version the state was written under.
    pub version: SchemaVersion,
}

/// Envelope decoded only as far as its version, so migration can be decided
/// before the state payload is interpreted.
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    state: serde_json::Value,
    version: SchemaVersion,
}

#[derive(Serialize)]
struct EnvelopeRef<'a, S> {
    state: &'a S,
    version: SchemaVersion,
}

/// Bounded-retry policy for medium writes and deletes.
///
/// Fixed attempt count with a doubling backoff between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts before giving up.
    pub attempts: u32,
    /// Sleep before the first retry; doubles per subsequent retry.
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_backoff: Duration::from_millis(50),
        }
    }
}

/// Write-side sink used by the runtime's persistence worker.
///
/// Object-safe so the worker can hold any adapter behind a box.
pub trait StateSink<S>: Send {
    /// Persists the latest committed state.
    fn save(&mut self, state: &S) -> PersistResult<()>;
    /// Removes the persisted state.
    fn remove(&mut self) -> PersistResult<()>;
}

/// Wraps a [`KvMedium`] with serialization, revival, migration, and retry
/// for one store instance's key.
///
/// Write and delete failures surface to the caller after retries exhaust;
/// the read path is crash-proof and falls back to `None`.
pub struct PersistenceAdapter<S: EntityState> {
    medium: Box<dyn KvMedium>,
    retry: RetryPolicy,
    _state: PhantomData<fn() -> S>,
}

impl<S: EntityState> PersistenceAdapter<S> {
    /// Creates an adapter over `medium` with the default retry policy.
    pub fn new(medium: Box<dyn KvMedium>) -> Self {
        Self::with_retry(medium, RetryPolicy::default())
    }

    /// Creates an adapter with an explicit retry policy.
    pub fn with_retry(medium: Box<dyn KvMedium>, retry: RetryPolicy) -> Self {
        Self {
            medium,
            retry,
            _state: PhantomData,
        }
    }

    /// Loads and migrates the persisted state for this store instance.
    ///
    /// Returns `None` when the key is absent, and also when the stored value
    /// fails to decode (after an error log): the read path never propagates
    /// an error, so a corrupt value degrades to default initial state rather
    /// than a crash on startup.
    pub fn load(&self) -> Option<S> {
        let key = S::STORAGE_KEY;
        let text = match self.medium.get(key) {
            Ok(Some(text)) => text,
            Ok(None) => return None,
            Err(err) => {
                tracing::error!(operation = "load", storage_key = key, %err, "storage read failed");
                return None;
            }
        };

        let raw: RawEnvelope = match serde_json::from_str(&text) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::error!(operation = "load", storage_key = key, %err, "envelope decode failed");
                return None;
            }
        };

        if raw.version < SCHEMA_VERSION {
            tracing::info!(
                operation = "load",
                storage_key = key,
                from = raw.version,
                to = SCHEMA_VERSION,
                "migrating persisted state"
            );
        }

        // Fields introduced since the stored version deserialize to their
        // defaults; existing collection data is preserved verbatim.
        match serde_json::from_value::<S>(raw.state) {
            Ok(state) => Some(state),
            Err(err) => {
                tracing::error!(operation = "load", storage_key = key, %err, "state decode failed");
                None
            }
        }
    }

    /// Loads persisted state into a fresh store, falling back to default
    /// initial state when nothing (valid) is stored.
    pub fn load_store(&self) -> crate::core::store::EntityStore<S> {
        match self.load() {
            Some(state) => crate::core::store::EntityStore::hydrate(state),
            None => crate::core::store::EntityStore::new(),
        }
    }

    /// Serializes and writes the state under this instance's key, retrying
    /// per the policy.
    pub fn save(&mut self, state: &S) -> PersistResult<()> {
        let envelope = EnvelopeRef {
            state,
            version: SCHEMA_VERSION,
        };
        let text = serde_json::to_string(&envelope)?;
        let key = S::STORAGE_KEY;
        self.with_write_retry("save", |medium| medium.set(key, &text))
    }

    /// Deletes the persisted state, retrying per the policy.
    pub fn remove(&mut self) -> PersistResult<()> {
        let key = S::STORAGE_KEY;
        self.with_write_retry("remove", |medium| medium.delete(key))
    }

    fn with_write_retry(
        &mut self,
        operation: &'static str,
        mut attempt: impl FnMut(&mut dyn KvMedium) -> std::io::Result<()>,
    ) -> PersistResult<()> {
        let key = S::STORAGE_KEY;
        let mut backoff = self.retry.initial_backoff;
        let mut last_err = None;

        for n in 1..=self.retry.attempts {
            match attempt(self.medium.as_mut()) {
                Ok(()) => return Ok(()),
                Err(err) => {
                    tracing::warn!(
                        operation,
                        storage_key = key,
                        attempt = n,
                        %err,
                        "storage write attempt failed"
                    );
                    last_err = Some(err);
                    if n < self.retry.attempts {
                        std::thread::sleep(backoff);
                        backoff *= 2;
                    }
                }
            }
        }

        let source = last_err.unwrap_or_else(|| std::io::Error::other("no attempts configured"));
        tracing::error!(
            operation,
            storage_key = key,
            attempts = self.retry.attempts,
            "storage write failed after retries"
        );
        Err(PersistError::RetriesExhausted {
            key,
            attempts: self.retry.attempts,
            source,
        })
    }
}

impl<S: EntityState> StateSink<S> for PersistenceAdapter<S> {
    fn save(&mut self, state: &S) -> PersistResult<()> {
        PersistenceAdapter::save(self, state)
    }

    fn remove(&mut self) -> PersistResult<()> {
        PersistenceAdapter::remove(self)
    }
}
