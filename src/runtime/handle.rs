//! Single-writer store runtime.
//!
//! Each store instance runs in its own task that owns the
//! [`EntityStore`] exclusively. Mutations are serialized: while one
//! operation awaits its confirmation outcome, further mutations, retries,
//! and undo/redo queue in a backlog, so a rollback always reverts the most
//! recent optimistic change and can never clobber a later committed one.
//! Queries are answered immediately and observe optimistic state.

use std::{collections::VecDeque, sync::Arc};

use thiserror::Error;
use tokio::{
    sync::{Mutex, broadcast, mpsc, oneshot},
    time::{Duration, Instant},
};

use crate::{
    confirm::{ConfirmError, Confirmer, OpDescriptor},
    core::store::{BeginOutcome, EntityState, EntityStore, StoreError},
    persist::{PersistError, StateSink},
    types::OpId,
};

use super::events::StoreEvent;

/// Errors surfaced by the runtime handle.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Synchronous store engine error.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Persistence error from an explicit flush.
    #[error(transparent)]
    Persist(#[from] PersistError),
    /// The store task has shut down.
    #[error("store runtime channel closed")]
    ChannelClosed,
}

/// Tunables for a store runtime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// How long a confirmation may run before the runtime synthesizes a
    /// failure and rolls the mutation back. The blocked call itself runs to
    /// completion in the background.
    pub confirm_timeout: Duration,
    /// Maximum time a committed state change may sit unwritten before the
    /// persistence worker flushes it. Rapid mutations coalesce into one
    /// write of the latest state.
    pub save_max_latency: Duration,
    /// Bound of the queue feeding the persistence worker.
    pub save_queue_bound: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            confirm_timeout: Duration::from_secs(5),
            save_max_latency: Duration::from_millis(75),
            save_queue_bound: 64,
        }
    }
}

/// Terminal disposition of a mutation issued through the handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Confirmed; the optimistic state stands.
    Committed(OpId),
    /// Confirmation failed; state was rolled back and `error` surfaced.
    RolledBack {
        /// Operation id.
        op_id: OpId,
        /// Human-readable error surfaced on the store.
        error: String,
    },
    /// The mutation had no effect and never entered the lifecycle.
    Skipped(&'static str),
}

/// Cheaply clonable handle to a spawned store runtime.
pub struct StoreHandle<S: EntityState> {
    cmd_tx: mpsc::Sender<Command<S>>,
    events_tx: broadcast::Sender<StoreEvent>,
}

impl<S: EntityState> Clone for StoreHandle<S> {
    fn clone(&self) -> Self {
        Self {
            cmd_tx: self.cmd_tx.clone(),
            events_tx: self.events_tx.clone(),
        }
    }
}

enum Command<S: EntityState> {
    Mutate {
        mutation: S::Mutation,
        resp: oneshot::Sender<MutationOutcome>,
    },
    Retry {
        op_id: OpId,
        resp: oneshot::Sender<Result<MutationOutcome, RuntimeError>>,
    },
    Undo {
        resp: oneshot::Sender<bool>,
    },
    Redo {
        resp: oneshot::Sender<bool>,
    },
    CanUndo {
        resp: oneshot::Sender<bool>,
    },
    IsLoading {
        resp: oneshot::Sender<bool>,
    },
    CanRedo {
        resp: oneshot::Sender<bool>,
    },
    State {
        resp: oneshot::Sender<S>,
    },
    LastError {
        resp: oneshot::Sender<Option<String>>,
    },
    ClearError {
        resp: oneshot::Sender<()>,
    },
    FailedOps {
        resp: oneshot::Sender<Vec<OpId>>,
    },
    Flush {
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
    Shutdown {
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
}

enum Queued<S: EntityState> {
    Mutate {
        mutation: S::Mutation,
        resp: oneshot::Sender<MutationOutcome>,
    },
    Retry {
        op_id: OpId,
        resp: oneshot::Sender<Result<MutationOutcome, RuntimeError>>,
    },
    Undo {
        resp: oneshot::Sender<bool>,
    },
    Redo {
        resp: oneshot::Sender<bool>,
    },
}

enum PendingResp {
    Mutate(oneshot::Sender<MutationOutcome>),
    Retry(oneshot::Sender<Result<MutationOutcome, RuntimeError>>),
}

struct InFlight {
    op_id: OpId,
    resp: PendingResp,
}

enum SaveMsg<S> {
    State(S),
    Flush {
        resp: oneshot::Sender<Result<(), PersistError>>,
    },
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

struct Loop<S: EntityState> {
    store: EntityStore<S>,
    confirmer: Arc<Mutex<Box<dyn Confirmer>>>,
    pending: Option<InFlight>,
    backlog: VecDeque<Queued<S>>,
    events_tx: broadcast::Sender<StoreEvent>,
    outcome_tx: mpsc::UnboundedSender<(OpId, Result<(), ConfirmError>)>,
    save_tx: Option<mpsc::Sender<SaveMsg<S>>>,
    confirm_timeout: Duration,
}

/// Spawns the single-writer runtime for one store instance.
///
/// `sink`, when present, receives the latest state after every settled
/// mutation and every undo/redo step.
pub fn spawn_store<S: EntityState>(
    store: EntityStore<S>,
    confirmer: Box<dyn Confirmer>,
    sink: Option<Box<dyn StateSink<S>>>,
    config: RuntimeConfig,
) -> StoreHandle<S> {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command<S>>(256);
    let (events_tx, _) = broadcast::channel::<StoreEvent>(1024);
    let (outcome_tx, mut outcome_rx) =
        mpsc::unbounded_channel::<(OpId, Result<(), ConfirmError>)>();
    let (saved_tx, mut saved_rx) = mpsc::unbounded_channel::<Result<(), String>>();

    let save_tx = sink.map(|sink| {
        let (save_tx, save_rx) = mpsc::channel::<SaveMsg<S>>(config.save_queue_bound);
        spawn_save_worker(sink, save_rx, saved_tx, config.clone());
        save_tx
    });

    let mut state = Loop {
        store,
        confirmer: Arc::new(Mutex::new(confirmer)),
        pending: None,
        backlog: VecDeque::new(),
        events_tx: events_tx.clone(),
        outcome_tx,
        save_tx,
        confirm_timeout: config.confirm_timeout,
    };

    tokio::spawn(async move {
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break; };
                    if state.handle_command(cmd).await {
                        break;
                    }
                }
                outcome = outcome_rx.recv() => {
                    if let Some((op_id, result)) = outcome {
                        state.settle(op_id, result);
                        state.drain_backlog();
                    }
                }
                saved = saved_rx.recv(), if state.save_tx.is_some() => {
                    if let Some(result) = saved {
                        let event = match result {
                            Ok(()) => StoreEvent::Saved,
                            Err(error) => StoreEvent::SaveFailed { error },
                        };
                        let _ = state.events_tx.send(event);
                    }
                }
            }
        }
    });

    StoreHandle { cmd_tx, events_tx }
}

impl<S: EntityState> Loop<S> {
    /// Returns true when the loop should exit.
    async fn handle_command(&mut self, cmd: Command<S>) -> bool {
        match cmd {
            Command::Mutate { mutation, resp } => {
                if self.pending.is_some() {
                    self.backlog.push_back(Queued::Mutate { mutation, resp });
                } else {
                    self.start_mutation(mutation, resp);
                }
            }
            Command::Retry { op_id, resp } => {
                if self.pending.is_some() {
                    self.backlog.push_back(Queued::Retry { op_id, resp });
                } else {
                    self.start_retry(op_id, resp);
                }
            }
            Command::Undo { resp } => {
                if self.pending.is_some() {
                    self.backlog.push_back(Queued::Undo { resp });
                } else {
                    self.apply_undo(resp);
                }
            }
            Command::Redo { resp } => {
                if self.pending.is_some() {
                    self.backlog.push_back(Queued::Redo { resp });
                } else {
                    self.apply_redo(resp);
                }
            }
            Command::CanUndo { resp } => {
                let _ = resp.send(self.store.can_undo());
            }
            Command::CanRedo { resp } => {
                let _ = resp.send(self.store.can_redo());
            }
            Command::IsLoading { resp } => {
                let _ = resp.send(self.store.is_loading());
            }
            Command::State { resp } => {
                let _ = resp.send(self.store.state().clone());
            }
            Command::LastError { resp } => {
                let _ = resp.send(self.store.error().map(str::to_string));
            }
            Command::ClearError { resp } => {
                self.store.clear_error();
                let _ = resp.send(());
            }
            Command::FailedOps { resp } => {
                let ids = self
                    .store
                    .failed_operations()
                    .iter()
                    .map(|f| f.op_id)
                    .collect();
                let _ = resp.send(ids);
            }
            Command::Flush { resp } => {
                let out = self.flush_sink().await;
                let _ = resp.send(out);
            }
            Command::Shutdown { resp } => {
                let out = self.shutdown_sink().await;
                let _ = resp.send(out);
                return true;
            }
        }
        false
    }

    fn start_mutation(&mut self, mutation: S::Mutation, resp: oneshot::Sender<MutationOutcome>) {
        match self.store.begin(mutation) {
            BeginOutcome::Noop(reason) => {
                let _ = resp.send(MutationOutcome::Skipped(reason));
            }
            BeginOutcome::Applied(op_id) => {
                self.begin_confirmation(op_id, PendingResp::Mutate(resp));
            }
        }
    }

    fn start_retry(
        &mut self,
        op_id: OpId,
        resp: oneshot::Sender<Result<MutationOutcome, RuntimeError>>,
    ) {
        match self.store.retry(op_id) {
            Err(err) => {
                let _ = resp.send(Err(err.into()));
            }
            Ok(BeginOutcome::Noop(reason)) => {
                let _ = resp.send(Ok(MutationOutcome::Skipped(reason)));
            }
            Ok(BeginOutcome::Applied(new_op_id)) => {
                self.begin_confirmation(new_op_id, PendingResp::Retry(resp));
            }
        }
    }

    fn begin_confirmation(&mut self, op_id: OpId, resp: PendingResp) {
        let label = self
            .store
            .pending(op_id)
            .map(|op| op.label)
            .unwrap_or("mutation");
        let _ = self.events_tx.send(StoreEvent::Applied { op_id, label });

        let descriptor = OpDescriptor {
            op_id,
            label,
            storage_key: S::STORAGE_KEY,
        };
        let confirmer = Arc::clone(&self.confirmer);
        let outcome_tx = self.outcome_tx.clone();
        let timeout = self.confirm_timeout;
        tokio::spawn(async move {
            let blocking = tokio::task::spawn_blocking(move || {
                let mut confirmer = confirmer.blocking_lock();
                confirmer.confirm(&descriptor)
            });
            let result = match tokio::time::timeout(timeout, blocking).await {
                Err(_elapsed) => Err(ConfirmError::TimedOut),
                Ok(Err(join_err)) => Err(ConfirmError::Rejected(format!(
                    "confirmation task failed: {join_err}"
                ))),
                Ok(Ok(inner)) => inner,
            };
            let _ = outcome_tx.send((op_id, result));
        });

        self.pending = Some(InFlight { op_id, resp });
    }

    fn settle(&mut self, op_id: OpId, result: Result<(), ConfirmError>) {
        let Some(in_flight) = self.pending.take() else {
            tracing::error!(%op_id, "confirmation outcome with no pending operation");
            return;
        };
        if in_flight.op_id != op_id {
            tracing::error!(%op_id, pending = %in_flight.op_id, "confirmation outcome id mismatch");
            self.pending = Some(in_flight);
            return;
        }

        let outcome = match result {
            Ok(()) => {
                if let Err(err) = self.store.commit(op_id) {
                    tracing::error!(%op_id, %err, "commit failed");
                }
                let _ = self.events_tx.send(StoreEvent::Committed { op_id });
                MutationOutcome::Committed(op_id)
            }
            Err(confirm_err) => {
                if let Err(err) = self.store.fail(op_id, &confirm_err.to_string()) {
                    tracing::error!(%op_id, %err, "rollback failed");
                }
                let error = self.store.error().unwrap_or_default().to_string();
                let _ = self.events_tx.send(StoreEvent::RolledBack {
                    op_id,
                    error: error.clone(),
                });
                MutationOutcome::RolledBack { op_id, error }
            }
        };

        // Persist the settled state: the committed change, or the restored
        // pre-mutation state after a rollback.
        self.schedule_save();

        match in_flight.resp {
            PendingResp::Mutate(resp) => {
                let _ = resp.send(outcome);
            }
            PendingResp::Retry(resp) => {
                let _ = resp.send(Ok(outcome));
            }
        }
    }

    fn drain_backlog(&mut self) {
        while self.pending.is_none() {
            let Some(queued) = self.backlog.pop_front() else {
                break;
            };
            match queued {
                Queued::Mutate { mutation, resp } => self.start_mutation(mutation, resp),
                Queued::Retry { op_id, resp } => self.start_retry(op_id, resp),
                Queued::Undo { resp } => self.apply_undo(resp),
                Queued::Redo { resp } => self.apply_redo(resp),
            }
        }
    }

    fn apply_undo(&mut self, resp: oneshot::Sender<bool>) {
        let applied = self.store.undo();
        if applied {
            let _ = self.events_tx.send(StoreEvent::UndoApplied);
            self.schedule_save();
        }
        let _ = resp.send(applied);
    }

    fn apply_redo(&mut self, resp: oneshot::Sender<bool>) {
        let applied = self.store.redo();
        if applied {
            let _ = self.events_tx.send(StoreEvent::RedoApplied);
            self.schedule_save();
        }
        let _ = resp.send(applied);
    }

    fn schedule_save(&mut self) {
        let Some(tx) = self.save_tx.as_ref() else {
            return;
        };
        if let Err(err) = tx.try_send(SaveMsg::State(self.store.state().clone())) {
            tracing::warn!(storage_key = S::STORAGE_KEY, %err, "save queue full; state not enqueued");
            let _ = self.events_tx.send(StoreEvent::SaveFailed {
                error: format!("save queue error: {err}"),
            });
        }
    }

    async fn flush_sink(&mut self) -> Result<(), RuntimeError> {
        let Some(tx) = self.save_tx.as_ref() else {
            return Ok(());
        };
        let (flush_tx, flush_rx) = oneshot::channel();
        if tx.send(SaveMsg::Flush { resp: flush_tx }).await.is_err() {
            return Err(RuntimeError::ChannelClosed);
        }
        flush_rx
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?
            .map_err(RuntimeError::from)
    }

    async fn shutdown_sink(&mut self) -> Result<(), RuntimeError> {
        let Some(tx) = self.save_tx.as_ref() else {
            return Ok(());
        };
        let (done_tx, done_rx) = oneshot::channel();
        if tx.send(SaveMsg::Shutdown { resp: done_tx }).await.is_err() {
            return Err(RuntimeError::ChannelClosed);
        }
        done_rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }
}

fn spawn_save_worker<S: EntityState>(
    sink: Box<dyn StateSink<S>>,
    mut rx: mpsc::Receiver<SaveMsg<S>>,
    saved_tx: mpsc::UnboundedSender<Result<(), String>>,
    config: RuntimeConfig,
) {
    let sink = Arc::new(Mutex::new(sink));
    tokio::spawn(async move {
        let mut latest: Option<S> = None;
        let mut deadline = Instant::now() + config.save_max_latency;

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    let Some(msg) = msg else {
                        let _ = write_latest(&sink, &mut latest, &saved_tx).await;
                        break;
                    };
                    match msg {
                        SaveMsg::State(state) => {
                            if latest.is_none() {
                                deadline = Instant::now() + config.save_max_latency;
                            }
                            // Coalesce: only the most recent state matters.
                            latest = Some(state);
                        }
                        SaveMsg::Flush { resp } => {
                            let result = write_latest(&sink, &mut latest, &saved_tx).await;
                            let _ = resp.send(result);
                        }
                        SaveMsg::Shutdown { resp } => {
                            let _ = write_latest(&sink, &mut latest, &saved_tx).await;
                            let _ = resp.send(());
                            break;
                        }
                    }
                }
                _ = tokio::time::sleep_until(deadline), if latest.is_some() => {
                    let _ = write_latest(&sink, &mut latest, &saved_tx).await;
                    deadline = Instant::now() + config.save_max_latency;
                }
            }
        }
    });
}

async fn write_latest<S: EntityState>(
    sink: &Arc<Mutex<Box<dyn StateSink<S>>>>,
    latest: &mut Option<S>,
    saved_tx: &mpsc::UnboundedSender<Result<(), String>>,
) -> Result<(), PersistError> {
    let Some(state) = latest.take() else {
        return Ok(());
    };

    let sink_ref = Arc::clone(sink);
    let result = tokio::task::spawn_blocking(move || {
        let mut sink = sink_ref.blocking_lock();
        sink.save(&state)
    })
    .await
    .unwrap_or_else(|join_err| Err(PersistError::Worker(format!("join error: {join_err}"))));

    match result {
        Ok(()) => {
            let _ = saved_tx.send(Ok(()));
            Ok(())
        }
        Err(err) => {
            let _ = saved_tx.send(Err(err.to_string()));
            Err(err)
        }
    }
}

impl<S: EntityState> StoreHandle<S> {
    /// Subscribes to the store's event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events_tx.subscribe()
    }

    /// Issues a typed mutation and waits for its terminal disposition.
    pub async fn mutate(&self, mutation: S::Mutation) -> Result<MutationOutcome, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Mutate { mutation, resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Replays a previously failed operation.
    pub async fn retry_failed_operation(
        &self,
        op_id: OpId,
    ) -> Result<MutationOutcome, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Retry { op_id, resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Steps the history one snapshot back. Returns false when there was
    /// nothing to undo.
    pub async fn undo(&self) -> Result<bool, RuntimeError> {
        self.send_simple(|resp| Command::Undo { resp }).await
    }

    /// Steps the history one snapshot forward. Returns false when there was
    /// nothing to redo.
    pub async fn redo(&self) -> Result<bool, RuntimeError> {
        self.send_simple(|resp| Command::Redo { resp }).await
    }

    /// True when an undo step is available.
    pub async fn can_undo(&self) -> Result<bool, RuntimeError> {
        self.send_simple(|resp| Command::CanUndo { resp }).await
    }

    /// True when a redo step is available.
    pub async fn can_redo(&self) -> Result<bool, RuntimeError> {
        self.send_simple(|resp| Command::CanRedo { resp }).await
    }

    /// True while a mutation awaits confirmation.
    pub async fn is_loading(&self) -> Result<bool, RuntimeError> {
        self.send_simple(|resp| Command::IsLoading { resp }).await
    }

    /// Clones the current (possibly optimistic) state for selector use.
    pub async fn state(&self) -> Result<S, RuntimeError> {
        self.send_simple(|resp| Command::State { resp }).await
    }

    /// The most recent mutation failure message, if any.
    pub async fn error(&self) -> Result<Option<String>, RuntimeError> {
        self.send_simple(|resp| Command::LastError { resp }).await
    }

    /// Clears the error message.
    pub async fn clear_error(&self) -> Result<(), RuntimeError> {
        self.send_simple(|resp| Command::ClearError { resp }).await
    }

    /// Ids of failed operations currently available for retry, oldest first.
    pub async fn failed_operations(&self) -> Result<Vec<OpId>, RuntimeError> {
        self.send_simple(|resp| Command::FailedOps { resp }).await
    }

    /// Forces any coalesced state write through to the sink.
    pub async fn flush(&self) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Flush { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Flushes persistence and stops the runtime.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Shutdown { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    async fn send_simple<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command<S>,
    ) -> Result<T, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }
}
