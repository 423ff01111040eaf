//! Optimistic entity stores with undo/redo history, an in-flight operation
//! ledger, and durable versioned persistence.
//!
//! One generic engine, three store instances: practice tasks and categories,
//! rehearsal events, and gigs. Every mutation is applied optimistically,
//! pushed onto a linear undo/redo history, and registered in a ledger until
//! an injected confirmation step settles it; a failed confirmation rolls the
//! store back to its exact pre-mutation state and surfaces a short error
//! string. Committed state is persisted through a key/value adapter with
//! schema migration and lenient revival of date fields.
//!
//! # Examples
//!
//! Synchronous engine usage with [`core::store::EntityStore`]:
//! ```
//! use woodshed::{
//!     core::store::{BeginOutcome, EntityStore},
//!     domain::practice::{PracticeMutation, PracticeState, TaskDraft},
//! };
//!
//! let mut store = EntityStore::<PracticeState>::new();
//! let task = TaskDraft {
//!     title: "Shed the bridge of Moment's Notice".to_string(),
//!     category_id: None,
//!     due_date: None,
//!     notes: None,
//! }
//! .into_task(chrono::Utc::now());
//!
//! let outcome = store.begin(PracticeMutation::AddTask(task));
//! let op_id = outcome.op_id().expect("applied");
//! assert_eq!(store.state().tasks.len(), 1);
//! assert!(store.is_loading());
//!
//! store.commit(op_id).expect("commit");
//! assert!(!store.is_loading());
//! assert!(store.can_undo());
//! ```
//!
//! Runtime usage with a file-backed sink:
//! ```no_run
//! use woodshed::{
//!     confirm::FixedDelayConfirmer,
//!     domain::practice::{PracticeState, TaskDraft},
//!     persist::{PersistenceAdapter, kv::FileKv},
//!     runtime::handle::{RuntimeConfig, spawn_store},
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let adapter = PersistenceAdapter::<PracticeState>::new(Box::new(FileKv::new("data")));
//! let store = adapter.load_store();
//! let handle = spawn_store(
//!     store,
//!     Box::new(FixedDelayConfirmer::default()),
//!     Some(Box::new(adapter)),
//!     RuntimeConfig::default(),
//! );
//!
//! handle
//!     .add_task(TaskDraft {
//!         title: "Transcribe the solo".to_string(),
//!         category_id: None,
//!         due_date: None,
//!         notes: None,
//!     })
//!     .await
//!     .expect("add task");
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```
#![deny(missing_docs)]

/// Injected confirmation boundary.
pub mod confirm;
/// Generic store engine, history stack, and operation ledger.
pub mod core;
/// The three store instances: practice, rehearsal, gig.
pub mod domain;
/// Persistence adapter, storage media, and date revival.
pub mod persist;
/// Single-writer runtime handle and events.
pub mod runtime;
/// Shared identifier types.
pub mod types;
