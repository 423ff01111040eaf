//! Rehearsal store instance: scheduled rehearsal events.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    core::store::{ApplyEffect, EntityState},
    persist::revive,
    runtime::handle::{MutationOutcome, RuntimeError, StoreHandle},
    types::EntityId,
};

type MutationResult = Result<MutationOutcome, RuntimeError>;

/// A scheduled rehearsal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RehearsalEvent {
    /// Stable event identifier.
    pub id: EntityId,
    /// Event title.
    pub title: String,
    /// Where the rehearsal happens.
    pub location: Option<String>,
    /// Start time; revived leniently from storage.
    #[serde(default, with = "revive")]
    pub starts_at: Option<DateTime<Utc>>,
    /// Planned duration in minutes.
    pub duration_min: Option<u32>,
    /// True once the rehearsal took place.
    pub completed: bool,
}

/// Insert payload used to create a new [`RehearsalEvent`].
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    /// Event title.
    pub title: String,
    /// Where the rehearsal happens.
    pub location: Option<String>,
    /// Start time.
    pub starts_at: Option<DateTime<Utc>>,
    /// Planned duration in minutes.
    pub duration_min: Option<u32>,
}

impl EventDraft {
    /// Materializes the draft into an event with a fresh id.
    pub fn into_event(self) -> RehearsalEvent {
        RehearsalEvent {
            id: Uuid::new_v4(),
            title: self.title,
            location: self.location,
            starts_at: self.starts_at,
            duration_min: self.duration_min,
            completed: false,
        }
    }
}

/// Sparse patch where each outer `Some` overwrites the event value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventPatch {
    /// Optional replacement for the title.
    pub title: Option<String>,
    /// Optional replacement for the location.
    pub location: Option<Option<String>>,
    /// Optional replacement for the start time.
    pub starts_at: Option<Option<DateTime<Utc>>>,
    /// Optional replacement for the duration.
    pub duration_min: Option<Option<u32>>,
    /// Optional replacement for the completion flag.
    pub completed: Option<bool>,
}

impl EventPatch {
    /// Returns true when no fields are set.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Applies this patch in place to `event`.
    pub fn apply_to(&self, event: &mut RehearsalEvent) {
        if let Some(v) = &self.title {
            event.title = v.clone();
        }
        if let Some(v) = &self.location {
            event.location = v.clone();
        }
        if let Some(v) = self.starts_at {
            event.starts_at = v;
        }
        if let Some(v) = self.duration_min {
            event.duration_min = v;
        }
        if let Some(v) = self.completed {
            event.completed = v;
        }
    }
}

/// Collections managed by the rehearsal store.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RehearsalState {
    /// Rehearsal events in insertion order.
    #[serde(default)]
    pub events: Vec<RehearsalEvent>,
}

/// Typed mutations for the rehearsal store.
#[derive(Debug, Clone, PartialEq)]
pub enum RehearsalMutation {
    /// Insert a fully materialized event.
    AddEvent(RehearsalEvent),
    /// Patch an existing event.
    UpdateEvent {
        /// Event id to mutate.
        id: EntityId,
        /// Forward patch.
        patch: EventPatch,
    },
    /// Remove an event.
    DeleteEvent {
        /// Event id to remove.
        id: EntityId,
    },
    /// Flip an event's completion flag.
    ToggleEvent {
        /// Event id to toggle.
        id: EntityId,
    },
}

impl EntityState for RehearsalState {
    type Mutation = RehearsalMutation;

    const STORAGE_KEY: &'static str = "woodshed.rehearsal";

    fn apply(&mut self, mutation: &RehearsalMutation) -> ApplyEffect {
        match mutation {
            RehearsalMutation::AddEvent(event) => {
                self.events.push(event.clone());
                ApplyEffect::Changed
            }
            RehearsalMutation::UpdateEvent { id, patch } => {
                if patch.is_empty() {
                    return ApplyEffect::Noop("empty patch");
                }
                match self.events.iter_mut().find(|e| e.id == *id) {
                    Some(event) => {
                        patch.apply_to(event);
                        ApplyEffect::Changed
                    }
                    None => ApplyEffect::Noop("no such event"),
                }
            }
            RehearsalMutation::DeleteEvent { id } => {
                match self.events.iter().position(|e| e.id == *id) {
                    Some(pos) => {
                        self.events.remove(pos);
                        ApplyEffect::Changed
                    }
                    None => ApplyEffect::Noop("no such event"),
                }
            }
            RehearsalMutation::ToggleEvent { id } => {
                match self.events.iter_mut().find(|e| e.id == *id) {
                    Some(event) => {
                        event.completed = !event.completed;
                        ApplyEffect::Changed
                    }
                    None => ApplyEffect::Noop("no such event"),
                }
            }
        }
    }

    fn label(mutation: &RehearsalMutation) -> &'static str {
        match mutation {
            RehearsalMutation::AddEvent(_) => "add event",
            RehearsalMutation::UpdateEvent { .. } => "update event",
            RehearsalMutation::DeleteEvent { .. } => "delete event",
            RehearsalMutation::ToggleEvent { .. } => "toggle event",
        }
    }
}

impl RehearsalState {
    /// Events starting on the same UTC calendar day as `now`.
    pub fn events_for_day(&self, now: DateTime<Utc>) -> Vec<&RehearsalEvent> {
        self.events
            .iter()
            .filter(|e| {
                e.starts_at
                    .is_some_and(|at| at.num_days_from_ce() == now.num_days_from_ce())
            })
            .collect()
    }

    /// Incomplete events starting at or after `now`, soonest first.
    pub fn upcoming_events(&self, now: DateTime<Utc>) -> Vec<&RehearsalEvent> {
        let mut events: Vec<&RehearsalEvent> = self
            .events
            .iter()
            .filter(|e| !e.completed && e.starts_at.is_some_and(|at| at >= now))
            .collect();
        events.sort_by_key(|e| e.starts_at);
        events
    }

    /// Events starting within `[start, end)`.
    pub fn events_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<&RehearsalEvent> {
        self.events
            .iter()
            .filter(|e| e.starts_at.is_some_and(|at| at >= start && at < end))
            .collect()
    }

    /// Looks up an event by id.
    pub fn event(&self, id: EntityId) -> Option<&RehearsalEvent> {
        self.events.iter().find(|e| e.id == id)
    }
}

impl StoreHandle<RehearsalState> {
    /// Adds an event from a draft.
    pub async fn add_event(&self, draft: EventDraft) -> MutationResult {
        self.mutate(RehearsalMutation::AddEvent(draft.into_event()))
            .await
    }

    /// Patches an existing event.
    pub async fn update_event(&self, id: EntityId, patch: EventPatch) -> MutationResult {
        self.mutate(RehearsalMutation::UpdateEvent { id, patch })
            .await
    }

    /// Deletes an event.
    pub async fn delete_event(&self, id: EntityId) -> MutationResult {
        self.mutate(RehearsalMutation::DeleteEvent { id }).await
    }

    /// Flips an event's completion flag.
    pub async fn toggle_event(&self, id: EntityId) -> MutationResult {
        self.mutate(RehearsalMutation::ToggleEvent { id }).await
    }
}
