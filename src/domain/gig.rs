//! Gig store instance: booked and prospective gigs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    core::store::{ApplyEffect, EntityState},
    persist::revive,
    runtime::handle::{MutationOutcome, RuntimeError, StoreHandle},
    types::EntityId,
};

type MutationResult = Result<MutationOutcome, RuntimeError>;

/// A booked or prospective gig.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gig {
    /// Stable gig identifier.
    pub id: EntityId,
    /// Venue name.
    pub venue: String,
    /// Venue city.
    pub city: Option<String>,
    /// Gig date; revived leniently from storage.
    #[serde(default, with = "revive")]
    pub date: Option<DateTime<Utc>>,
    /// Call time (arrival/soundcheck); revived leniently from storage.
    #[serde(default, with = "revive")]
    pub call_time: Option<DateTime<Utc>>,
    /// Agreed fee in cents.
    pub fee_cents: Option<i64>,
    /// True once the booking is confirmed.
    pub confirmed: bool,
}

/// Insert payload used to create a new [`Gig`].
#[derive(Debug, Clone, PartialEq)]
pub struct GigDraft {
    /// Venue name.
    pub venue: String,
    /// Venue city.
    pub city: Option<String>,
    /// Gig date.
    pub date: Option<DateTime<Utc>>,
    /// Call time.
    pub call_time: Option<DateTime<Utc>>,
    /// Agreed fee in cents.
    pub fee_cents: Option<i64>,
}

impl GigDraft {
    /// Materializes the draft into a gig with a fresh id.
    pub fn into_gig(self) -> Gig {
        Gig {
            id: Uuid::new_v4(),
            venue: self.venue,
            city: self.city,
            date: self.date,
            call_time: self.call_time,
            fee_cents: self.fee_cents,
            confirmed: false,
        }
    }
}

/// Sparse patch where each outer `Some` overwrites the gig value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GigPatch {
    /// Optional replacement for the venue.
    pub venue: Option<String>,
    /// Optional replacement for the city.
    pub city: Option<Option<String>>,
    /// Optional replacement for the date.
    pub date: Option<Option<DateTime<Utc>>>,
    /// Optional replacement for the call time.
    pub call_time: Option<Option<DateTime<Utc>>>,
    /// Optional replacement for the fee.
    pub fee_cents: Option<Option<i64>>,
    /// Optional replacement for the confirmation flag.
    pub confirmed: Option<bool>,
}

impl GigPatch {
    /// Returns true when no fields are set.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Applies this patch in place to `gig`.
    pub fn apply_to(&self, gig: &mut Gig) {
        if let Some(v) = &self.venue {
            gig.venue = v.clone();
        }
        if let Some(v) = &self.city {
            gig.city = v.clone();
        }
        if let Some(v) = self.date {
            gig.date = v;
        }
        if let Some(v) = self.call_time {
            gig.call_time = v;
        }
        if let Some(v) = self.fee_cents {
            gig.fee_cents = v;
        }
        if let Some(v) = self.confirmed {
            gig.confirmed = v;
        }
    }
}

/// Collections managed by the gig store.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GigState {
    /// Gigs in insertion order.
    #[serde(default)]
    pub gigs: Vec<Gig>,
}

/// Typed mutations for the gig store.
#[derive(Debug, Clone, PartialEq)]
pub enum GigMutation {
    /// Insert a fully materialized gig.
    AddGig(Gig),
    /// Patch an existing gig.
    UpdateGig {
        /// Gig id to mutate.
        id: EntityId,
        /// Forward patch.
        patch: GigPatch,
    },
    /// Remove a gig.
    DeleteGig {
        /// Gig id to remove.
        id: EntityId,
    },
    /// Flip a gig's confirmation flag.
    ToggleConfirmed {
        /// Gig id to toggle.
        id: EntityId,
    },
}

impl EntityState for GigState {
    type Mutation = GigMutation;

    const STORAGE_KEY: &'static str = "woodshed.gigs";

    fn apply(&mut self, mutation: &GigMutation) -> ApplyEffect {
        match mutation {
            GigMutation::AddGig(gig) => {
                self.gigs.push(gig.clone());
                ApplyEffect::Changed
            }
            GigMutation::UpdateGig { id, patch } => {
                if patch.is_empty() {
                    return ApplyEffect::Noop("empty patch");
                }
                match self.gigs.iter_mut().find(|g| g.id == *id) {
                    Some(gig) => {
                        patch.apply_to(gig);
                        ApplyEffect::Changed
                    }
                    None => ApplyEffect::Noop("no such gig"),
                }
            }
            GigMutation::DeleteGig { id } => match self.gigs.iter().position(|g| g.id == *id) {
                Some(pos) => {
                    self.gigs.remove(pos);
                    ApplyEffect::Changed
                }
                None => ApplyEffect::Noop("no such gig"),
            },
            GigMutation::ToggleConfirmed { id } => {
                match self.gigs.iter_mut().find(|g| g.id == *id) {
                    Some(gig) => {
                        gig.confirmed = !gig.confirmed;
                        ApplyEffect::Changed
                    }
                    None => ApplyEffect::Noop("no such gig"),
                }
            }
        }
    }

    fn label(mutation: &GigMutation) -> &'static str {
        match mutation {
            GigMutation::AddGig(_) => "add gig",
            GigMutation::UpdateGig { .. } => "update gig",
            GigMutation::DeleteGig { .. } => "delete gig",
            GigMutation::ToggleConfirmed { .. } => "toggle gig confirmation",
        }
    }
}

/// Booking counts and fee totals over the current gig collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GigStats {
    /// Total number of gigs.
    pub total: usize,
    /// Number of confirmed gigs.
    pub confirmed: usize,
    /// Sum of fees across confirmed gigs, in cents.
    pub confirmed_fee_cents: i64,
}

impl GigState {
    /// Gigs dated at or after `now`, soonest first.
    pub fn upcoming_gigs(&self, now: DateTime<Utc>) -> Vec<&Gig> {
        let mut gigs: Vec<&Gig> = self
            .gigs
            .iter()
            .filter(|g| g.date.is_some_and(|d| d >= now))
            .collect();
        gigs.sort_by_key(|g| g.date);
        gigs
    }

    /// Gigs dated strictly before `now`.
    pub fn past_gigs(&self, now: DateTime<Utc>) -> Vec<&Gig> {
        self.gigs
            .iter()
            .filter(|g| g.date.is_some_and(|d| d < now))
            .collect()
    }

    /// Gigs dated within `[start, end)`.
    pub fn gigs_in_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<&Gig> {
        self.gigs
            .iter()
            .filter(|g| g.date.is_some_and(|d| d >= start && d < end))
            .collect()
    }

    /// Booking counts and confirmed-fee total over the current collection.
    pub fn gig_stats(&self) -> GigStats {
        let confirmed: Vec<&Gig> = self.gigs.iter().filter(|g| g.confirmed).collect();
        GigStats {
            total: self.gigs.len(),
            confirmed: confirmed.len(),
            confirmed_fee_cents: confirmed.iter().filter_map(|g| g.fee_cents).sum(),
        }
    }

    /// Looks up a gig by id.
    pub fn gig(&self, id: EntityId) -> Option<&Gig> {
        self.gigs.iter().find(|g| g.id == id)
    }
}

impl StoreHandle<GigState> {
    /// Adds a gig from a draft.
    pub async fn add_gig(&self, draft: GigDraft) -> MutationResult {
        self.mutate(GigMutation::AddGig(draft.into_gig())).await
    }

    /// Patches an existing gig.
    pub async fn update_gig(&self, id: EntityId, patch: GigPatch) -> MutationResult {
        self.mutate(GigMutation::UpdateGig { id, patch }).await
    }

    /// Deletes a gig.
    pub async fn delete_gig(&self, id: EntityId) -> MutationResult {
        self.mutate(GigMutation::DeleteGig { id }).await
    }

    /// Flips a gig's confirmation flag.
    pub async fn toggle_confirmed(&self, id: EntityId) -> MutationResult {
        self.mutate(GigMutation::ToggleConfirmed { id }).await
    }
}
