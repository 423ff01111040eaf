//! Linear undo/redo history over whole-state snapshots.

/// Past/present/future snapshot stack.
///
/// `present` is the single authoritative copy of the store's visible state;
/// [`crate::core::store::EntityStore`] reads through it rather than keeping a
/// second copy, so the two can never diverge.
#[derive(Debug, Clone, PartialEq)]
pub struct History<S> {
    past: Vec<S>,
    present: S,
    future: Vec<S>,
    limit: Option<usize>,
}

impl<S: Clone> History<S> {
    /// Creates an unbounded history around an initial present snapshot.
    pub fn new(present: S) -> Self {
        Self {
            past: Vec::new(),
            present,
            future: Vec::new(),
            limit: None,
        }
    }

    /// Creates a history whose `past` depth is capped at `limit`.
    ///
    /// On overflow the oldest entry is evicted, so very long sessions cannot
    /// grow memory without bound. The default is unbounded.
    pub fn with_limit(present: S, limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::new(present)
        }
    }

    /// Current present snapshot.
    pub fn present(&self) -> &S {
        &self.present
    }

    /// Number of undoable snapshots.
    pub fn past_len(&self) -> usize {
        self.past.len()
    }

    /// Number of redoable snapshots.
    pub fn future_len(&self) -> usize {
        self.future.len()
    }

    /// True when at least one undo step is available.
    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    /// True when at least one redo step is available.
    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    /// Pushes a new present snapshot, moving the old present into `past`.
    ///
    /// Discards the redo branch on every push and returns it, so a caller
    /// that later needs to revert the push can restore it exactly.
    pub fn push(&mut self, next: S) -> Vec<S> {
        let prior_present = std::mem::replace(&mut self.present, next);
        self.past.push(prior_present);
        if let Some(limit) = self.limit {
            if self.past.len() > limit {
                self.past.remove(0);
            }
        }
        std::mem::take(&mut self.future)
    }

    /// Reverts the most recent [`push`](Self::push): the newest `past` entry
    /// becomes present again and `prior_future` replaces the redo branch.
    ///
    /// Returns false (leaving the stack untouched) if there is nothing to
    /// revert.
    pub fn revert_last_push(&mut self, prior_future: Vec<S>) -> bool {
        let Some(prior_present) = self.past.pop() else {
            return false;
        };
        self.present = prior_present;
        self.future = prior_future;
        true
    }

    /// Steps one snapshot back. No-op (returns false) when `past` is empty.
    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.past.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.present, previous);
        self.future.insert(0, current);
        true
    }

    /// Steps one snapshot forward. No-op (returns false) when `future` is
    /// empty.
    pub fn redo(&mut self) -> bool {
        if self.future.is_empty() {
            return false;
        }
        let next = self.future.remove(0);
        let current = std::mem::replace(&mut self.present, next);
        self.past.push(current);
        true
    }

    /// Replaces the present snapshot and clears both branches.
    ///
    /// Used on hydration from durable storage.
    pub fn reset(&mut self, present: S) {
        self.past.clear();
        self.future.clear();
        self.present = present;
    }
}
