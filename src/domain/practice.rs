//! Practice store instance: tasks and categories.

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

/// A single practice task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeTask {
    /// Stable task identifier.
    pub id: EntityId,
    /// Task title.
    pub title: String,
    /// Owning category, if any.
    pub category_id: Option<EntityId>,
    /// Completion flag.
    pub completed: bool,
    /// Optional due date; revived leniently from storage.
    #[serde(default, with = "revive")]
    pub due_date: Option<DateTime<Utc>>,
    /// Free-form notes.
    pub notes: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Insert payload used to create a new [`PracticeTask`].
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDraft {
    /// Task title.
    pub title: String,
    /// Owning category, if any.
    pub category_id: Option<EntityId>,
    /// Optional due date.
    pub due_date: Option<DateTime<Utc>>,
    /// Free-form notes.
    pub notes: Option<String>,
}

impl TaskDraft {
    /// Materializes the draft into a task with a fresh id.
    pub fn into_task(self, now: DateTime<Utc>) -> PracticeTask {
        PracticeTask {
            id: Uuid::new_v4(),
            title: self.title,
            category_id: self.category_id,
            completed: false,
            due_date: self.due_date,
            notes: self.notes,
            created_at: now,
        }
    }
}

/// Sparse patch where each outer `Some` overwrites the task value.
///
/// Clearable fields use a nested `Option`: `Some(None)` clears the field.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskPatch {
    /// Optional replacement for the title.
    pub title: Option<String>,
    /// Optional replacement for the owning category.
    pub category_id: Option<Option<EntityId>>,
    /// Optional replacement for the completion flag.
    pub completed: Option<bool>,
    /// Optional replacement for the due date.
    pub due_date: Option<Option<DateTime<Utc>>>,
    /// Optional replacement for the notes.
    pub notes: Option<Option<String>>,
}

impl TaskPatch {
    /// Returns true when no fields are set.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Applies this patch in place to `task`.
    pub fn apply_to(&self, task: &mut PracticeTask) {
        if let Some(v) = &self.title {
            task.title = v.clone();
        }
        if let Some(v) = self.category_id {
            task.category_id = v;
        }
        if let Some(v) = self.completed {
            task.completed = v;
        }
        if let Some(v) = self.due_date {
            task.due_date = v;
        }
        if let Some(v) = &self.notes {
            task.notes = v.clone();
        }
    }
}

/// A task category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// Stable category identifier.
    pub id: EntityId,
    /// Category name; unique case-insensitively within a store.
    pub name: String,
    /// Optional display color.
    pub color: Option<String>,
}

impl Category {
    /// Creates a category with a fresh id.
    pub fn new(name: impl Into<String>, color: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            color,
        }
    }
}

/// Sparse patch for a [`Category`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CategoryPatch {
    /// Optional replacement for the name.
    pub name: Option<String>,
    /// Optional replacement for the display color.
    pub color: Option<Option<String>>,
}

impl CategoryPatch {
    /// Returns true when no fields are set.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Applies this patch in place to `category`.
    pub fn apply_to(&self, category: &mut Category) {
        if let Some(v) = &self.name {
            category.name = v.clone();
        }
        if let Some(v) = &self.color {
            category.color = v.clone();
        }
    }
}

/// Collections managed by the practice store.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PracticeState {
    /// Practice tasks in insertion order.
    #[serde(default)]
    pub tasks: Vec<PracticeTask>,
    /// Task categories in insertion order.
    #[serde(default)]
    pub categories: Vec<Category>,
}

/// Typed mutations for the practice store.
#[derive(Debug, Clone, PartialEq)]
pub enum PracticeMutation {
    /// Insert a fully materialized task.
    AddTask(PracticeTask),
    /// Patch an existing task.
    UpdateTask {
        /// Task id to mutate.
        id: EntityId,
        /// Forward patch.
        patch: TaskPatch,
    },
    /// Remove a task.
    DeleteTask {
        /// Task id to remove.
        id: EntityId,
    },
    /// Flip a task's completion flag.
    ToggleTask {
        /// Task id to toggle.
        id: EntityId,
    },
    /// Mark every listed task completed in one undoable step.
    CompleteMany {
        /// Task ids to complete.
        ids: Vec<EntityId>,
    },
    /// Remove every listed task in one undoable step.
    DeleteMany {
        /// Task ids to remove.
        ids: Vec<EntityId>,
    },
    /// Insert a category. Duplicate names (case-insensitive) are skipped.
    AddCategory(Category),
    /// Patch an existing category.
    UpdateCategory {
        /// Category id to mutate.
        id: EntityId,
        /// Forward patch.
        patch: CategoryPatch,
    },
    /// Remove a category, detaching its tasks.
    DeleteCategory {
        /// Category id to remove.
        id: EntityId,
    },
}

impl EntityState for PracticeState {
    type Mutation = PracticeMutation;

    const STORAGE_KEY: &'static str = "woodshed.practice";

    fn apply(&mut self, mutation: &PracticeMutation) -> ApplyEffect {
        match mutation {
            PracticeMutation::AddTask(task) => {
                self.tasks.push(task.clone());
                ApplyEffect::Changed
            }
            PracticeMutation::UpdateTask { id, patch } => {
                if patch.is_empty() {
                    return ApplyEffect::Noop("empty patch");
                }
                match self.tasks.iter_mut().find(|t| t.id == *id) {
                    Some(task) => {
                        patch.apply_to(task);
                        ApplyEffect::Changed
                    }
                    None => ApplyEffect::Noop("no such task"),
                }
            }
            PracticeMutation::DeleteTask { id } => {
                match self.tasks.iter().position(|t| t.id == *id) {
                    Some(pos) => {
                        self.tasks.remove(pos);
                        ApplyEffect::Changed
                    }
                    None => ApplyEffect::Noop("no such task"),
                }
            }
            PracticeMutation::ToggleTask { id } => {
                match self.tasks.iter_mut().find(|t| t.id == *id) {
                    Some(task) => {
                        task.completed = !task.completed;
                        ApplyEffect::Changed
                    }
                    None => ApplyEffect::Noop("no such task"),
                }
            }
            PracticeMutation::CompleteMany { ids } => {
                let mut changed = false;
                for task in self.tasks.iter_mut().filter(|t| ids.contains(&t.id)) {
                    changed |= !task.completed;
                    task.completed = true;
                }
                if changed {
                    ApplyEffect::Changed
                } else {
                    ApplyEffect::Noop("no matching incomplete tasks")
                }
            }
            PracticeMutation::DeleteMany { ids } => {
                let before = self.tasks.len();
                self.tasks.retain(|t| !ids.contains(&t.id));
                if self.tasks.len() != before {
                    ApplyEffect::Changed
                } else {
                    ApplyEffect::Noop("no matching tasks")
                }
            }
            PracticeMutation::AddCategory(category) => {
                let duplicate = self
                    .categories
                    .iter()
                    .any(|c| c.name.eq_ignore_ascii_case(&category.name));
                if duplicate {
                    return ApplyEffect::Noop("duplicate category name");
                }
                self.categories.push(category.clone());
                ApplyEffect::Changed
            }
            PracticeMutation::UpdateCategory { id, patch } => {
                if patch.is_empty() {
                    return ApplyEffect::Noop("empty patch");
                }
                match self.categories.iter_mut().find(|c| c.id == *id) {
                    Some(category) => {
                        patch.apply_to(category);
                        ApplyEffect::Changed
                    }
                    None => ApplyEffect::Noop("no such category"),
                }
            }
            PracticeMutation::DeleteCategory { id } => {
                match self.categories.iter().position(|c| c.id == *id) {
                    Some(pos) => {
                        self.categories.remove(pos);
                        for task in self.tasks.iter_mut() {
                            if task.category_id == Some(*id) {
                                task.category_id = None;
                            }
                        }
                        ApplyEffect::Changed
                    }
                    None => ApplyEffect::Noop("no such category"),
                }
            }
        }
    }

    fn label(mutation: &PracticeMutation) -> &'static str {
        match mutation {
            PracticeMutation::AddTask(_) => "add task",
            PracticeMutation::UpdateTask { .. } => "update task",
            PracticeMutation::DeleteTask { .. } => "delete task",
            PracticeMutation::ToggleTask { .. } => "toggle task",
            PracticeMutation::CompleteMany { .. } => "complete tasks",
            PracticeMutation::DeleteMany { .. } => "delete tasks",
            PracticeMutation::AddCategory(_) => "add category",
            PracticeMutation::UpdateCategory { .. } => "update category",
            PracticeMutation::DeleteCategory { .. } => "delete category",
        }
    }
}

/// Completion counts over the current task collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompletionStats {
    /// Total number of tasks.
    pub total: usize,
    /// Number of completed tasks.
    pub completed: usize,
}

impl CompletionStats {
    /// Completed share in percent (0 for an empty collection).
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 * 100.0 / self.total as f64
        }
    }
}

impl PracticeState {
    /// Tasks belonging to `category_id`.
    pub fn tasks_in_category(&self, category_id: EntityId) -> Vec<&PracticeTask> {
        self.tasks
            .iter()
            .filter(|t| t.category_id == Some(category_id))
            .collect()
    }

    /// Completed tasks.
    pub fn completed_tasks(&self) -> Vec<&PracticeTask> {
        self.tasks.iter().filter(|t| t.completed).collect()
    }

    /// Incomplete tasks whose due date lies strictly before `now`.
    pub fn overdue_tasks(&self, now: DateTime<Utc>) -> Vec<&PracticeTask> {
        self.tasks
            .iter()
            .filter(|t| !t.completed && t.due_date.is_some_and(|due| due < now))
            .collect()
    }

    /// Tasks due on the same UTC calendar day as `now`.
    pub fn tasks_for_today(&self, now: DateTime<Utc>) -> Vec<&PracticeTask> {
        self.tasks
            .iter()
            .filter(|t| {
                t.due_date
                    .is_some_and(|due| due.num_days_from_ce() == now.num_days_from_ce())
            })
            .collect()
    }

    /// Tasks due within `[start, end)`.
    pub fn tasks_in_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<&PracticeTask> {
        self.tasks
            .iter()
            .filter(|t| t.due_date.is_some_and(|due| due >= start && due < end))
            .collect()
    }

    /// Completion counts over the current collection.
    pub fn completion_stats(&self) -> CompletionStats {
        CompletionStats {
            total: self.tasks.len(),
            completed: self.tasks.iter().filter(|t| t.completed).count(),
        }
    }

    /// Looks up a task by id.
    pub fn task(&self, id: EntityId) -> Option<&PracticeTask> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Looks up a category by id.
    pub fn category(&self, id: EntityId) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }
}

impl StoreHandle<PracticeState> {
    /// Adds a task from a draft.
    pub async fn add_task(&self, draft: TaskDraft) -> MutationResult {
        self.mutate(PracticeMutation::AddTask(draft.into_task(Utc::now())))
            .await
    }

    /// Patches an existing task.
    pub async fn update_task(
        &self,
        id: EntityId,
        patch: TaskPatch,
    ) -> MutationResult {
        self.mutate(PracticeMutation::UpdateTask { id, patch }).await
    }

    /// Deletes a task.
    pub async fn delete_task(&self, id: EntityId) -> MutationResult {
        self.mutate(PracticeMutation::DeleteTask { id }).await
    }

    /// Flips a task's completion flag.
    pub async fn toggle_task(&self, id: EntityId) -> MutationResult {
        self.mutate(PracticeMutation::ToggleTask { id }).await
    }

    /// Marks several tasks completed as one undoable step.
    pub async fn complete_many(&self, ids: Vec<EntityId>) -> MutationResult {
        self.mutate(PracticeMutation::CompleteMany { ids }).await
    }

    /// Deletes several tasks as one undoable step.
    pub async fn delete_many(&self, ids: Vec<EntityId>) -> MutationResult {
        self.mutate(PracticeMutation::DeleteMany { ids }).await
    }

    /// Adds a category. A duplicate name (case-insensitive) is skipped.
    pub async fn add_category(
        &self,
        name: impl Into<String>,
        color: Option<String>,
    ) -> MutationResult {
        self.mutate(PracticeMutation::AddCategory(Category::new(name, color)))
            .await
    }

    /// Patches an existing category.
    pub async fn update_category(
        &self,
        id: EntityId,
        patch: CategoryPatch,
    ) -> MutationResult {
        self.mutate(PracticeMutation::UpdateCategory { id, patch })
            .await
    }

    /// Deletes a category, detaching its tasks.
    pub async fn delete_category(&self, id: EntityId) -> MutationResult {
        self.mutate(PracticeMutation::DeleteCategory { id }).await
    }
}
