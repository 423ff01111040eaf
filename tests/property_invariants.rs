use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use woodshed::{
    core::store::{BeginOutcome, EntityStore},
    domain::practice::{Category, PracticeMutation, PracticeState, TaskDraft, TaskPatch},
    types::EntityId,
};

#[derive(Debug, Clone)]
enum Action {
    AddTask { title_idx: u8, cat_target: u8 },
    PatchTitle { target: u8, title_idx: u8 },
    Toggle { target: u8 },
    Delete { target: u8 },
    CompleteMany { take: u8 },
    AddCategory { name_idx: u8 },
    DeleteCategory { target: u8 },
    Reject { title_idx: u8 },
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        (0u8..24, 0u8..8).prop_map(|(title_idx, cat_target)| Action::AddTask {
            title_idx,
            cat_target
        }),
        (0u8..24, 0u8..24).prop_map(|(target, title_idx)| Action::PatchTitle {
            target,
            title_idx
        }),
        (0u8..24).prop_map(|target| Action::Toggle { target }),
        (0u8..24).prop_map(|target| Action::Delete { target }),
        (0u8..24).prop_map(|take| Action::CompleteMany { take }),
        (0u8..8).prop_map(|name_idx| Action::AddCategory { name_idx }),
        (0u8..8).prop_map(|target| Action::DeleteCategory { target }),
        (0u8..24).prop_map(|title_idx| Action::Reject { title_idx }),
    ]
}

fn draft_from(title_idx: u8, category_id: Option<EntityId>) -> TaskDraft {
    TaskDraft {
        title: format!("piece {title_idx}"),
        category_id,
        due_date: Some(Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()),
        notes: None,
    }
}

fn task_ids(store: &EntityStore<PracticeState>) -> Vec<EntityId> {
    store.state().tasks.iter().map(|t| t.id).collect()
}

fn category_ids(store: &EntityStore<PracticeState>) -> Vec<EntityId> {
    store.state().categories.iter().map(|c| c.id).collect()
}

/// Begins a mutation and immediately commits it when it took effect.
fn commit_through(store: &mut EntityStore<PracticeState>, mutation: PracticeMutation) {
    if let BeginOutcome::Applied(op_id) = store.begin(mutation) {
        store.commit(op_id).expect("commit a just-applied operation");
    }
}

proptest! {
    #[test]
    fn random_sequences_preserve_invariants_and_undo_redo_roundtrip(
        actions in prop::collection::vec(action_strategy(), 1..120),
    ) {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let mut store = EntityStore::<PracticeState>::new();

        for action in actions {
            match action {
                Action::AddTask { title_idx, cat_target } => {
                    let cats = category_ids(&store);
                    let category_id = (!cats.is_empty())
                        .then(|| cats[usize::from(cat_target) % cats.len()]);
                    let task = draft_from(title_idx, category_id).into_task(now);
                    commit_through(&mut store, PracticeMutation::AddTask(task));
                }
                Action::PatchTitle { target, title_idx } => {
                    let ids = task_ids(&store);
                    if ids.is_empty() {
                        continue;
                    }
                    let id = ids[usize::from(target) % ids.len()];
                    commit_through(&mut store, PracticeMutation::UpdateTask {
                        id,
                        patch: TaskPatch {
                            title: Some(format!("piece {title_idx} rev")),
                            ..TaskPatch::default()
                        },
                    });
                }
                Action::Toggle { target } => {
                    let ids = task_ids(&store);
                    if ids.is_empty() {
                        continue;
                    }
                    let id = ids[usize::from(target) % ids.len()];
                    commit_through(&mut store, PracticeMutation::ToggleTask { id });
                }
                Action::Delete { target } => {
                    let ids = task_ids(&store);
                    if ids.is_empty() {
                        continue;
                    }
                    let id = ids[usize::from(target) % ids.len()];
                    commit_through(&mut store, PracticeMutation::DeleteTask { id });
                }
                Action::CompleteMany { take } => {
                    let ids: Vec<EntityId> = task_ids(&store)
                        .into_iter()
                        .take(usize::from(take % 5) + 1)
                        .collect();
                    commit_through(&mut store, PracticeMutation::CompleteMany { ids });
                }
                Action::AddCategory { name_idx } => {
                    let category = Category::new(format!("genre {name_idx}"), None);
                    commit_through(&mut store, PracticeMutation::AddCategory(category));
                }
                Action::DeleteCategory { target } => {
                    let cats = category_ids(&store);
                    if cats.is_empty() {
                        continue;
                    }
                    let id = cats[usize::from(target) % cats.len()];
                    commit_through(&mut store, PracticeMutation::DeleteCategory { id });
                }
                Action::Reject { title_idx } => {
                    // A failed confirmation must leave no trace besides the
                    // failure record and error message.
                    let before = store.state().clone();
                    let depth_before = store.history_depth();
                    let task = draft_from(title_idx, None).into_task(now);
                    if let BeginOutcome::Applied(op_id) =
                        store.begin(PracticeMutation::AddTask(task))
                    {
                        store.fail(op_id, "rejected").expect("fail a pending operation");
                        prop_assert_eq!(store.state(), &before);
                        prop_assert_eq!(store.history_depth(), depth_before);
                    }
                }
            }

            // No task may point at a category that no longer exists.
            let state = store.state();
            for task in &state.tasks {
                if let Some(cat) = task.category_id {
                    prop_assert!(state.category(cat).is_some());
                }
            }

            // Aggregates agree with a full scan.
            let stats = state.completion_stats();
            prop_assert_eq!(stats.total, state.tasks.len());
            prop_assert_eq!(stats.completed, state.completed_tasks().len());
            for cat in &state.categories {
                let scanned = state
                    .tasks
                    .iter()
                    .filter(|t| t.category_id == Some(cat.id))
                    .count();
                prop_assert_eq!(state.tasks_in_category(cat.id).len(), scanned);
            }
        }

        // Undo to the root and redo back must reproduce the final state.
        let target = store.state().clone();
        while store.undo() {}
        prop_assert_eq!(store.state(), &PracticeState::default());
        while store.redo() {}
        prop_assert_eq!(store.state(), &target);
    }
}
