use chrono::{TimeZone, Utc};

use woodshed::{
    core::store::{BeginOutcome, EntityStore},
    domain::practice::{PracticeMutation, PracticeState, TaskDraft, TaskPatch},
};

fn draft(title: &str) -> TaskDraft {
    TaskDraft {
        title: title.to_string(),
        category_id: None,
        due_date: None,
        notes: None,
    }
}

fn begin_committed(store: &mut EntityStore<PracticeState>, mutation: PracticeMutation) {
    match store.begin(mutation) {
        BeginOutcome::Applied(op_id) => store.commit(op_id).expect("commit"),
        BeginOutcome::Noop(reason) => panic!("unexpected noop: {reason}"),
    }
}

#[test]
fn undo_redo_inverse_law_over_n_mutations() {
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let mut store = EntityStore::<PracticeState>::new();
    let initial = store.state().clone();

    let mut after_each = Vec::new();
    for i in 0..5 {
        begin_committed(
            &mut store,
            PracticeMutation::AddTask(draft(&format!("task {i}")).into_task(now)),
        );
        after_each.push(store.state().clone());
    }
    let final_state = store.state().clone();

    for _ in 0..5 {
        assert!(store.undo());
    }
    assert_eq!(store.state(), &initial);
    assert!(!store.undo(), "undo past the beginning must be a no-op");

    for _ in 0..5 {
        assert!(store.redo());
    }
    assert_eq!(store.state(), &final_state);
    assert!(!store.redo(), "redo past the end must be a no-op");

    // Intermediate states replay in order.
    store.undo();
    store.undo();
    assert_eq!(store.state(), &after_each[2]);
}

#[test]
fn update_undo_redo_restores_exact_state() {
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let mut store = EntityStore::<PracticeState>::new();
    let task = draft("etudes").into_task(now);
    let id = task.id;
    begin_committed(&mut store, PracticeMutation::AddTask(task));

    let before = store.state().clone();

    let patch = TaskPatch {
        title: Some("etudes, op. 10".to_string()),
        completed: Some(true),
        ..TaskPatch::default()
    };
    begin_committed(&mut store, PracticeMutation::UpdateTask { id, patch });
    let after = store.state().clone();
    assert_ne!(after, before);

    assert!(store.undo());
    assert_eq!(store.state(), &before);

    assert!(store.redo());
    assert_eq!(store.state(), &after);
}

#[test]
fn new_mutation_discards_redo_branch() {
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let mut store = EntityStore::<PracticeState>::new();
    begin_committed(&mut store, PracticeMutation::AddTask(draft("a").into_task(now)));
    begin_committed(&mut store, PracticeMutation::AddTask(draft("b").into_task(now)));

    assert!(store.undo());
    assert!(store.can_redo());

    begin_committed(&mut store, PracticeMutation::AddTask(draft("c").into_task(now)));
    assert!(!store.can_redo(), "push must clear the redo branch");

    let titles: Vec<&str> = store.state().tasks.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, ["a", "c"]);
}

#[test]
fn undo_redo_never_create_history_snapshots() {
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let mut store = EntityStore::<PracticeState>::new();
    begin_committed(&mut store, PracticeMutation::AddTask(draft("a").into_task(now)));
    begin_committed(&mut store, PracticeMutation::AddTask(draft("b").into_task(now)));
    assert_eq!(store.history_depth(), (2, 0));

    store.undo();
    assert_eq!(store.history_depth(), (1, 1));
    store.redo();
    assert_eq!(store.history_depth(), (2, 0));
}

#[test]
fn history_limit_evicts_oldest_entry() {
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let mut store = EntityStore::<PracticeState>::with_history_limit(PracticeState::default(), 2);
    for i in 0..4 {
        begin_committed(
            &mut store,
            PracticeMutation::AddTask(draft(&format!("task {i}")).into_task(now)),
        );
    }

    assert_eq!(store.history_depth(), (2, 0));
    assert!(store.undo());
    assert!(store.undo());
    assert!(!store.undo());
    // Oldest entries were evicted: the floor is two tasks, not zero.
    assert_eq!(store.state().tasks.len(), 2);
}
