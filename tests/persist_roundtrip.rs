use std::{io, time::Duration};

use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use woodshed::{
    core::store::EntityState,
    domain::{
        gig::{GigDraft, GigState},
        practice::{PracticeState, TaskDraft},
    },
    persist::{
        PersistError, PersistenceAdapter, RetryPolicy, SCHEMA_VERSION,
        kv::{FileKv, KvMedium, MemoryKv},
    },
};

fn practice_state() -> PracticeState {
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let mut state = PracticeState::default();
    state.tasks.push(
        TaskDraft {
            title: "long tones".to_string(),
            category_id: None,
            due_date: Some(Utc.with_ymd_and_hms(2026, 3, 5, 9, 30, 0).unwrap()),
            notes: Some("full range".to_string()),
        }
        .into_task(now),
    );
    state
}

#[test]
fn file_round_trip_revives_date_fields() {
    let dir = TempDir::new().expect("tempdir");
    let mut adapter =
        PersistenceAdapter::<PracticeState>::new(Box::new(FileKv::new(dir.path())));

    let state = practice_state();
    adapter.save(&state).expect("save");

    let loaded = adapter.load().expect("some state");
    assert_eq!(loaded, state);
    assert!(loaded.tasks[0].due_date.is_some(), "date revived as a value");

    // On disk the due date travels as an RFC 3339 string inside a versioned
    // envelope.
    let raw = FileKv::new(dir.path())
        .get(PracticeState::STORAGE_KEY)
        .expect("read")
        .expect("present");
    assert!(raw.contains("\"version\":2"));
    assert!(raw.contains("2026-03-05T09:30:00.000Z"));
}

#[test]
fn gig_date_and_call_time_both_revive() {
    let mut state = GigState::default();
    state.gigs.push(
        GigDraft {
            venue: "The Blue Room".to_string(),
            city: Some("Kansas City".to_string()),
            date: Some(Utc.with_ymd_and_hms(2026, 4, 18, 20, 0, 0).unwrap()),
            call_time: Some(Utc.with_ymd_and_hms(2026, 4, 18, 18, 0, 0).unwrap()),
            fee_cents: Some(25_000),
        }
        .into_gig(),
    );

    let mut adapter = PersistenceAdapter::<GigState>::new(Box::new(MemoryKv::new()));
    adapter.save(&state).expect("save");

    let loaded = adapter.load().expect("some state");
    assert_eq!(loaded.gigs[0].date, state.gigs[0].date);
    assert_eq!(loaded.gigs[0].call_time, state.gigs[0].call_time);
}

#[test]
fn unparsable_stored_date_revives_as_none() {
    let mut medium = MemoryKv::new();
    let envelope = serde_json::json!({
        "state": {
            "tasks": [{
                "id": "5d4a9f3e-9d7c-4a64-b9f1-0cb02c1e1a11",
                "title": "scales",
                "category_id": null,
                "completed": false,
                "due_date": "not-a-date",
                "notes": null,
                "created_at": "2026-03-01T12:00:00Z"
            }],
            "categories": []
        },
        "version": SCHEMA_VERSION
    });
    medium
        .set(PracticeState::STORAGE_KEY, &envelope.to_string())
        .expect("set");

    let adapter = PersistenceAdapter::<PracticeState>::new(Box::new(medium));
    let loaded = adapter.load().expect("load must not fail on a bad date");
    assert_eq!(loaded.tasks.len(), 1);
    assert_eq!(loaded.tasks[0].due_date, None);
}

#[test]
fn migration_from_older_version_fills_defaults_and_keeps_data() {
    // Version 1 predates the categories collection.
    let mut medium = MemoryKv::new();
    let envelope = serde_json::json!({
        "state": {
            "tasks": [{
                "id": "5d4a9f3e-9d7c-4a64-b9f1-0cb02c1e1a11",
                "title": "scales",
                "category_id": null,
                "completed": true,
                "due_date": null,
                "notes": null,
                "created_at": "2026-03-01T12:00:00Z"
            }]
        },
        "version": 1
    });
    medium
        .set(PracticeState::STORAGE_KEY, &envelope.to_string())
        .expect("set");

    let adapter = PersistenceAdapter::<PracticeState>::new(Box::new(medium));
    let store = adapter.load_store();

    assert_eq!(store.state().tasks.len(), 1);
    assert_eq!(store.state().tasks[0].title, "scales");
    assert!(store.state().categories.is_empty());
    assert!(!store.can_undo());
    assert!(!store.can_redo());
    assert!(!store.is_loading());
    assert_eq!(store.error(), None);
    assert!(store.pending_ids().is_empty());
}

#[test]
fn absent_and_corrupt_values_load_as_none() {
    let adapter = PersistenceAdapter::<PracticeState>::new(Box::new(MemoryKv::new()));
    assert!(adapter.load().is_none(), "absent key loads as none");

    let mut medium = MemoryKv::new();
    medium
        .set(PracticeState::STORAGE_KEY, "{not json")
        .expect("set");
    let adapter = PersistenceAdapter::<PracticeState>::new(Box::new(medium));
    assert!(adapter.load().is_none(), "corrupt value loads as none");
}

#[test]
fn remove_deletes_the_stored_value() {
    let dir = TempDir::new().expect("tempdir");
    let mut adapter =
        PersistenceAdapter::<PracticeState>::new(Box::new(FileKv::new(dir.path())));
    adapter.save(&practice_state()).expect("save");
    assert!(adapter.load().is_some());

    adapter.remove().expect("remove");
    assert!(adapter.load().is_none());
    adapter.remove().expect("removing an absent key succeeds");
}

/// Medium that fails a configured number of writes before succeeding.
struct FlakyKv {
    inner: MemoryKv,
    failures_left: u32,
}

impl KvMedium for FlakyKv {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        self.inner.get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(io::Error::other("transient write failure"));
        }
        self.inner.set(key, value)
    }

    fn delete(&mut self, key: &str) -> io::Result<()> {
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(io::Error::other("transient delete failure"));
        }
        self.inner.delete(key)
    }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        attempts: 3,
        initial_backoff: Duration::from_millis(1),
    }
}

#[test]
fn save_retries_through_transient_failures() {
    let medium = FlakyKv {
        inner: MemoryKv::new(),
        failures_left: 2,
    };
    let mut adapter =
        PersistenceAdapter::<PracticeState>::with_retry(Box::new(medium), fast_retry());

    adapter.save(&practice_state()).expect("third attempt succeeds");
    assert!(adapter.load().is_some());
}

#[test]
fn save_surfaces_an_error_after_retries_exhaust() {
    let medium = FlakyKv {
        inner: MemoryKv::new(),
        failures_left: 10,
    };
    let mut adapter =
        PersistenceAdapter::<PracticeState>::with_retry(Box::new(medium), fast_retry());

    let err = adapter.save(&practice_state()).expect_err("must fail");
    match err {
        PersistError::RetriesExhausted { key, attempts, .. } => {
            assert_eq!(key, PracticeState::STORAGE_KEY);
            assert_eq!(attempts, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
}
