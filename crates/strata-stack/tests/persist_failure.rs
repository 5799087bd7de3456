//! Integration tests for commit failure: edits are preserved for retry and
//! outcomes are observable through persist events.

use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use strata_stack::{
    FieldMap, LifecycleManager, ModelBundle, PersistEvent, StackConfig, StackError,
};
use strata_store::{CommitError, RecordMap, StoreBackend, StoreOpenError};

const TASK_MODEL: &str = r#"{
    "entities": [
        { "name": "Task", "attributes": [ { "name": "title", "kind": "text" } ] }
    ]
}"#;

/// In-memory backend whose persist fails while `fail` is set.
struct FlakyBackend {
    fail: Arc<AtomicBool>,
}

impl StoreBackend for FlakyBackend {
    fn describe(&self) -> String {
        "flaky in-memory".to_string()
    }

    fn load(&mut self) -> Result<RecordMap, StoreOpenError> {
        Ok(RecordMap::new())
    }

    fn persist(&mut self, _records: &RecordMap) -> Result<(), CommitError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(CommitError::Io("injected I/O failure".to_string()))
        } else {
            Ok(())
        }
    }
}

fn flaky_manager() -> (LifecycleManager, Arc<AtomicBool>) {
    let mut bundle = ModelBundle::in_memory();
    bundle.register("Demo", TASK_MODEL);

    let fail = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&fail);
    let config = StackConfig::new("Demo", bundle).with_backend_factory(move || {
        Box::new(FlakyBackend {
            fail: Arc::clone(&flag),
        })
    });
    (LifecycleManager::new(config), fail)
}

fn title(value: &str) -> FieldMap {
    let mut fields = FieldMap::new();
    fields.insert("title".to_string(), json!(value));
    fields
}

#[test]
fn failed_persist_preserves_edits_and_retry_succeeds() {
    let (manager, fail) = flaky_manager();
    let main = manager.main_session().expect("main session");

    let id = main.insert("Task", title("pending")).expect("insert");

    fail.store(true, Ordering::SeqCst);
    let err = manager.persist().expect_err("persist must fail");
    assert!(matches!(err, StackError::Commit(_)));

    // The uncommitted edit is still in the working set and still readable.
    assert_eq!(main.pending_changes().expect("count"), 1);
    let record = main.get(&id).expect("get should succeed").expect("visible");
    assert_eq!(record.fields["title"], json!("pending"));

    // I/O restored: retry lands the edit durably.
    fail.store(false, Ordering::SeqCst);
    manager.persist().expect("retry should succeed");
    assert_eq!(main.pending_changes().expect("count"), 0);
    assert!(main.get(&id).expect("get should succeed").is_some());
}

#[test]
fn failed_background_save_keeps_changes_at_the_root() {
    let (manager, fail) = flaky_manager();
    let main = manager.main_session().expect("main session");
    let background = manager.new_background_session().expect("background session");

    let id = background.insert("Task", title("held back")).expect("insert");

    fail.store(true, Ordering::SeqCst);
    let err = background.save().expect_err("save must fail at commit");
    assert!(matches!(err, StackError::Commit(_)));

    // Absorption succeeded; the change now waits in the main working set.
    assert_eq!(background.pending_changes().expect("count"), 0);
    assert_eq!(main.pending_changes().expect("count"), 1);

    fail.store(false, Ordering::SeqCst);
    manager.persist().expect("retry should succeed");
    let record = main.get(&id).expect("get should succeed").expect("visible");
    assert_eq!(record.fields["title"], json!("held back"));
}

#[test]
fn persist_events_report_both_outcomes() {
    let (manager, fail) = flaky_manager();
    let main = manager.main_session().expect("main session");
    let events = manager
        .subscribe_persist_events()
        .expect("subscription should succeed");

    let id = main.insert("Task", title("observed")).expect("insert");

    fail.store(true, Ordering::SeqCst);
    let _ = manager.persist();
    match events.try_recv().expect("failure event should arrive") {
        PersistEvent::Failed { message } => assert!(message.contains("injected")),
        other => panic!("expected failure event, got {other:?}"),
    }

    fail.store(false, Ordering::SeqCst);
    manager.persist().expect("retry should succeed");
    match events.try_recv().expect("success event should arrive") {
        PersistEvent::Persisted { identities } => assert!(identities.contains(&id)),
        other => panic!("expected persisted event, got {other:?}"),
    }
}
