//! Integration tests for the save/merge protocol: background changes
//! become visible to the foreground exactly once saved, concurrent writers
//! do not corrupt each other, and conflicts resolve last-absorbed-wins.

use serde_json::json;
use std::sync::Mutex;
use strata_stack::{EntityId, FieldMap, LifecycleManager, ModelBundle, StackConfig};

const TASK_MODEL: &str = r#"{
    "entities": [
        {
            "name": "Task",
            "attributes": [
                { "name": "title", "kind": "text" },
                { "name": "done", "kind": "boolean", "optional": true }
            ]
        }
    ]
}"#;

fn demo_manager() -> LifecycleManager {
    let mut bundle = ModelBundle::in_memory();
    bundle.register("Demo", TASK_MODEL);
    LifecycleManager::new(StackConfig::new("Demo", bundle))
}

fn title(value: &str) -> FieldMap {
    let mut fields = FieldMap::new();
    fields.insert("title".to_string(), json!(value));
    fields
}

#[test]
fn background_save_is_visible_from_main() {
    let manager = demo_manager();
    let main = manager.main_session().expect("main session");

    let id = manager
        .perform_in_background(|session| session.insert("Task", title("from background")))
        .expect("background work should succeed");

    let record = main.get(&id).expect("get should succeed").expect("visible");
    assert_eq!(record.fields["title"], json!("from background"));
}

#[test]
fn background_changes_are_invisible_until_saved() {
    let manager = demo_manager();
    let main = manager.main_session().expect("main session");
    let background = manager.new_background_session().expect("background session");

    let id = background
        .insert("Task", title("unsaved"))
        .expect("insert should succeed");
    assert!(main.get(&id).expect("get should succeed").is_none());

    background.save().expect("save should succeed");
    assert!(main.get(&id).expect("get should succeed").is_some());
}

#[test]
fn failing_background_work_saves_nothing() {
    let manager = demo_manager();
    let main = manager.main_session().expect("main session");

    let captured: Mutex<Option<EntityId>> = Mutex::new(None);
    let result = manager.perform_in_background(|session| {
        let id = session.insert("Task", title("doomed"))?;
        *captured.lock().expect("test mutex") = Some(id);
        Err::<(), _>(strata_stack::StackError::StaleSession)
    });
    assert!(result.is_err());

    let id = (*captured.lock().expect("test mutex")).expect("work ran before failing");
    assert!(main.get(&id).expect("get should succeed").is_none());
    assert_eq!(main.pending_changes().expect("count"), 0);
}

#[test]
fn concurrent_disjoint_saves_are_all_reflected() {
    let manager = demo_manager();
    let main = manager.main_session().expect("main session");

    let writers = 8;
    let per_writer = 5;
    let ids: Mutex<Vec<EntityId>> = Mutex::new(Vec::new());

    std::thread::scope(|scope| {
        for writer in 0..writers {
            let manager = &manager;
            let ids = &ids;
            scope.spawn(move || {
                let session = manager
                    .new_background_session()
                    .expect("background session");
                let mut local = Vec::new();
                for item in 0..per_writer {
                    let id = session
                        .insert("Task", title(&format!("writer-{writer}-{item}")))
                        .expect("insert should succeed");
                    local.push(id);
                }
                session.save().expect("save should succeed");
                ids.lock().expect("test mutex").extend(local);
            });
        }
    });

    let ids = ids.into_inner().expect("test mutex");
    assert_eq!(ids.len(), writers * per_writer);
    for id in &ids {
        assert!(
            main.get(id).expect("get should succeed").is_some(),
            "identity {id} lost"
        );
    }
}

#[test]
fn conflicting_saves_resolve_to_last_absorbed() {
    let manager = demo_manager();
    let main = manager.main_session().expect("main session");

    let id = main.insert("Task", title("base")).expect("insert");
    manager.persist().expect("persist should succeed");

    let first = manager.new_background_session().expect("first session");
    let second = manager.new_background_session().expect("second session");
    first.update(id, title("first")).expect("update");
    second.update(id, title("second")).expect("update");

    // Fixed absorption order: first, then second. Deterministic outcome.
    first.save().expect("first save");
    second.save().expect("second save");

    let record = main.get(&id).expect("get should succeed").expect("visible");
    assert_eq!(record.fields["title"], json!("second"));
}

#[test]
fn conflicting_concurrent_saves_yield_one_writers_value() {
    let manager = demo_manager();
    let main = manager.main_session().expect("main session");

    let id = main.insert("Task", title("base")).expect("insert");
    manager.persist().expect("persist should succeed");

    std::thread::scope(|scope| {
        for value in ["left", "right"] {
            let manager = &manager;
            scope.spawn(move || {
                let session = manager
                    .new_background_session()
                    .expect("background session");
                session.update(id, title(value)).expect("update");
                session.save().expect("save should succeed");
            });
        }
    });

    // Whichever absorption ran last won; never a torn or mixed value.
    let record = main.get(&id).expect("get should succeed").expect("visible");
    let title = record.fields["title"].as_str().expect("title is text");
    assert!(title == "left" || title == "right", "unexpected value {title}");
}

#[test]
fn task_title_update_round_trip() {
    // Open in-memory store → main creates Task{title:"a"} → persist →
    // background updates to "b" → save → main observes "b".
    let manager = demo_manager();
    let main = manager.main_session().expect("main session");

    let id = main.insert("Task", title("a")).expect("insert");
    manager.persist().expect("persist should succeed");

    manager
        .perform_in_background(|session| {
            let record = session
                .get(&id)?
                .expect("background must see the committed task");
            assert_eq!(record.fields["title"], json!("a"));
            session.update(id, title("b"))
        })
        .expect("background update should succeed");

    let record = main.get(&id).expect("get should succeed").expect("visible");
    assert_eq!(record.fields["title"], json!("b"));
}
