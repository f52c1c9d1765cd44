use std::sync::{Arc, Mutex};

use serde_json::json;

use crate::sync::engine::{AppData, Image, ImageTagLink, Inconsistency, SyncEngine, Tag};
use crate::sync::protocol::api::GalleryTransport;
use crate::sync::protocol::memory::MemoryTransport;
use crate::sync::protocol::wire::FilterState;
use crate::sync::runtime::{OrchestratorError, SyncOrchestrator};

// --- Helpers ---

fn seed() -> AppData {
    AppData::new(
        vec![
            Image {
                id: 1,
                source: "media/1.jpg".to_string(),
                description: "old".to_string(),
                tags: vec![],
            },
            Image {
                id: 2,
                source: "media/2.jpg".to_string(),
                description: String::new(),
                tags: vec![5],
            },
        ],
        vec![
            Tag {
                id: 5,
                name: "Beach".to_string(),
            },
            Tag {
                id: 7,
                name: "Family".to_string(),
            },
        ],
        vec![ImageTagLink {
            id: 11,
            image_id: 2,
            tag_id: 5,
        }],
    )
}

fn started() -> SyncOrchestrator<MemoryTransport> {
    let mut driver = SyncOrchestrator::new(SyncEngine::new(seed()), MemoryTransport::new());
    driver.start().expect("start");
    driver
}

// --- Tests ---

#[test]
fn start_attaches_exactly_one_listener() {
    let mut driver = started();
    assert!(driver.transport().is_subscribed());
    assert_eq!(driver.transport().subscribe_calls, 1);

    assert!(matches!(driver.start(), Err(OrchestratorError::AlreadyStarted)));
    assert_eq!(driver.transport().subscribe_calls, 1);
}

#[test]
fn frames_are_applied_in_delivery_order() {
    let mut driver = started();
    let t = driver.transport_mut();
    t.push_frame(r#"{"type":"tagAdded","id":10,"imageId":1,"tagId":7}"#);
    t.push_frame(r#"{"type":"tagRemoved","id":10,"imageId":1,"tagId":7}"#);
    t.push_frame(r#"{"type":"tagAdded","id":12,"imageId":1,"tagId":5}"#);

    assert_eq!(driver.pump(), 3);

    let snap = driver.snapshot();
    assert_eq!(snap.data.image(1).unwrap().tags, vec![5]);
    assert_eq!(snap.revision, 3);
    assert!(snap.check_consistency().is_empty());
}

#[test]
fn inbound_filter_change_sends_active_filters() {
    let mut driver = started();
    driver
        .transport_mut()
        .push_frame(r#"{"type":"filterChange","filterState":"on","filterId":7}"#);

    driver.pump();

    assert_eq!(driver.snapshot().active_filters.as_slice(), &[7]);
    assert_eq!(
        driver.transport().sent_json(),
        vec![json!({"type": "activeFilters", "activeFilters": [7]})]
    );
}

#[test]
fn toggle_filter_updates_locally_before_any_reply() {
    let mut driver = started();

    driver.toggle_filter(5, FilterState::On).unwrap();
    driver.toggle_filter(7, FilterState::On).unwrap();
    driver.toggle_filter(5, FilterState::Off).unwrap();

    assert_eq!(driver.snapshot().active_filters.as_slice(), &[7]);
    assert_eq!(
        driver.transport().sent_json(),
        vec![
            json!({"type": "activeFilters", "activeFilters": [5]}),
            json!({"type": "activeFilters", "activeFilters": [5, 7]}),
            json!({"type": "activeFilters", "activeFilters": [7]}),
        ]
    );
}

#[test]
fn apply_filters_reply_narrows_rendered_list() {
    let mut driver = started();
    driver.toggle_filter(5, FilterState::On).unwrap();
    driver
        .transport_mut()
        .push_frame(r#"{"type":"applyFilters","results":[2]}"#);

    driver.pump();

    let snap = driver.snapshot();
    assert_eq!(snap.rendered_ids(), vec![2]);
    assert_eq!(snap.data.images.len(), 2);
}

#[test]
fn edit_description_is_sent_not_assumed() {
    let mut driver = started();

    driver.edit_description(1, "new words").unwrap();

    assert_eq!(driver.snapshot().data.image(1).unwrap().description, "old");
    assert_eq!(
        driver.transport().sent_json(),
        vec![json!({"type": "updateDescription", "imageId": 1, "description": "new words"})]
    );
}

#[test]
fn delete_and_update_tags_are_fire_and_forget() {
    let mut driver = started();

    driver.delete_image(2).unwrap();
    driver.update_tags(1, &[5, 7]).unwrap();
    driver.announce_filter_change("Beach", 5).unwrap();

    assert_eq!(driver.snapshot().revision, 0);
    assert_eq!(
        driver.transport().sent_json(),
        vec![
            json!({"type": "deleteImage", "imageId": 2}),
            json!({"type": "updateTags", "imageId": 1, "tagArray": [{"id": 5}, {"id": 7}]}),
            json!({"type": "filterChange", "filterName": "Beach", "filterId": 5}),
        ]
    );

    // Confirmation arrives later.
    driver
        .transport_mut()
        .push_frame(r#"{"type":"imageDeleted","id":"2"}"#);
    driver.pump();
    assert!(driver.snapshot().data.image(2).is_none());
    assert!(driver.snapshot().data.links.is_empty());
}

#[test]
fn bad_frames_are_dropped_and_processing_continues() {
    let mut driver = started();
    let t = driver.transport_mut();
    t.push_frame("not json at all");
    t.push_frame(r#"{"type":"tagAdded","id":10}"#);
    t.push_frame(r#"{"type":"somethingNew","x":1}"#);
    t.push_frame(r#"{"type":"tagAdded","id":10,"imageId":1,"tagId":7}"#);

    assert_eq!(driver.pump(), 4);

    assert_eq!(driver.snapshot().data.image(1).unwrap().tags, vec![7]);
    let stats = driver.stats();
    assert_eq!(stats.frames_handled, 4);
    assert_eq!(stats.decode_errors, 2);
}

#[test]
fn drift_is_reported_and_skipped() {
    let seen: Arc<Mutex<Vec<Inconsistency>>> = Arc::new(Mutex::new(vec![]));
    let sink = seen.clone();

    let mut driver = SyncOrchestrator::new(SyncEngine::new(seed()), MemoryTransport::new())
        .with_drift_notifier(move |d| sink.lock().unwrap().push(d.clone()));
    driver.start().unwrap();

    driver
        .transport_mut()
        .push_frame(r#"{"type":"tagAdded","id":10,"imageId":99,"tagId":5}"#);
    driver.pump();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![Inconsistency::UnknownImage {
            event: "tagAdded",
            image_id: 99
        }]
    );
    assert_eq!(driver.stats().drift_reports, 1);
    assert_eq!(driver.snapshot().revision, 0);
}

#[test]
fn change_notifier_sees_each_new_snapshot() {
    let revisions: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(vec![]));
    let sink = revisions.clone();

    let mut driver = SyncOrchestrator::new(SyncEngine::new(seed()), MemoryTransport::new())
        .with_change_notifier(move |snap| sink.lock().unwrap().push(snap.revision));
    driver.start().unwrap();

    let t = driver.transport_mut();
    t.push_frame(r#"{"type":"tagAdded","id":10,"imageId":1,"tagId":7}"#);
    t.push_frame(r#"{"type":"tagRemoved","id":404,"imageId":1,"tagId":7}"#);
    t.push_frame(r#"{"type":"imageDeleted","id":1}"#);
    driver.pump();

    // The missing-link removal is a no-op and produces no new snapshot.
    assert_eq!(*revisions.lock().unwrap(), vec![1, 2]);
}

#[test]
fn send_failure_does_not_undo_local_state() {
    let mut driver = started();
    driver.transport_mut().fail_sends = true;

    driver.toggle_filter(5, FilterState::On).unwrap();

    assert_eq!(driver.snapshot().active_filters.as_slice(), &[5]);
    assert_eq!(driver.stats().send_failures, 1);
    assert!(driver.transport().sent.is_empty());
}

#[test]
fn no_state_changes_after_shutdown() {
    let mut driver = started();
    driver
        .transport_mut()
        .push_frame(r#"{"type":"tagAdded","id":10,"imageId":1,"tagId":7}"#);
    driver.pump();
    let before = driver.snapshot();

    driver.shutdown();
    assert!(!driver.transport().is_subscribed());
    assert_eq!(driver.transport().unsubscribe_calls, 1);

    // Frames delivered after teardown never reach the engine.
    driver
        .transport_mut()
        .push_frame(r#"{"type":"imageDeleted","id":1}"#);
    assert_eq!(driver.transport().dropped, 1);
    assert_eq!(driver.pump(), 0);
    assert!(Arc::ptr_eq(&before, &driver.snapshot()));

    assert!(matches!(
        driver.toggle_filter(5, FilterState::On),
        Err(OrchestratorError::ShutDown)
    ));
    assert!(matches!(driver.start(), Err(OrchestratorError::ShutDown)));
    assert!(Arc::ptr_eq(&before, &driver.snapshot()));
}

#[test]
fn shutdown_discards_frames_still_queued() {
    let mut driver = started();
    driver
        .transport_mut()
        .push_frame(r#"{"type":"imageDeleted","id":1}"#);

    driver.shutdown();

    assert!(driver.transport().inbound.is_empty());
    assert_eq!(driver.pump(), 0);
    assert!(driver.snapshot().data.image(1).is_some());
}

#[test]
fn frames_are_ignored_before_start() {
    let mut driver = SyncOrchestrator::new(SyncEngine::new(seed()), MemoryTransport::new());
    driver
        .transport_mut()
        .push_frame(r#"{"type":"imageDeleted","id":1}"#);

    assert_eq!(driver.pump(), 0);
    assert_eq!(driver.transport().dropped, 1);
}

#[test]
fn run_until_closed_drains_then_returns() {
    let mut driver = started();
    let t = driver.transport_mut();
    t.push_frame(r#"{"type":"tagAdded","id":10,"imageId":1,"tagId":7}"#);
    t.push_frame(r#"{"type":"applyFilters","results":[1]}"#);
    t.close();

    driver.run_until_closed(std::time::Duration::from_millis(1));

    let snap = driver.snapshot();
    assert_eq!(snap.rendered_ids(), vec![1]);
    assert_eq!(snap.data.image(1).unwrap().tags, vec![7]);
}
