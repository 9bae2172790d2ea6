//! Tests for `ListenerRegistry`.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use promise_readable::{EventKind, Listener, ListenerRegistry, SourceEvent};

/// Helper: create a shared call-log that listeners append to.
fn make_log() -> Arc<Mutex<Vec<String>>> {
    Arc::new(Mutex::new(Vec::new()))
}

fn logging(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> Listener {
    let log = Arc::clone(log);
    Arc::new(move |event: &SourceEvent| {
        log.lock().unwrap().push(format!("{tag}:{}", event.kind()));
    })
}

// ============================================================================
// Basic subscription
// ============================================================================

#[test]
fn emit_calls_listeners_for_the_event_kind_only() {
    let registry = ListenerRegistry::new();
    let log = make_log();

    registry.on(EventKind::Data, logging(&log, "data"));
    registry.on(EventKind::End, logging(&log, "end"));

    assert!(registry.emit(&SourceEvent::Data(Bytes::from_static(b"x"))));

    assert_eq!(*log.lock().unwrap(), vec!["data:data"]);
}

#[test]
fn emit_calls_multiple_listeners_in_registration_order() {
    let registry = ListenerRegistry::new();
    let log = make_log();

    registry.on(EventKind::Close, logging(&log, "a"));
    registry.on(EventKind::Close, logging(&log, "b"));
    registry.on(EventKind::Close, logging(&log, "c"));

    registry.emit(&SourceEvent::Close);

    assert_eq!(*log.lock().unwrap(), vec!["a:close", "b:close", "c:close"]);
}

#[test]
fn emit_with_no_listeners_reports_nothing_called() {
    let registry = ListenerRegistry::new();
    assert!(!registry.emit(&SourceEvent::Open(42)));
}

// ============================================================================
// Unsubscription
// ============================================================================

#[test]
fn off_removes_listener_by_id() {
    let registry = ListenerRegistry::new();
    let log = make_log();

    let id = registry.on(EventKind::End, logging(&log, "end"));
    registry.off(EventKind::End, id);
    registry.emit(&SourceEvent::End);

    assert!(
        log.lock().unwrap().is_empty(),
        "listener should not fire after off()"
    );
}

#[test]
fn double_off_is_safe() {
    let registry = ListenerRegistry::new();
    let log = make_log();

    let id = registry.on(EventKind::End, logging(&log, "end"));
    registry.off(EventKind::End, id);
    // Second removal of the same ID should not panic
    registry.off(EventKind::End, id);
    registry.emit(&SourceEvent::End);

    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn off_with_the_wrong_kind_keeps_the_listener() {
    let registry = ListenerRegistry::new();
    let log = make_log();

    let id = registry.on(EventKind::End, logging(&log, "end"));
    registry.off(EventKind::Close, id);
    registry.emit(&SourceEvent::End);

    assert_eq!(*log.lock().unwrap(), vec!["end:end"]);
}

// ============================================================================
// Counts
// ============================================================================

#[test]
fn counts_reflect_registrations() {
    let registry = ListenerRegistry::new();
    assert_eq!(registry.size(), 0);

    let id1 = registry.on(EventKind::Data, Arc::new(|_: &SourceEvent| {}));
    let _id2 = registry.on(EventKind::Data, Arc::new(|_: &SourceEvent| {}));
    let _id3 = registry.on(EventKind::Error, Arc::new(|_: &SourceEvent| {}));
    assert_eq!(registry.listener_count(EventKind::Data), 2);
    assert_eq!(registry.size(), 3);

    registry.off(EventKind::Data, id1);
    assert_eq!(registry.listener_count(EventKind::Data), 1);

    registry.clear();
    assert_eq!(registry.size(), 0);
}

// ============================================================================
// Snapshot semantics during emit
// ============================================================================

#[test]
fn listener_added_during_emit_is_not_called_in_current_emission() {
    let registry = Arc::new(ListenerRegistry::new());
    let log = make_log();

    {
        let registry_clone = Arc::clone(&registry);
        let log_clone = Arc::clone(&log);
        registry.on(
            EventKind::Data,
            Arc::new(move |_: &SourceEvent| {
                log_clone.lock().unwrap().push("first".to_string());
                registry_clone.on(EventKind::Data, logging(&log_clone, "second"));
            }),
        );
    }

    registry.emit(&SourceEvent::Data(Bytes::new()));

    assert_eq!(*log.lock().unwrap(), vec!["first"]);
    assert_eq!(registry.listener_count(EventKind::Data), 2);
}

#[test]
fn listener_removed_during_emit_is_still_called_snapshot_semantics() {
    let registry = Arc::new(ListenerRegistry::new());
    let log = make_log();

    let id1 = registry.on(EventKind::Close, logging(&log, "first"));
    {
        let registry_clone = Arc::clone(&registry);
        let log_clone = Arc::clone(&log);
        // Registered second but removes the first; the snapshot was taken
        // before any callback ran, so the first still fires this round.
        registry.on(
            EventKind::Close,
            Arc::new(move |_: &SourceEvent| {
                log_clone.lock().unwrap().push("second".to_string());
                registry_clone.off(EventKind::Close, id1);
            }),
        );
    }

    registry.emit(&SourceEvent::Close);
    assert_eq!(*log.lock().unwrap(), vec!["first:close", "second"]);

    log.lock().unwrap().clear();
    registry.emit(&SourceEvent::Close);
    assert_eq!(*log.lock().unwrap(), vec!["second"]);
}

#[test]
fn listener_can_remove_itself_while_emitting() {
    let registry = Arc::new(ListenerRegistry::new());
    let log = make_log();
    let own_id = Arc::new(Mutex::new(None));

    let id = {
        let registry_clone = Arc::clone(&registry);
        let log_clone = Arc::clone(&log);
        let own_id = Arc::clone(&own_id);
        registry.on(
            EventKind::Open,
            Arc::new(move |event: &SourceEvent| {
                if let SourceEvent::Open(fd) = event {
                    log_clone.lock().unwrap().push(format!("open:{fd}"));
                }
                if let Some(id) = *own_id.lock().unwrap() {
                    registry_clone.off(EventKind::Open, id);
                }
            }),
        )
    };
    *own_id.lock().unwrap() = Some(id);

    registry.emit(&SourceEvent::Open(42));
    registry.emit(&SourceEvent::Open(43));

    assert_eq!(*log.lock().unwrap(), vec!["open:42"]);
    assert_eq!(registry.size(), 0);
}
