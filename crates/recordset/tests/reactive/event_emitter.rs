//! Tests for `EventEmitter<T>`.

use std::sync::Arc;

use parking_lot::Mutex;
use recordset::reactive::EventEmitter;

fn make_log() -> Arc<Mutex<Vec<String>>> {
    Arc::new(Mutex::new(Vec::new()))
}

// ============================================================================
// Subscription
// ============================================================================

#[test]
fn emit_calls_listeners_in_registration_order() {
    let emitter: EventEmitter<i32> = EventEmitter::new();
    let log = make_log();

    for name in ["a", "b", "c"] {
        let log = Arc::clone(&log);
        emitter.on(move |e| log.lock().push(format!("{name}:{e}")));
    }

    emitter.emit(&1);

    assert_eq!(*log.lock(), vec!["a:1", "b:1", "c:1"]);
}

#[test]
fn off_removes_listener() {
    let emitter: EventEmitter<i32> = EventEmitter::new();
    let log = make_log();
    let log_clone = Arc::clone(&log);

    let id = emitter.on(move |e| log_clone.lock().push(format!("{e}")));
    assert!(emitter.off(id));
    emitter.emit(&99);

    assert!(log.lock().is_empty(), "listener should not fire after off()");
    assert!(emitter.is_empty());
}

#[test]
fn off_unknown_id_returns_false() {
    let emitter: EventEmitter<i32> = EventEmitter::new();
    let id = emitter.on(|_| {});
    assert!(emitter.off(id));
    assert!(!emitter.off(id));
}

// ============================================================================
// Snapshot semantics
// ============================================================================

#[test]
fn listener_removed_during_emit_still_runs_that_round() {
    let emitter: Arc<EventEmitter<i32>> = Arc::new(EventEmitter::new());
    let log = make_log();

    let second_id = Arc::new(Mutex::new(None));
    {
        let emitter_ref = Arc::clone(&emitter);
        let second_id = Arc::clone(&second_id);
        emitter.on(move |_| {
            if let Some(id) = second_id.lock().take() {
                emitter_ref.off(id);
            }
        });
    }
    {
        let log = Arc::clone(&log);
        let id = emitter.on(move |e| log.lock().push(format!("second:{e}")));
        *second_id.lock() = Some(id);
    }

    emitter.emit(&1);
    emitter.emit(&2);

    assert_eq!(*log.lock(), vec!["second:1"]);
}

#[test]
fn listener_added_during_emit_runs_next_round() {
    let emitter: Arc<EventEmitter<i32>> = Arc::new(EventEmitter::new());
    let log = make_log();
    let added = Arc::new(Mutex::new(false));

    {
        let emitter_ref = Arc::clone(&emitter);
        let log = Arc::clone(&log);
        let added = Arc::clone(&added);
        emitter.on(move |_| {
            let mut added = added.lock();
            if !*added {
                *added = true;
                let log = Arc::clone(&log);
                emitter_ref.on(move |e| log.lock().push(format!("late:{e}")));
            }
        });
    }

    emitter.emit(&1);
    assert!(log.lock().is_empty());

    emitter.emit(&2);
    assert_eq!(*log.lock(), vec!["late:2"]);
}

#[test]
fn listener_may_emit_recursively() {
    let emitter: Arc<EventEmitter<i32>> = Arc::new(EventEmitter::new());
    let log = make_log();

    {
        let emitter_ref = Arc::clone(&emitter);
        let log = Arc::clone(&log);
        emitter.on(move |e| {
            log.lock().push(format!("{e}"));
            if *e < 3 {
                emitter_ref.emit(&(e + 1));
            }
        });
    }

    emitter.emit(&1);

    assert_eq!(*log.lock(), vec!["1", "2", "3"]);
}

#[test]
fn len_tracks_listeners() {
    let emitter: EventEmitter<()> = EventEmitter::default();
    assert_eq!(emitter.len(), 0);
    let a = emitter.on(|_| {});
    emitter.on(|_| {});
    assert_eq!(emitter.len(), 2);
    emitter.off(a);
    assert_eq!(emitter.len(), 1);
}

// ============================================================================
// Weak listeners
// ============================================================================

#[test]
fn weak_listener_receives_live_owner() {
    let emitter: EventEmitter<i32> = EventEmitter::new();
    let owner = Arc::new(Mutex::new(Vec::new()));

    emitter.on_weak(&owner, |owner, e| owner.lock().push(*e));
    emitter.emit(&4);

    assert_eq!(*owner.lock(), vec![4]);
}

#[test]
fn weak_listener_does_not_keep_owner_alive_and_drops_out() {
    let emitter: EventEmitter<i32> = EventEmitter::new();
    let calls = make_log();
    let owner = Arc::new(());
    {
        let calls = Arc::clone(&calls);
        emitter.on_weak(&owner, move |_, e| calls.lock().push(format!("{e}")));
    }
    assert_eq!(Arc::strong_count(&owner), 1);

    drop(owner);
    emitter.emit(&1);

    assert!(calls.lock().is_empty());
    assert!(emitter.is_empty(), "orphaned listener is pruned");
}
