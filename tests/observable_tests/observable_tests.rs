//! Tests for ObservableStorage
//!
//! These tests verify:
//! - Every successful mutation raises exactly one event
//! - Batches notify once, for their first entry
//! - Failed writes and removals raise nothing
//! - Observer errors reach the caller without undoing the write
//! - Subscription management

use std::sync::Arc;

use parking_lot::Mutex;
use pathkv::{
    dynamic, Backend, ChangeEvent, ConfigStore, DynValue, IniBackend, ObservableStorage,
    PathKvError,
};

// =============================================================================
// Helper Functions
// =============================================================================

type Events = Arc<Mutex<Vec<ChangeEvent>>>;

fn recording_store() -> (ConfigStore, Events) {
    let events: Events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);

    let store = ConfigStore::<IniBackend>::default().observed_by(
        move |event: &ChangeEvent, _: &dyn Backend| {
            sink.lock().push(event.clone());
            Ok(())
        },
    );
    (store, events)
}

// =============================================================================
// Single Mutation Tests
// =============================================================================

#[test]
fn test_set_notifies() {
    let (mut store, events) = recording_store();

    store.set("App.Width", 800i32).unwrap();
    store.set_str("App.Name", "Demo").unwrap();

    assert_eq!(
        *events.lock(),
        vec![
            ChangeEvent::new("App.Width", "800"),
            ChangeEvent::new("App.Name", "Demo"),
        ]
    );
}

#[test]
fn test_array_notification_is_joined() {
    let (mut store, events) = recording_store();

    store.set_array("App.Ports", vec![80u16, 443]).unwrap();

    assert_eq!(*events.lock(), vec![ChangeEvent::new("App.Ports", "80,443")]);
}

#[test]
fn test_failed_write_does_not_notify() {
    let (mut store, events) = recording_store();

    assert!(store.set("Section.", 1i32).is_err());
    assert!(events.lock().is_empty());
}

#[test]
fn test_remove_does_not_notify() {
    let (mut store, events) = recording_store();
    store.set_str("App.Name", "Demo").unwrap();

    assert!(store.remove("App.Name"));
    assert_eq!(events.lock().len(), 1);
}

// =============================================================================
// Batch Tests
// =============================================================================

#[test]
fn test_batch_notifies_first_entry_only() {
    let (mut store, events) = recording_store();

    store.set_many(vec![("A.p1", 1i32), ("A.p2", 2)]).unwrap();

    assert_eq!(*events.lock(), vec![ChangeEvent::new("A.p1", "1")]);
    assert_eq!(store.get::<i32>("A.p1").unwrap(), 1);
    assert_eq!(store.get::<i32>("A.p2").unwrap(), 2);
}

#[test]
fn test_dynamic_batch_notifies_first_entry_only() {
    let (mut store, events) = recording_store();

    let batch: Vec<(&str, DynValue)> = vec![
        ("A.list", dynamic(vec![1i32, 2])),
        ("A.name", dynamic("x".to_string())),
    ];
    store.set_many_dynamic(batch).unwrap();

    assert_eq!(*events.lock(), vec![ChangeEvent::new("A.list", "1,2")]);
    assert_eq!(store.get_str("A.name").unwrap(), "x");
}

#[test]
fn test_empty_batch_notifies_nothing() {
    let (mut store, events) = recording_store();

    store.set_many(Vec::<(&str, i32)>::new()).unwrap();
    store.set_many_dynamic(Vec::<(&str, DynValue)>::new()).unwrap();

    assert!(events.lock().is_empty());
}

// =============================================================================
// Observer Behavior Tests
// =============================================================================

#[test]
fn test_observers_run_in_order() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let mut store: ConfigStore = ConfigStore::default();

    for tag in ["first", "second"] {
        let order = Arc::clone(&order);
        store.subscribe(move |_: &ChangeEvent, _: &dyn Backend| {
            order.lock().push(tag);
            Ok(())
        });
    }

    store.set_str("A.x", "1").unwrap();
    assert_eq!(*order.lock(), vec!["first", "second"]);
}

#[test]
fn test_observer_sees_updated_backend() {
    let seen = Arc::new(Mutex::new(String::new()));
    let sink = Arc::clone(&seen);

    let mut store = ObservableStorage::new(IniBackend::new());
    store.subscribe(move |_: &ChangeEvent, backend: &dyn Backend| {
        *sink.lock() = String::from_utf8(backend.to_bytes()?).unwrap_or_default();
        Ok(())
    });

    store.set_str("App.Name", "Demo").unwrap();
    assert_eq!(*seen.lock(), "[App]\nName=Demo\n");
}

#[test]
fn test_observer_error_propagates_and_write_is_kept() {
    let (mut store, events) = recording_store();
    store.subscribe(|_: &ChangeEvent, _: &dyn Backend| {
        Err(PathKvError::NotSupported("read-only mirror".to_string()))
    });
    let after = Arc::clone(&events);
    store.subscribe(move |event: &ChangeEvent, _: &dyn Backend| {
        after.lock().push(ChangeEvent::new("after", event.value.clone()));
        Ok(())
    });

    let result = store.set_str("A.x", "1");

    assert!(matches!(result, Err(PathKvError::NotSupported(_))));
    assert_eq!(store.get_str("A.x").unwrap(), "1");
    // The observer after the failing one is skipped
    assert_eq!(*events.lock(), vec![ChangeEvent::new("A.x", "1")]);
}

#[test]
fn test_unsubscribe() {
    let (mut store, events) = recording_store();
    let extra = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&extra);

    let id = store.subscribe(move |_: &ChangeEvent, _: &dyn Backend| {
        *counter.lock() += 1;
        Ok(())
    });
    assert_eq!(store.observer_count(), 2);

    store.set_str("A.x", "1").unwrap();
    assert!(store.unsubscribe(id));
    assert!(!store.unsubscribe(id));
    store.set_str("A.x", "2").unwrap();

    assert_eq!(*extra.lock(), 1);
    assert_eq!(events.lock().len(), 2);
    assert_eq!(store.observer_count(), 1);
}

#[test]
fn test_shared_across_threads() {
    let (store, events) = recording_store();
    let store = Arc::new(Mutex::new(store));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                store.lock().set(&format!("T.k{}", t), t).unwrap();
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(events.lock().len(), 4);
    assert_eq!(store.lock().paths().len(), 4);
}
