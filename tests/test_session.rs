use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeDelta, TimeZone, Utc};
use ember::application::ApplicationStore;
use ember::events::ServerEvents;
use ember::session::{SessionInfo, SessionStore};
use serde_json::json;

/// Events that record the ids of started and ended sessions.
fn recording_events() -> (ServerEvents, Arc<Mutex<Vec<String>>>, Arc<Mutex<Vec<SessionInfo>>>) {
    let started: Arc<Mutex<Vec<String>>> = Arc::default();
    let ended: Arc<Mutex<Vec<SessionInfo>>> = Arc::default();
    let (s, e) = (Arc::clone(&started), Arc::clone(&ended));

    let events = ServerEvents::new()
        .on_session_start(move |info| s.lock().unwrap().push(info.id.clone()))
        .on_session_end(move |info| e.lock().unwrap().push(info.clone()));

    (events, started, ended)
}

#[test]
fn test_session_ids_are_lowercase_hex() {
    let store = SessionStore::new();
    let id = store.create(&ServerEvents::new());

    assert_eq!(id.len(), 32);
    assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    assert_ne!(id, store.create(&ServerEvents::new()));
}

#[test]
fn test_create_registers_before_notifying() {
    let store = SessionStore::new();
    let observer = store.clone();
    let seen_in_store: Arc<Mutex<Option<bool>>> = Arc::default();
    let seen = Arc::clone(&seen_in_store);
    let events = ServerEvents::new().on_session_start(move |info| {
        *seen.lock().unwrap() = Some(observer.contains(&info.id));
    });

    store.create(&events);

    assert_eq!(*seen_in_store.lock().unwrap(), Some(true));
}

#[test]
fn test_sweep_removes_exactly_at_timeout() {
    let (events, _, ended) = recording_events();
    let store = SessionStore::new();
    let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
    let timeout = Duration::from_secs(60);

    let id = store.create_at(t0, &events);
    store.with_values(&id, |values| values.insert("user".into(), json!("alice")));

    let just_before = t0 + TimeDelta::seconds(59);
    assert_eq!(store.sweep_expired_at(just_before, timeout, &events), 0);
    assert!(store.contains(&id));

    let at_deadline = t0 + TimeDelta::seconds(60);
    assert_eq!(store.sweep_expired_at(at_deadline, timeout, &events), 1);
    assert!(!store.contains(&id));

    let ended = ended.lock().unwrap();
    assert_eq!(ended.len(), 1);
    assert_eq!(ended[0].id, id);
    assert_eq!(ended[0].values.get("user"), Some(&json!("alice")));
}

#[test]
fn test_touch_postpones_expiry() {
    let store = SessionStore::new();
    let events = ServerEvents::new();
    let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
    let timeout = Duration::from_secs(60);

    let id = store.create_at(t0, &events);
    assert!(store.touch_at(&id, t0 + TimeDelta::seconds(30)));

    assert_eq!(
        store.sweep_expired_at(t0 + TimeDelta::seconds(60), timeout, &events),
        0
    );
    assert_eq!(
        store.sweep_expired_at(t0 + TimeDelta::seconds(90), timeout, &events),
        1
    );
}

#[test]
fn test_touch_unknown_session() {
    let store = SessionStore::new();
    assert!(!store.touch("does-not-exist"));
}

#[test]
fn test_remove_fires_session_end() {
    let (events, started, ended) = recording_events();
    let store = SessionStore::new();

    let id = store.create(&events);
    assert!(store.remove(&id, &events));
    assert!(!store.remove(&id, &events));

    assert_eq!(*started.lock().unwrap(), vec![id.clone()]);
    assert_eq!(ended.lock().unwrap().len(), 1);
    assert!(store.is_empty());
}

#[test]
fn test_stop_ends_every_session() {
    let (events, _, ended) = recording_events();
    let store = SessionStore::new();
    store.create(&events);
    store.create(&events);
    store.create(&events);

    assert_eq!(store.stop(&events), 3);
    assert!(store.is_empty());
    assert_eq!(ended.lock().unwrap().len(), 3);
}

#[test]
fn test_end_callback_may_use_the_store() {
    let store = SessionStore::new();
    let inner = store.clone();
    let events = ServerEvents::new().on_session_end(move |_| {
        // Would deadlock if called with the lock held
        let _ = inner.len();
    });

    let id = store.create(&events);
    assert!(store.remove(&id, &events));
}

#[test]
fn test_lookup_returns_snapshot() {
    let store = SessionStore::new();
    let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
    let id = store.create_at(t0, &ServerEvents::new());
    store.with_values(&id, |values| values.insert("n".into(), json!(1)));

    let entry = store.lookup(&id).unwrap();
    assert_eq!(entry.last_access(), t0);
    assert_eq!(entry.values().get("n"), Some(&json!(1)));
    assert!(store.lookup("missing").is_none());
}

#[test]
fn test_application_store() {
    let app = ApplicationStore::new();
    let shared = app.clone();

    assert!(app.is_empty());
    assert_eq!(app.set("hits", 1), None);
    assert_eq!(shared.set("hits", 2), Some(json!(1)));
    assert_eq!(app.get("hits"), Some(json!(2)));
    assert!(app.contains("hits"));
    assert_eq!(app.len(), 1);
    assert_eq!(app.snapshot().get("hits"), Some(&json!(2)));
    assert_eq!(app.remove("hits"), Some(json!(2)));
    assert!(!shared.contains("hits"));
}

#[test]
fn test_concurrent_access_ends_each_session_once() {
    let (events, started, ended) = recording_events();
    let store = SessionStore::new();
    let later = Utc::now() + TimeDelta::days(1);

    let workers: Vec<_> = (0..8)
        .map(|worker| {
            let store = store.clone();
            let events = events.clone();
            std::thread::spawn(move || {
                for round in 0..200 {
                    let id = store.create(&events);
                    store.with_values(&id, |values| values.insert("worker".into(), json!(worker)));
                    store.touch(&id);
                    if round % 4 == 0 {
                        store.sweep_expired_at(later, Duration::from_secs(60), &events);
                    }
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    store.stop(&events);

    let started = started.lock().unwrap();
    let ended = ended.lock().unwrap();
    assert_eq!(started.len(), 8 * 200);

    let mut ended_ids: Vec<&str> = ended.iter().map(|info| info.id.as_str()).collect();
    ended_ids.sort_unstable();
    ended_ids.dedup();
    assert_eq!(ended_ids.len(), ended.len(), "a session ended twice");
    assert_eq!(ended.len(), started.len(), "a session was lost");
    assert!(store.is_empty());
}
