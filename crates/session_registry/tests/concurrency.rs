//! Concurrency tests for the session registry
//!
//! These tests hammer the registry from many threads and tokio tasks at once
//! and check that no increment is ever lost.

use session_registry::{LiveHandle, SessionId, SessionRegistry, SessionValue};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

struct Connection {
    online: AtomicBool,
}

impl LiveHandle for Connection {
    fn is_connected(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

fn registered(registry: &SessionRegistry, name: &str, initial: i64) -> SessionId {
    let id = SessionId::new();
    let value = SessionValue::create(id, name, None)
        .unwrap()
        .with_increment(initial)
        .unwrap();
    registry.add(value);
    id
}

#[test]
fn test_no_lost_updates_across_threads() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 1_250;

    let registry = SessionRegistry::new();
    let id = registered(&registry, "p1", 7);

    std::thread::scope(|scope| {
        for _ in 0..THREADS {
            scope.spawn(|| {
                for _ in 0..PER_THREAD {
                    assert!(registry.update(&id, |v| v.with_increment(1).unwrap()));
                }
            });
        }
    });

    let total = (THREADS * PER_THREAD) as u64;
    assert_eq!(registry.get(&id).unwrap().counter(), 7 + total);
    assert_eq!(registry.stats().updates_applied, total);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_no_lost_updates_across_tasks() {
    const TASKS: usize = 10_000;

    let registry = Arc::new(SessionRegistry::new());
    let id = registered(&registry, "p1", 0);

    let handles: Vec<_> = (0..TASKS)
        .map(|_| {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.update(&id, |v| v.with_increment(1).unwrap()) })
        })
        .collect();

    let results = futures::future::join_all(handles).await;
    assert!(results.into_iter().all(|r| r.unwrap()));
    assert_eq!(registry.get(&id).unwrap().counter(), TASKS as u64);
}

#[test]
fn test_unrelated_sessions_update_independently() {
    let registry = SessionRegistry::new();
    let ids: Vec<_> = (0..16)
        .map(|i| registered(&registry, &format!("p{i}"), 0))
        .collect();

    std::thread::scope(|scope| {
        for id in &ids {
            let registry = &registry;
            scope.spawn(move || {
                for _ in 0..500 {
                    registry.update(id, |v| v.with_increment(2).unwrap());
                }
            });
        }
    });

    for id in &ids {
        assert_eq!(registry.get(id).unwrap().counter(), 1_000);
    }
}

#[test]
fn test_updates_racing_removal_never_resurrect() {
    let registry = SessionRegistry::new();
    let id = registered(&registry, "p1", 0);

    std::thread::scope(|scope| {
        scope.spawn(|| {
            for _ in 0..2_000 {
                registry.update(&id, |v| v.with_increment(1).unwrap());
            }
        });
        scope.spawn(|| {
            registry.remove(&id);
        });
    });

    assert!(registry.get(&id).is_none());
    assert!(!registry.update(&id, |v| v.with_increment(1).unwrap()));
}

#[test]
fn test_reconnect_keeps_counter_when_carried_over() {
    let registry = SessionRegistry::new();
    let first: Arc<dyn LiveHandle> = Arc::new(Connection {
        online: AtomicBool::new(true),
    });
    let id = SessionId::new();
    registry.add(SessionValue::create(id, "p1", Some(&first)).unwrap());
    registry.update(&id, |v| v.with_increment(5).unwrap());

    drop(first);
    assert!(!registry.get(&id).unwrap().is_active());

    let second: Arc<dyn LiveHandle> = Arc::new(Connection {
        online: AtomicBool::new(true),
    });
    assert!(registry.update(&id, |v| v.with_live_handle(Some(&second))));

    let current = registry.get(&id).unwrap();
    assert!(current.is_active());
    assert_eq!(current.counter(), 5);
    assert_eq!(registry.prune_inactive(), 0);
}

#[test]
fn test_end_to_end_lifecycle() {
    let registry = SessionRegistry::new();
    let a = SessionId::new();

    registry.add(SessionValue::create(a, "p1", None).unwrap());
    assert_eq!(registry.get(&a).unwrap().counter(), 0);

    assert!(registry.update(&a, |v| v.with_increment(1).unwrap()));
    assert_eq!(registry.get(&a).unwrap().counter(), 1);

    assert!(registry.update(&a, |v| v.with_increment(1).unwrap()));
    assert_eq!(registry.get(&a).unwrap().counter(), 2);

    registry.remove(&a);
    assert!(registry.get(&a).is_none());
}
