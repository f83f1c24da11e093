//! Engine behavior against an in-memory backend.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::mock_backend::{MockBackend, engines};
use named_lock_core::prelude::*;
use tokio::time::Instant;

#[tokio::test]
async fn test_acquire_then_is_locked() {
    let engines = engines(2);
    for name in ["job-42", "", "with spaces", "ünïcode"] {
        assert!(engines[0].try_acquire_lock(name).await.unwrap());
        assert!(engines[0].is_locked(name).await.unwrap());
        assert!(engines[1].is_locked(name).await.unwrap());
    }
}

#[tokio::test]
async fn test_release_unlocked_name_is_idempotent() {
    let engines = engines(1);
    let engine = &engines[0];

    assert!(engine.release_lock("never-acquired").await.unwrap());
    assert!(!engine.is_locked("never-acquired").await.unwrap());

    assert!(engine.try_acquire_lock("job").await.unwrap());
    assert!(engine.release_lock("job").await.unwrap());
    assert!(engine.release_lock("job").await.unwrap());
    assert!(!engine.is_locked("job").await.unwrap());
}

#[tokio::test]
async fn test_is_locked_leaves_registry_alone() {
    let engines = engines(2);
    assert!(engines[1].try_acquire_lock("job").await.unwrap());

    assert!(engines[0].is_locked("job").await.unwrap());
    assert!(!engines[0].is_held("job"));
    assert_eq!(engines[0].backend().grant_count(), 0);
}

#[tokio::test]
async fn test_reentrant_acquire_does_not_reach_backend() {
    let engines = engines(1);
    let engine = &engines[0];

    assert!(engine.acquire_lock("job", None).await.unwrap());
    assert!(engine.acquire_lock("job", Duration::from_millis(10)).await.unwrap());
    assert!(engine.try_acquire_lock("job").await.unwrap());

    assert_eq!(engine.backend().grant_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_immediate_never_waits() {
    let engines = engines(2);
    assert!(engines[0].try_acquire_lock("job").await.unwrap());

    let start = Instant::now();
    assert!(!engines[1].acquire_lock("job", Duration::ZERO).await.unwrap());
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(engines[1].backend().grant_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_bounded_wait_gives_up_after_timeout() {
    let engines = engines(2);
    let poll = engines[1].poll_interval();
    assert!(engines[0].try_acquire_lock("job").await.unwrap());

    let timeout = Duration::from_millis(50);
    let start = Instant::now();
    assert!(!engines[1].acquire_lock("job", timeout).await.unwrap());
    let elapsed = start.elapsed();

    assert!(elapsed + poll >= timeout, "returned early: {elapsed:?}");
    assert!(elapsed <= timeout + 2 * poll, "returned late: {elapsed:?}");
    assert!(!engines[1].is_held("job"));
}

#[tokio::test(start_paused = true)]
async fn test_waiter_acquires_once_holder_releases() {
    let engines = engines(2);
    let (a, b) = (&engines[0], &engines[1]);
    let poll = b.poll_interval();
    assert!(a.try_acquire_lock("job-42").await.unwrap());

    let start = Instant::now();
    let (acquired, released) = tokio::join!(
        async {
            let acquired = b.acquire_lock("job-42", Duration::from_millis(50)).await;
            (acquired, start.elapsed())
        },
        async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            a.release_lock("job-42").await
        },
    );

    assert!(released.unwrap());
    let (acquired, elapsed) = acquired;
    assert!(acquired.unwrap());
    assert!(elapsed >= Duration::from_millis(20), "acquired early: {elapsed:?}");
    assert!(
        elapsed <= Duration::from_millis(20) + 2 * poll,
        "acquired late: {elapsed:?}"
    );
    assert!(b.is_held("job-42"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_engines_have_one_winner() {
    let engines: Vec<_> = engines(8).into_iter().map(Arc::new).collect();

    let tasks: Vec<_> = engines
        .iter()
        .cloned()
        .map(|engine| tokio::spawn(async move { engine.try_acquire_lock("job-42").await }))
        .collect();

    let mut winners = 0;
    for task in tasks {
        if task.await.unwrap().unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn test_foreign_release_is_refused() {
    let engines = engines(2);
    assert!(engines[0].try_acquire_lock("job").await.unwrap());

    assert!(!engines[1].release_lock("job").await.unwrap());
    assert!(engines[0].is_locked("job").await.unwrap());
    assert!(engines[0].is_held("job"));
}

#[tokio::test]
async fn test_flag_mode_single_release_frees_nested_acquires() {
    let engines = engines(2);
    assert!(engines[0].try_acquire_lock("job").await.unwrap());
    assert!(engines[0].try_acquire_lock("job").await.unwrap());

    assert!(engines[0].release_lock("job").await.unwrap());
    assert!(!engines[0].is_held("job"));
    assert!(engines[1].try_acquire_lock("job").await.unwrap());
}

#[tokio::test]
async fn test_counted_mode_releases_on_outermost_call() {
    let store = common::mock_backend::SharedStore::default();
    let engine = LockEngine::builder(MockBackend::new(1, store.clone()))
        .reentrancy(ReentrancyMode::Counted)
        .build();
    let other = LockEngine::new(MockBackend::new(2, store));

    assert!(engine.try_acquire_lock("job").await.unwrap());
    assert!(engine.try_acquire_lock("job").await.unwrap());

    assert!(engine.release_lock("job").await.unwrap());
    assert_eq!(engine.backend().release_count(), 0);
    assert!(!other.try_acquire_lock("job").await.unwrap());

    assert!(engine.release_lock("job").await.unwrap());
    assert_eq!(engine.backend().release_count(), 1);
    assert!(other.try_acquire_lock("job").await.unwrap());
}

#[tokio::test]
async fn test_clear_lock_forgets_without_releasing() {
    let engines = engines(2);
    assert!(engines[0].try_acquire_lock("job").await.unwrap());

    assert!(engines[0].clear_lock("job"));
    assert!(!engines[0].clear_lock("job"));
    assert!(!engines[0].is_held("job"));
    assert_eq!(engines[0].backend().release_count(), 0);

    // Still held in the store.
    assert!(!engines[1].try_acquire_lock("job").await.unwrap());
}

#[tokio::test]
async fn test_backend_failure_is_distinct_from_contention() {
    let engine = LockEngine::new(MockBackend::unreachable());

    let result = engine.acquire_lock("job", Duration::from_secs(60)).await;
    assert!(matches!(result, Err(ref e) if e.is_connection()));
    assert_eq!(engine.backend().grant_count(), 1);
    assert!(!engine.is_held("job"));

    assert!(engine.is_locked("job").await.is_err());
}

#[tokio::test]
async fn test_shutdown_releases_everything() {
    let engines = engines(2);
    let mut engines = engines.into_iter();
    let (a, b) = (engines.next().unwrap(), engines.next().unwrap());

    assert!(a.try_acquire_lock("one").await.unwrap());
    assert!(a.try_acquire_lock("two").await.unwrap());
    assert_eq!(a.held_locks(), vec!["one".to_string(), "two".to_string()]);

    a.shutdown().await.unwrap();

    assert!(!b.is_locked("one").await.unwrap());
    assert!(!b.is_locked("two").await.unwrap());
}
