//! Concurrency Tests
//!
//! Racing first requests against lazy pool initialization, and cancelled
//! requests against a small pool.

use std::sync::Arc;
use std::time::Duration;

use animals::{
    api::create_router,
    auth::Argon2Hasher,
    store::{animal_key, ConnectionPool, MemoryBackend, MemoryDialer, PoolState},
    AppState,
};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt;

fn app_over(dialer: MemoryDialer, lookup_delay: Duration) -> (Router, Arc<ConnectionPool>) {
    let pool = Arc::new(ConnectionPool::new(dialer, Duration::from_secs(2)));
    let state = AppState::new(Arc::clone(&pool), Argon2Hasher::insecure_fast(), lookup_delay);
    (create_router(state), pool)
}

fn get_cow() -> Request<Body> {
    Request::builder()
        .uri("/animals/cow")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_racing_first_requests_dial_once() {
    let backend = MemoryBackend::new(4);
    backend.insert(animal_key("cow"), "moo").await;
    let dialer = MemoryDialer::new(backend).with_dial_delay(Duration::from_millis(50));
    let (app, pool) = app_over(dialer.clone(), Duration::ZERO);
    assert_eq!(pool.state(), PoolState::Uninitialized);

    let requests: Vec<_> = (0..25)
        .map(|_| {
            let app = app.clone();
            tokio::spawn(async move { app.oneshot(get_cow()).await.unwrap().status() })
        })
        .collect();

    for request in requests {
        assert_eq!(request.await.unwrap(), StatusCode::OK);
    }
    assert_eq!(dialer.dial_count(), 1);
    assert_eq!(pool.state(), PoolState::Ready);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_first_requests_dial_once_multi_thread() {
    let backend = MemoryBackend::new(4);
    backend.insert(animal_key("cow"), "moo").await;
    let dialer = MemoryDialer::new(backend).with_dial_delay(Duration::from_millis(50));
    let (app, _) = app_over(dialer.clone(), Duration::ZERO);

    let requests: Vec<_> = (0..25)
        .map(|_| {
            let app = app.clone();
            tokio::spawn(async move { app.oneshot(get_cow()).await.unwrap().status() })
        })
        .collect();

    for request in requests {
        assert_eq!(request.await.unwrap(), StatusCode::OK);
    }
    assert_eq!(dialer.dial_count(), 1);
}

#[tokio::test]
async fn test_failed_first_dial_recovers_on_next_request() {
    let backend = MemoryBackend::new(4);
    backend.insert(animal_key("cow"), "moo").await;
    let dialer = MemoryDialer::new(backend).failing_first(1);
    let (app, pool) = app_over(dialer.clone(), Duration::ZERO);

    let status = app.clone().oneshot(get_cow()).await.unwrap().status();
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(pool.state(), PoolState::Uninitialized);

    let status = app.oneshot(get_cow()).await.unwrap().status();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dialer.dial_count(), 2);
}

#[tokio::test]
async fn test_cancelled_command_releases_connection() {
    let backend = MemoryBackend::with_command_delay(1, Duration::from_millis(200));
    backend.insert(animal_key("cow"), "moo").await;
    let (app, _) = app_over(MemoryDialer::new(backend.clone()), Duration::ZERO);

    // Give up while the GET is still holding the only connection.
    let abandoned = tokio::time::timeout(Duration::from_millis(50), app.clone().oneshot(get_cow())).await;
    assert!(abandoned.is_err());
    assert_eq!(backend.in_use(), 0);

    let status = app.oneshot(get_cow()).await.unwrap().status();
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_cancelled_during_lookup_delay_releases_connection() {
    let backend = MemoryBackend::new(1);
    backend.insert(animal_key("cow"), "moo").await;
    let (app, _) = app_over(MemoryDialer::new(backend.clone()), Duration::from_secs(5));

    let abandoned = tokio::time::timeout(Duration::from_millis(50), app.clone().oneshot(get_cow())).await;
    assert!(abandoned.is_err());
    assert_eq!(backend.in_use(), 0);
}

#[tokio::test]
async fn test_slow_lookups_interleave() {
    let backend = MemoryBackend::new(2);
    backend.insert(animal_key("cow"), "moo").await;
    let (app, _) = app_over(MemoryDialer::new(backend), Duration::from_millis(200));

    let started = std::time::Instant::now();
    let requests: Vec<_> = (0..10)
        .map(|_| {
            let app = app.clone();
            tokio::spawn(async move { app.oneshot(get_cow()).await.unwrap().status() })
        })
        .collect();
    for request in requests {
        assert_eq!(request.await.unwrap(), StatusCode::OK);
    }

    // Ten sequential delays would take two seconds.
    assert!(started.elapsed() < Duration::from_millis(1500));
}
