//! Tests for the HTTP routes
//!
//! These tests verify:
//! - Status codes for PUT/GET/DELETE
//! - Request bodies reach the store and the log
//! - Logger rejection surfaces as a server error

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use kvlog::engine::Engine;
use kvlog::http::router;
use kvlog::wal::{MemoryTransactionLogger, TransactionLogger};
use tower::ServiceExt; // for oneshot

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_app() -> (Arc<MemoryTransactionLogger>, Arc<Engine>, Router) {
    let logger = Arc::new(MemoryTransactionLogger::new());
    let engine = Arc::new(
        Engine::with_logger(Arc::clone(&logger) as Arc<dyn TransactionLogger>).unwrap(),
    );
    let app = router(Arc::clone(&engine));
    (logger, engine, app)
}

async fn send(app: &Router, method: &str, uri: &str, body: impl Into<Body>) -> (StatusCode, String) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(body.into())
        .unwrap();

    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

// =============================================================================
// Route Tests
// =============================================================================

#[tokio::test]
async fn test_root() {
    let (_logger, _engine, app) = setup_app();

    let (status, _) = send(&app, "GET", "/", Body::empty()).await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_put_then_get() {
    let (logger, _engine, app) = setup_app();

    let (status, _) = send(&app, "PUT", "/v1/key/foo", "bar").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, "GET", "/v1/key/foo", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "bar");

    let events = logger.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].key, "foo");
    assert_eq!(events[0].value, "bar");
}

#[tokio::test]
async fn test_get_missing_key_is_not_found() {
    let (_logger, _engine, app) = setup_app();

    let (status, body) = send(&app, "GET", "/v1/key/missing", Body::empty()).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "No such key\n");
}

#[tokio::test]
async fn test_delete() {
    let (logger, _engine, app) = setup_app();

    send(&app, "PUT", "/v1/key/foo", "bar").await;
    let (status, _) = send(&app, "DELETE", "/v1/key/foo", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", "/v1/key/foo", Body::empty()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    assert_eq!(logger.events().len(), 2);
}

#[tokio::test]
async fn test_delete_missing_key_is_ok() {
    let (_logger, _engine, app) = setup_app();

    let (status, _) = send(&app, "DELETE", "/v1/key/ghost", Body::empty()).await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_put_non_utf8_body_is_rejected() {
    let (logger, _engine, app) = setup_app();

    let (status, _) = send(&app, "PUT", "/v1/key/bin", vec![0xffu8, 0xfe]).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(logger.events().is_empty());
}

#[tokio::test]
async fn test_put_after_close_is_server_error() {
    let (_logger, engine, app) = setup_app();
    engine.close().unwrap();

    let (status, body) = send(&app, "PUT", "/v1/key/foo", "bar").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("writer has stopped"), "body: {}", body);
}

#[tokio::test]
async fn test_unsupported_method() {
    let (_logger, _engine, app) = setup_app();

    let (status, _) = send(&app, "POST", "/v1/key/foo", "bar").await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}
