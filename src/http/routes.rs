//! Route handlers

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use bytes::Bytes;

use super::ApiError;
use crate::engine::Engine;
use crate::error::Result;

/// Build the router serving `engine`
pub fn router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/", get(hello))
        .route(
            "/v1/key/:key",
            get(get_key).put(put_key).delete(delete_key),
        )
        .with_state(engine)
}

async fn hello() -> &'static str {
    "Hello from kvlog!\n"
}

async fn put_key(
    State(engine): State<Arc<Engine>>,
    Path(key): Path<String>,
    body: Bytes,
) -> std::result::Result<StatusCode, ApiError> {
    let value = String::from_utf8(body.to_vec())
        .map_err(|_| ApiError::BadRequest("value must be valid UTF-8".to_string()))?;

    run_blocking(move || engine.put(&key, &value)).await?;
    Ok(StatusCode::CREATED)
}

async fn get_key(
    State(engine): State<Arc<Engine>>,
    Path(key): Path<String>,
) -> std::result::Result<String, ApiError> {
    run_blocking(move || engine.get(&key)).await
}

async fn delete_key(
    State(engine): State<Arc<Engine>>,
    Path(key): Path<String>,
) -> std::result::Result<StatusCode, ApiError> {
    run_blocking(move || engine.delete(&key)).await?;
    Ok(StatusCode::OK)
}

/// Run an engine call on the blocking pool
async fn run_blocking<T, F>(f: F) -> std::result::Result<T, ApiError>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await??)
}
