//! HTTP error mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::error::KvError;

/// Errors returned by request handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] KvError),

    #[error("{0}")]
    BadRequest(String),

    #[error("request handler failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Engine(KvError::KeyNotFound) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::warn!("request failed: {}", self);
        }

        (status, format!("{}\n", self)).into_response()
    }
}
