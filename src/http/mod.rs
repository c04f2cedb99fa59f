//! HTTP Module
//!
//! REST surface over the engine.
//!
//! ## Routes
//! - `PUT /v1/key/{key}`: body is the value, 201 on success
//! - `GET /v1/key/{key}`: 200 with the value, 404 if absent
//! - `DELETE /v1/key/{key}`: 200
//!
//! Engine calls can block under log backpressure, so they run on the
//! blocking thread pool.

mod error;
mod routes;

pub use error::ApiError;
pub use routes::router;
