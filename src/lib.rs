//! # kvlog
//!
//! An in-memory key-value store served over HTTP, with:
//! - An asynchronous, append-only transaction log (WAL) for durability
//! - Crash recovery by replaying the log at startup
//! - Bounded-queue backpressure and a single writer thread
//! - Fail-stop writes that reject callers instead of hanging
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      HTTP Server                             │
//! │              PUT / GET / DELETE /v1/key/{key}                │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                        Engine                                │
//! │          (writes serialized, replay at startup)              │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │ Transaction │          │    Store    │
//!   │   Logger    │          │  (RwLock)   │
//!   └──────┬──────┘          └─────────────┘
//!          │ bounded queue
//!          ▼
//!   ┌─────────────┐
//!   │ Writer thr. │──▶ transactions.log
//!   └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod wal;
pub mod store;
pub mod engine;
pub mod http;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{KvError, Result};
pub use config::Config;
pub use engine::Engine;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of kvlog
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
