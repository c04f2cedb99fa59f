//! Error types for kvlog
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using KvError
pub type Result<T> = std::result::Result<T, KvError>;

/// Unified error type for kvlog operations
#[derive(Debug, Error)]
pub enum KvError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Transaction Log Errors
    // -------------------------------------------------------------------------
    /// A record in the log could not be decoded
    #[error("transaction log parse error at line {line}: {reason}")]
    Parse { line: u64, reason: String },

    /// A record's sequence number did not advance past the last one seen
    #[error("transaction numbers out of sequence at line {line}: {found} after {last}")]
    Sequence { line: u64, found: u64, last: u64 },

    /// The writer has stopped (failed or closed) and rejects new events
    #[error("transaction log writer has stopped")]
    WriterStopped,

    /// An operation was invoked in the wrong phase of the logger lifecycle
    #[error("transaction log lifecycle error: {0}")]
    Lifecycle(String),

    // -------------------------------------------------------------------------
    // Store Errors
    // -------------------------------------------------------------------------
    #[error("No such key")]
    KeyNotFound,

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl KvError {
    pub(crate) fn parse(line: u64, reason: impl Into<String>) -> Self {
        KvError::Parse {
            line,
            reason: reason.into(),
        }
    }

    pub(crate) fn lifecycle(msg: impl Into<String>) -> Self {
        KvError::Lifecycle(msg.into())
    }
}
