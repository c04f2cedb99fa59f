//! Transaction Log (WAL) Module
//!
//! Provides durability guarantees through append-only logging.
//!
//! ## Responsibilities
//! - Record every mutation asynchronously through a bounded queue
//! - Assign strictly increasing sequence numbers at append time
//! - Replay the log at startup, rejecting malformed or out-of-order records
//! - Fail-stop on write errors, reporting them on an error stream
//!
//! ## File Format
//! One event per line, tab-separated:
//! ```text
//! ┌──────────────┬──────────────────────┬───────┬─────────┐
//! │ sequence u64 │ kind (1=DEL, 2=PUT)  │  key  │  value  │ \n
//! └──────────────┴──────────────────────┴───────┴─────────┘
//! ```
//! Backslash, tab, CR and LF in keys and values are backslash-escaped.

mod event;
mod file;
mod logger;
mod memory;
mod reader;
mod writer;

pub use event::{Event, EventKind};
pub use file::FileTransactionLogger;
pub use logger::{EventStream, TransactionLogger};
pub use memory::{MemoryTransactionLogger, NullTransactionLogger};
pub use reader::LogReader;
pub use writer::{LogSink, LogWriter};
