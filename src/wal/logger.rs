//! Transaction Logger
//!
//! The capability set the engine depends on, independent of where the log
//! lives.

use crossbeam::channel::Receiver;

use super::Event;
use crate::error::{KvError, Result};

/// One-shot replay stream returned by [`TransactionLogger::read_events`]
pub type EventStream<'a> = Box<dyn Iterator<Item = Result<Event>> + Send + 'a>;

/// Records mutations and replays them at startup
///
/// ## Contract
/// - `read_events` may be consumed once, before `start`. It yields events in
///   log order and ends after the first error.
/// - After replay, appended events continue the sequence numbering from the
///   last replayed event; numbers are strictly increasing with no gaps.
/// - `record_put`/`record_delete` return once the event is accepted, not
///   once it is durable. They block only under backpressure and fail with
///   `KvError::WriterStopped` once the logger has stopped.
/// - Write failures surface asynchronously on `errors`.
pub trait TransactionLogger: Send + Sync {
    fn record_put(&self, key: &str, value: &str) -> Result<()>;

    fn record_delete(&self, key: &str) -> Result<()>;

    /// Asynchronous write failures
    fn errors(&self) -> Receiver<KvError>;

    /// Replay every persisted event
    fn read_events(&self) -> Result<EventStream<'_>>;

    /// Begin accepting appends. Called once, after replay.
    ///
    /// A log that already holds events refuses to start unless its replay
    /// stream ran to the end without an error.
    fn start(&self) -> Result<()>;

    /// Last sequence number assigned or replayed
    fn last_sequence(&self) -> u64;

    /// Block until everything recorded so far is durable
    fn sync(&self) -> Result<()> {
        Ok(())
    }

    /// Flush and stop; later records fail with `KvError::WriterStopped`
    fn close(&self) -> Result<()> {
        Ok(())
    }
}
