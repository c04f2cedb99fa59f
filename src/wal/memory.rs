//! In-memory transaction loggers
//!
//! Alternative backing media for tests and embedding: the same sequencing
//! contract as the file logger, without a file.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;

use super::reader::advance_sequence;
use super::{Event, EventKind, EventStream, TransactionLogger};
use crate::error::{KvError, Result};

// =============================================================================
// Memory Logger
// =============================================================================

/// Keeps the log in a vector
///
/// Events are numbered synchronously when recorded. Replay validates
/// ordering exactly like the file reader does.
pub struct MemoryTransactionLogger {
    events: Mutex<Vec<Event>>,
    sequence: AtomicU64,
    started: AtomicBool,
    replayed: AtomicBool,

    /// Set once a replay stream has yielded every event without error
    replay_complete: AtomicBool,

    closed: AtomicBool,

    /// Held so the error stream stays open; nothing is ever sent
    _errors_tx: Sender<KvError>,
    errors_rx: Receiver<KvError>,
}

impl MemoryTransactionLogger {
    pub fn new() -> Self {
        Self::with_events(Vec::new())
    }

    /// A logger whose log already holds `events`, as if written earlier
    pub fn with_events(events: Vec<Event>) -> Self {
        let (errors_tx, errors_rx) = channel::bounded(1);
        Self {
            events: Mutex::new(events),
            sequence: AtomicU64::new(0),
            started: AtomicBool::new(false),
            replayed: AtomicBool::new(false),
            replay_complete: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            _errors_tx: errors_tx,
            errors_rx,
        }
    }

    /// Copy of every event in the log, in log order
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    fn record(&self, kind: EventKind, key: &str, value: &str) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(KvError::WriterStopped);
        }

        // Numbered under the lock so vector order matches sequence order
        let mut events = self.events.lock();
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        events.push(Event {
            sequence,
            kind,
            key: key.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }
}

impl Default for MemoryTransactionLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionLogger for MemoryTransactionLogger {
    fn record_put(&self, key: &str, value: &str) -> Result<()> {
        self.record(EventKind::Put, key, value)
    }

    fn record_delete(&self, key: &str) -> Result<()> {
        self.record(EventKind::Delete, key, "")
    }

    fn errors(&self) -> Receiver<KvError> {
        self.errors_rx.clone()
    }

    fn read_events(&self) -> Result<EventStream<'_>> {
        if self.started.load(Ordering::SeqCst) {
            return Err(KvError::lifecycle(
                "cannot replay the transaction log after the writer has started",
            ));
        }
        if self.replayed.swap(true, Ordering::SeqCst) {
            return Err(KvError::lifecycle("transaction log already replayed"));
        }

        let snapshot = self.events();
        let mut failed = false;
        // A trailing `None` marks the end of the log
        let stream = snapshot
            .into_iter()
            .zip(1u64..)
            .map(Some)
            .chain(std::iter::once(None))
            .map_while(move |entry| {
                if failed {
                    return None;
                }
                let Some((event, position)) = entry else {
                    self.replay_complete.store(true, Ordering::SeqCst);
                    return None;
                };
                match advance_sequence(&self.sequence, &event, position) {
                    Ok(()) => Some(Ok(event)),
                    Err(e) => {
                        failed = true;
                        Some(Err(e))
                    }
                }
            });

        Ok(Box::new(stream))
    }

    fn start(&self) -> Result<()> {
        if !self.replay_complete.load(Ordering::SeqCst) && !self.events.lock().is_empty() {
            return Err(KvError::lifecycle(
                "existing transaction log must be fully replayed before appending",
            ));
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(KvError::lifecycle("writer already started or closed"));
        }
        Ok(())
    }

    fn last_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// Null Logger
// =============================================================================

/// Discards everything; replay yields nothing
pub struct NullTransactionLogger {
    _errors_tx: Sender<KvError>,
    errors_rx: Receiver<KvError>,
}

impl NullTransactionLogger {
    pub fn new() -> Self {
        let (errors_tx, errors_rx) = channel::bounded(1);
        Self {
            _errors_tx: errors_tx,
            errors_rx,
        }
    }
}

impl Default for NullTransactionLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionLogger for NullTransactionLogger {
    fn record_put(&self, _key: &str, _value: &str) -> Result<()> {
        Ok(())
    }

    fn record_delete(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    fn errors(&self) -> Receiver<KvError> {
        self.errors_rx.clone()
    }

    fn read_events(&self) -> Result<EventStream<'_>> {
        Ok(Box::new(std::iter::empty()))
    }

    fn start(&self) -> Result<()> {
        Ok(())
    }

    fn last_sequence(&self) -> u64 {
        0
    }
}
