//! Log Writer
//!
//! Serializes events arriving on a bounded queue into the log, on a single
//! dedicated consumer thread.
//!
//! ## Guarantees
//! - Events are appended in the order their enqueue completed (FIFO)
//! - Each appended event gets the next sequence number, exactly one higher
//!   than the previous one
//! - Producers block only while the queue is full (backpressure)
//! - On the first write failure the consumer stops for good (fail-stop):
//!   the error is published once on the error stream and every later
//!   `record_*` call, including producers already blocked on a full queue,
//!   fails with `KvError::WriterStopped`

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::{Mutex, RwLock};

use super::Event;
use crate::config::SyncStrategy;
use crate::error::{KvError, Result};

/// Destination the writer appends records to
pub trait LogSink: Write + Send + 'static {
    /// Make everything written so far durable. Called after the writer has
    /// flushed its own buffer.
    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl LogSink for File {
    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}

/// Messages carried by the queue
enum Message {
    Append(Event),
    /// Barrier: acknowledged once everything before it is durable
    Sync(Sender<Result<()>>),
    Shutdown,
}

/// Writes events to the log on a background thread
///
/// ## Lifecycle
/// 1. `new` creates the queue; events may be enqueued right away and are
///    held (up to capacity) until the consumer runs
/// 2. `start` spawns the consumer, exactly once
/// 3. `close` writes everything enqueued so far, syncs and joins the
///    consumer. Dropping the writer closes it.
pub struct LogWriter {
    /// Producer side of the pending-event queue
    queue: Sender<Message>,

    /// Held shared across "check stopped, send" and exclusively while
    /// `close` queues the shutdown marker, so nothing lands behind it
    gate: RwLock<()>,

    /// Consumer state, parked here until `start`
    pending: Mutex<Option<Consumer>>,

    /// Consumer thread, once started
    handle: Mutex<Option<JoinHandle<()>>>,

    started: AtomicBool,

    /// Set on fail-stop or close
    stopped: Arc<AtomicBool>,

    /// Asynchronous write failures (at most one buffered)
    errors: Receiver<KvError>,

    /// Last assigned sequence number, shared with the replayer
    sequence: Arc<AtomicU64>,
}

impl LogWriter {
    /// Create a writer appending to `sink`
    ///
    /// `sequence` holds the last sequence number already present in the log
    /// (zero for a fresh log); the first appended event gets the next one.
    pub fn new(
        sink: Box<dyn LogSink>,
        sequence: Arc<AtomicU64>,
        queue_capacity: usize,
        sync_strategy: SyncStrategy,
    ) -> Self {
        let (queue_tx, queue_rx) = channel::bounded(queue_capacity);
        let (errors_tx, errors_rx) = channel::bounded(1);
        let stopped = Arc::new(AtomicBool::new(false));

        let consumer = Consumer {
            queue: queue_rx,
            out: BufWriter::new(sink),
            sequence: Arc::clone(&sequence),
            sync_strategy,
            uncommitted: 0,
            errors: errors_tx,
            stopped: Arc::clone(&stopped),
        };

        Self {
            queue: queue_tx,
            gate: RwLock::new(()),
            pending: Mutex::new(Some(consumer)),
            handle: Mutex::new(None),
            started: AtomicBool::new(false),
            stopped,
            errors: errors_rx,
            sequence,
        }
    }

    /// Spawn the consumer thread. Fails if called more than once.
    pub fn start(&self) -> Result<()> {
        let consumer = self
            .pending
            .lock()
            .take()
            .ok_or_else(|| KvError::lifecycle("writer already started or closed"))?;

        let handle = thread::Builder::new()
            .name("txlog-writer".to_string())
            .spawn(move || consumer.run())?;

        self.started.store(true, Ordering::SeqCst);
        *self.handle.lock() = Some(handle);

        tracing::debug!(
            last_sequence = self.last_sequence(),
            "transaction log writer started"
        );
        Ok(())
    }

    /// Enqueue a put. Blocks only while the queue is full.
    pub fn record_put(&self, key: &str, value: &str) -> Result<()> {
        self.enqueue(Event::put(key, value))
    }

    /// Enqueue a delete. Blocks only while the queue is full.
    pub fn record_delete(&self, key: &str) -> Result<()> {
        self.enqueue(Event::delete(key))
    }

    fn enqueue(&self, event: Event) -> Result<()> {
        let _gate = self.gate.read();
        if self.stopped.load(Ordering::SeqCst) {
            return Err(KvError::WriterStopped);
        }

        // Fails once the consumer has exited and dropped its receiver,
        // which also wakes producers blocked on a full queue.
        self.queue
            .send(Message::Append(event))
            .map_err(|_| KvError::WriterStopped)
    }

    /// Stream of asynchronous write failures
    pub fn errors(&self) -> Receiver<KvError> {
        self.errors.clone()
    }

    /// Wait until every event enqueued before this call is written and
    /// synced to the sink
    pub fn sync(&self) -> Result<()> {
        if !self.is_started() {
            return Err(KvError::lifecycle("writer not started"));
        }
        if self.is_stopped() {
            return Err(KvError::WriterStopped);
        }

        let (ack_tx, ack_rx) = channel::bounded(1);
        self.queue
            .send(Message::Sync(ack_tx))
            .map_err(|_| KvError::WriterStopped)?;

        ack_rx.recv().map_err(|_| KvError::WriterStopped)?
    }

    /// Write out everything enqueued so far, then stop the consumer
    ///
    /// Events still queued on a writer that was never started are discarded.
    /// Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        self.stopped.store(true, Ordering::SeqCst);

        // Dropping a parked consumer also wakes producers blocked on its
        // full queue, so they release the gate
        if let Some(consumer) = self.pending.lock().take() {
            tracing::debug!(
                queued = consumer.queue.len(),
                "closing transaction log writer that was never started"
            );
            return Ok(());
        }

        let Some(handle) = self.handle.lock().take() else {
            return Ok(());
        };

        // Producers already past the stopped check finish their send first.
        // The send fails if the consumer already stopped on its own.
        {
            let _gate = self.gate.write();
            let _ = self.queue.send(Message::Shutdown);
        }

        handle
            .join()
            .map_err(|_| KvError::lifecycle("writer thread panicked"))?;

        tracing::debug!(
            last_sequence = self.last_sequence(),
            "transaction log writer closed"
        );
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Whether the writer rejects new events (failed or closed)
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Last sequence number assigned (or replayed)
    pub fn last_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Number of events waiting in the queue
    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("Error closing transaction log writer: {}", e);
        }
    }
}

// =============================================================================
// Consumer
// =============================================================================

/// State owned by the consumer thread
struct Consumer {
    queue: Receiver<Message>,
    out: BufWriter<Box<dyn LogSink>>,
    sequence: Arc<AtomicU64>,
    sync_strategy: SyncStrategy,

    /// Records written since the last sync
    uncommitted: usize,

    errors: Sender<KvError>,
    stopped: Arc<AtomicBool>,
}

impl Consumer {
    fn run(mut self) {
        while let Ok(message) = self.queue.recv() {
            let outcome = match message {
                Message::Append(event) => self.append(event),
                Message::Sync(ack) => {
                    let outcome = self.sync();
                    let reply = match &outcome {
                        Ok(()) => Ok(()),
                        Err(_) => Err(KvError::WriterStopped),
                    };
                    let _ = ack.send(reply);
                    outcome
                }
                Message::Shutdown => {
                    if let Err(e) = self.sync() {
                        self.fail(e);
                    }
                    return;
                }
            };

            if let Err(e) = outcome {
                self.fail(e);
                return;
            }
        }

        // Every producer handle is gone
        if let Err(e) = self.sync() {
            self.fail(e);
        }
    }

    fn append(&mut self, mut event: Event) -> io::Result<()> {
        event.sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;

        self.out.write_all(event.encode_line().as_bytes())?;
        self.uncommitted += 1;

        tracing::trace!(sequence = event.sequence, kind = %event.kind, "appended event");

        let sync_due = match self.sync_strategy {
            SyncStrategy::EveryWrite => true,
            SyncStrategy::EveryNEntries { count } => self.uncommitted >= count,
        };

        if sync_due {
            self.sync()
        } else if self.queue.is_empty() {
            // Hand buffered records to the OS while idle
            self.out.flush()
        } else {
            Ok(())
        }
    }

    fn sync(&mut self) -> io::Result<()> {
        self.out.flush()?;
        self.out.get_mut().sync()?;
        self.uncommitted = 0;
        Ok(())
    }

    /// Fail-stop: publish the error and mark the writer stopped. The caller
    /// returns from `run` right after, dropping the queue receiver.
    fn fail(&self, err: io::Error) {
        self.stopped.store(true, Ordering::SeqCst);

        tracing::error!(
            error = %err,
            last_sequence = self.sequence.load(Ordering::SeqCst),
            "transaction log write failed, writer stopped"
        );

        // Capacity one: only the first failure is kept
        let _ = self.errors.try_send(KvError::Io(err));
    }
}
