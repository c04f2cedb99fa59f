//! Engine Module
//!
//! Coordinates the Store and the transaction log.
//!
//! ## Responsibilities
//! - Rebuild the Store from the log before serving requests
//! - Record every mutation with the logger and apply it to the Store
//! - Watch the logger's error stream and reject writes once it fails

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam::channel::Receiver;
use parking_lot::Mutex;

use crate::config::Config;
use crate::error::{KvError, Result};
use crate::store::Store;
use crate::wal::{FileTransactionLogger, TransactionLogger};

/// Outcome of the startup replay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryStats {
    /// Number of events applied to the Store
    pub events_replayed: u64,

    /// Last sequence number found in the log
    pub last_sequence: u64,
}

/// The key/value engine
///
/// ## Write ordering
/// Writes (put/delete) are serialized by `write_lock`, held across
/// "record with logger" and "apply to Store". The order events reach the log
/// is therefore the order they are applied, and replaying the log rebuilds
/// exactly the Store that was served. A write the logger rejects leaves the
/// Store untouched.
///
/// Reads only take the Store's read lock.
pub struct Engine {
    store: Store,

    logger: Arc<dyn TransactionLogger>,

    /// Serializes write operations (put/delete)
    write_lock: Mutex<()>,

    /// Set once the logger reports a write failure
    degraded: Arc<AtomicBool>,

    recovery: RecoveryStats,
}

impl Engine {
    /// Open the file logger at `config.log_path` and recover from it
    pub fn open(config: Config) -> Result<Self> {
        let logger = FileTransactionLogger::open(&config)?;
        Self::with_logger(Arc::new(logger))
    }

    /// Build an engine over any logger
    ///
    /// On startup:
    /// 1. Replay every logged event into a fresh Store
    /// 2. Start the logger's writer
    /// 3. Start watching the logger's error stream
    ///
    /// A replay error is fatal: the partially restored Store is discarded
    /// and the error returned.
    pub fn with_logger(logger: Arc<dyn TransactionLogger>) -> Result<Self> {
        // Step 1: Replay
        let store = Store::new();
        let recovery = Self::replay(&store, logger.as_ref())?;

        tracing::info!(
            events = recovery.events_replayed,
            last_sequence = recovery.last_sequence,
            keys = store.len(),
            "transaction log replayed"
        );

        // Step 2: Start appending
        logger.start()?;

        // Step 3: Monitor write failures
        let degraded = Arc::new(AtomicBool::new(false));
        Self::spawn_error_monitor(logger.errors(), Arc::clone(&degraded))?;

        Ok(Self {
            store,
            logger,
            write_lock: Mutex::new(()),
            degraded,
            recovery,
        })
    }

    fn replay(store: &Store, logger: &dyn TransactionLogger) -> Result<RecoveryStats> {
        let mut events_replayed = 0;

        for event in logger.read_events()? {
            let event = event.map_err(|e| {
                tracing::error!(
                    applied = events_replayed,
                    "transaction log replay failed: {}",
                    e
                );
                e
            })?;

            store.apply(&event);
            events_replayed += 1;
        }

        Ok(RecoveryStats {
            events_replayed,
            last_sequence: logger.last_sequence(),
        })
    }

    /// Flip the engine into the degraded state on the first write failure.
    /// The thread ends when the logger drops its side of the stream.
    fn spawn_error_monitor(errors: Receiver<KvError>, degraded: Arc<AtomicBool>) -> Result<()> {
        thread::Builder::new()
            .name("txlog-monitor".to_string())
            .spawn(move || {
                if let Ok(err) = errors.recv() {
                    degraded.store(true, Ordering::SeqCst);
                    tracing::error!("transaction log failed, rejecting writes: {}", err);
                }
            })?;
        Ok(())
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Result<String> {
        self.store.get(key).ok_or(KvError::KeyNotFound)
    }

    /// Put a key-value pair
    ///
    /// Steps:
    /// 1. Acquire write lock
    /// 2. Refuse if the logger has failed
    /// 3. Record with the logger
    /// 4. Apply to the Store
    pub fn put(&self, key: &str, value: &str) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.check_healthy()?;

        self.logger
            .record_put(key, value)
            .map_err(|e| self.rejected(e))?;
        self.store.put(key, value);

        Ok(())
    }

    /// Delete a key (absent keys are not an error)
    pub fn delete(&self, key: &str) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.check_healthy()?;

        self.logger
            .record_delete(key)
            .map_err(|e| self.rejected(e))?;
        self.store.delete(key);

        Ok(())
    }

    fn check_healthy(&self) -> Result<()> {
        if self.is_healthy() {
            Ok(())
        } else {
            Err(self.rejected(KvError::WriterStopped))
        }
    }

    fn rejected(&self, err: KvError) -> KvError {
        tracing::warn!("write rejected by transaction log: {}", err);
        err
    }

    /// Block until every write so far is durable
    pub fn sync(&self) -> Result<()> {
        self.logger.sync()
    }

    /// Close the engine gracefully
    ///
    /// Waits for in-flight writes, then flushes the log; later writes fail
    /// with `KvError::WriterStopped`.
    pub fn close(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.logger.close()
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// False once the logger has reported a write failure
    pub fn is_healthy(&self) -> bool {
        !self.degraded.load(Ordering::SeqCst)
    }

    /// Last sequence number assigned by the logger
    pub fn last_sequence(&self) -> u64 {
        self.logger.last_sequence()
    }

    /// What the startup replay restored
    pub fn recovery(&self) -> RecoveryStats {
        self.recovery
    }

    /// The underlying Store
    pub fn store(&self) -> &Store {
        &self.store
    }
}
