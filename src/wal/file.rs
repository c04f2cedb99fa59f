//! File-backed transaction logger
//!
//! Combines a [`LogReader`] for replay and a [`LogWriter`] for appends over
//! one log file.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam::channel::Receiver;
use parking_lot::Mutex;

use super::{EventStream, LogReader, LogWriter, TransactionLogger};
use crate::config::Config;
use crate::error::{KvError, Result};

/// Transaction logger appending to a file
///
/// ## Lifecycle
/// 1. `open` opens (or creates) the file in append mode
/// 2. `read_events` replays the existing records, at most once
/// 3. `start` launches the background writer once the replay stream has
///    reached the end of the file cleanly; replay is no longer allowed
/// 4. `close` (or drop) flushes and stops the writer
///
/// Replay and appends share one sequence counter, so numbering continues
/// where the file left off.
pub struct FileTransactionLogger {
    path: PathBuf,

    /// Read handle for replay, taken by `read_events`
    replay: Mutex<Option<File>>,

    /// Set by the replay stream when it reaches end of file without error
    replay_complete: Arc<AtomicBool>,

    writer: LogWriter,

    /// Last assigned or replayed sequence number
    sequence: Arc<AtomicU64>,
}

impl FileTransactionLogger {
    /// Open or create the log at `config.log_path`
    pub fn open(config: &Config) -> Result<Self> {
        config.validate()?;

        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&config.log_path)?;
        let replay = file.try_clone()?;

        let sequence = Arc::new(AtomicU64::new(0));
        let writer = LogWriter::new(
            Box::new(file),
            Arc::clone(&sequence),
            config.queue_capacity,
            config.sync_strategy,
        );

        tracing::debug!(path = %config.log_path.display(), "opened transaction log");

        Ok(Self {
            path: config.log_path.clone(),
            replay: Mutex::new(Some(replay)),
            replay_complete: Arc::new(AtomicBool::new(false)),
            writer,
            sequence,
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified log path
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().log_path(path).build();
        Self::open(&config)
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The background writer
    pub fn writer(&self) -> &LogWriter {
        &self.writer
    }
}

impl TransactionLogger for FileTransactionLogger {
    fn record_put(&self, key: &str, value: &str) -> Result<()> {
        self.writer.record_put(key, value)
    }

    fn record_delete(&self, key: &str) -> Result<()> {
        self.writer.record_delete(key)
    }

    fn errors(&self) -> Receiver<KvError> {
        self.writer.errors()
    }

    fn read_events(&self) -> Result<EventStream<'_>> {
        if self.writer.is_started() {
            return Err(KvError::lifecycle(
                "cannot replay the transaction log after the writer has started",
            ));
        }

        let mut file = self
            .replay
            .lock()
            .take()
            .ok_or_else(|| KvError::lifecycle("transaction log already replayed"))?;
        file.seek(SeekFrom::Start(0))?;

        let reader = LogReader::new(BufReader::new(file), Arc::clone(&self.sequence))
            .with_completion(Arc::clone(&self.replay_complete));
        Ok(Box::new(reader))
    }

    fn start(&self) -> Result<()> {
        // Appending after a missing, partial or failed replay would number
        // from a counter behind the file and collide with existing records
        if !self.replay_complete.load(Ordering::SeqCst) && fs::metadata(&self.path)?.len() > 0 {
            return Err(KvError::lifecycle(
                "existing transaction log must be fully replayed before appending",
            ));
        }

        self.replay.lock().take();
        self.writer.start()
    }

    fn last_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    fn sync(&self) -> Result<()> {
        self.writer.sync()
    }

    fn close(&self) -> Result<()> {
        self.writer.close()
    }
}
