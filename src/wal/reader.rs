//! Log Reader
//!
//! Scans a transaction log sequentially for replay at startup.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::iter::FusedIterator;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use super::Event;
use crate::error::{KvError, Result};

/// Reads events from a transaction log, one line at a time
///
/// Every event must carry a sequence number greater than the last one seen.
/// The reader advances the shared counter as it goes, so a writer started on
/// the same counter afterwards continues the numbering.
///
/// As an iterator, the first error is yielded once and ends iteration; end of
/// input ends it without an error.
///
/// Lines may end in `\n` or `\r\n`.
pub struct LogReader<R> {
    input: R,

    /// Last sequence number seen, shared with the writer
    sequence: Arc<AtomicU64>,

    /// 1-based number of the last line read
    line_no: u64,

    buf: Vec<u8>,

    finished: bool,

    /// Set when the input ended with every line accepted
    complete: Arc<AtomicBool>,
}

impl LogReader<BufReader<File>> {
    /// Open a log file for reading with a fresh sequence counter
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file), Arc::new(AtomicU64::new(0))))
    }
}

impl<R: BufRead> LogReader<R> {
    pub fn new(input: R, sequence: Arc<AtomicU64>) -> Self {
        Self {
            input,
            sequence,
            line_no: 0,
            buf: Vec::new(),
            finished: false,
            complete: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Report a clean end of input through `flag` instead of a private one
    pub fn with_completion(mut self, flag: Arc<AtomicBool>) -> Self {
        self.complete = flag;
        self
    }

    /// Read the next event, or `None` at end of input
    ///
    /// After an error the reader only returns `None`.
    pub fn next_event(&mut self) -> Result<Option<Event>> {
        if self.finished {
            return Ok(None);
        }

        match self.read_event() {
            Ok(Some(event)) => Ok(Some(event)),
            Ok(None) => {
                self.finished = true;
                self.complete.store(true, Ordering::SeqCst);
                Ok(None)
            }
            Err(e) => {
                self.finished = true;
                Err(e)
            }
        }
    }

    fn read_event(&mut self) -> Result<Option<Event>> {
        self.buf.clear();
        if self.input.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }
        self.line_no += 1;

        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
        }

        let line = std::str::from_utf8(&self.buf)
            .map_err(|e| KvError::parse(self.line_no, format!("invalid UTF-8: {}", e)))?;
        let event = Event::parse_line(line, self.line_no)?;

        advance_sequence(&self.sequence, &event, self.line_no)?;
        Ok(Some(event))
    }

    /// Last sequence number seen
    pub fn last_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Number of lines consumed so far
    pub fn lines_read(&self) -> u64 {
        self.line_no
    }

    /// Whether the whole input was read without an error
    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::SeqCst)
    }
}

impl<R: BufRead> Iterator for LogReader<R> {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_event().transpose()
    }
}

impl<R: BufRead> FusedIterator for LogReader<R> {}

/// Accept `event` only if it moves the sequence forward
pub(crate) fn advance_sequence(sequence: &AtomicU64, event: &Event, line_no: u64) -> Result<()> {
    let last = sequence.load(Ordering::SeqCst);
    if event.sequence <= last {
        return Err(KvError::Sequence {
            line: line_no,
            found: event.sequence,
            last,
        });
    }

    sequence.store(event.sequence, Ordering::SeqCst);
    Ok(())
}
