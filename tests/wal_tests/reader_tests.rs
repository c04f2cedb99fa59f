//! Tests for the Log Reader
//!
//! These tests verify:
//! - Reading events in order
//! - Parse errors stop replay after the events before them
//! - Sequence regressions are rejected
//! - The shared sequence counter tracks the last event

use std::fs;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use kvlog::store::Store;
use kvlog::wal::{EventKind, LogReader};
use kvlog::KvError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn reader_for(log: &str) -> LogReader<Cursor<Vec<u8>>> {
    LogReader::new(
        Cursor::new(log.as_bytes().to_vec()),
        Arc::new(AtomicU64::new(0)),
    )
}

// =============================================================================
// Basic Reading Tests
// =============================================================================

#[test]
fn test_read_empty_log() {
    let mut reader = reader_for("");

    assert!(reader.next().is_none());
    assert_eq!(reader.last_sequence(), 0);
}

#[test]
fn test_read_multiple_events() {
    let mut reader = reader_for("1\t2\tk1\tv1\n2\t2\tk2\tv2\n3\t1\tk1\t\n");

    let events: Vec<_> = reader.by_ref().collect::<Result<Vec<_>, _>>().unwrap();

    assert_eq!(events.len(), 3);
    assert_eq!(events[0].key, "k1");
    assert_eq!(events[1].value, "v2");
    assert_eq!(events[2].kind, EventKind::Delete);
    assert_eq!(reader.last_sequence(), 3);
    assert_eq!(reader.lines_read(), 3);
}

#[test]
fn test_last_line_without_newline() {
    let events: Vec<_> = reader_for("1\t2\ta\t1\n2\t2\tb\t2")
        .collect::<Result<Vec<_>, _>>()
        .unwrap();

    assert_eq!(events.len(), 2);
    assert_eq!(events[1].value, "2");
}

#[test]
fn test_crlf_line_endings() {
    let events: Vec<_> = reader_for("1\t2\ta\tone\r\n2\t1\tb\r\n3\t2\tc\tthree\r\n")
        .collect::<Result<Vec<_>, _>>()
        .unwrap();

    assert_eq!(events.len(), 3);
    assert_eq!(events[0].value, "one");
    assert_eq!(events[1].key, "b");
    assert_eq!(events[2].value, "three");
}

#[test]
fn test_escaped_carriage_return_is_kept() {
    let events: Vec<_> = reader_for("1\t2\tk\tv\\r\r\n")
        .collect::<Result<Vec<_>, _>>()
        .unwrap();

    assert_eq!(events[0].value, "v\r");
}

#[test]
fn test_gaps_in_sequence_are_accepted() {
    let mut reader = reader_for("3\t2\ta\t1\n10\t2\tb\t2\n");

    assert_eq!(reader.by_ref().filter(|e| e.is_ok()).count(), 2);
    assert_eq!(reader.last_sequence(), 10);
}

#[test]
fn test_put_then_delete_leaves_key_absent() {
    let store = Store::new();
    for event in reader_for("1\t2\tfoo\tbar\n2\t1\tfoo\t\n") {
        store.apply(&event.unwrap());
    }

    assert_eq!(store.get("foo"), None);
    assert!(store.is_empty());
}

// =============================================================================
// Error Tests
// =============================================================================

#[test]
fn test_parse_failure_stops_after_preceding_events() {
    let mut reader = reader_for("1\t2\tfoo\tbar\nthis is not a record\n3\t2\tbaz\tqux\n");

    let first = reader.next().unwrap().unwrap();
    assert_eq!(first.key, "foo");

    match reader.next() {
        Some(Err(KvError::Parse { line, .. })) => assert_eq!(line, 2),
        other => panic!("expected parse error, got {:?}", other),
    }

    // The stream is finished for good
    assert!(reader.next().is_none());
    assert!(reader.next().is_none());
    assert_eq!(reader.last_sequence(), 1);
}

#[test]
fn test_sequence_regression_detected() {
    let mut reader = reader_for("5\t2\ta\t1\n3\t2\tb\t2\n7\t2\tc\t3\n");

    assert_eq!(reader.next().unwrap().unwrap().sequence, 5);

    match reader.next() {
        Some(Err(KvError::Sequence { line, found, last })) => {
            assert_eq!(line, 2);
            assert_eq!(found, 3);
            assert_eq!(last, 5);
        }
        other => panic!("expected sequence error, got {:?}", other),
    }

    assert!(reader.next().is_none());
    assert_eq!(reader.last_sequence(), 5);
}

#[test]
fn test_duplicate_sequence_detected() {
    let results: Vec<_> = reader_for("1\t2\ta\t1\n1\t2\ta\t2\n").collect();

    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(KvError::Sequence { found: 1, last: 1, .. })));
}

#[test]
fn test_sequence_zero_rejected() {
    let results: Vec<_> = reader_for("0\t2\ta\t1\n").collect();

    assert_eq!(results.len(), 1);
    assert!(matches!(results[0], Err(KvError::Sequence { found: 0, .. })));
}

#[test]
fn test_blank_line_is_parse_error() {
    let results: Vec<_> = reader_for("1\t2\ta\t1\n\n2\t2\tb\t2\n").collect();

    assert_eq!(results.len(), 2);
    assert!(matches!(results[1], Err(KvError::Parse { line: 2, .. })));
}

#[test]
fn test_invalid_utf8_is_parse_error() {
    let mut bytes = b"1\t2\tok\tv\n2\t2\t".to_vec();
    bytes.extend_from_slice(&[0xff, 0xfe]);
    bytes.extend_from_slice(b"\tv\n");

    let mut reader = LogReader::new(Cursor::new(bytes), Arc::new(AtomicU64::new(0)));

    assert!(reader.next().unwrap().is_ok());
    assert!(matches!(reader.next(), Some(Err(KvError::Parse { line: 2, .. }))));
    assert!(reader.next().is_none());
}

// =============================================================================
// Completion Tests
// =============================================================================

#[test]
fn test_complete_only_after_clean_end() {
    let mut reader = reader_for("1\t2\ta\t1\n2\t2\tb\t2\n");

    reader.next().unwrap().unwrap();
    assert!(!reader.is_complete());

    reader.next().unwrap().unwrap();
    assert!(!reader.is_complete());

    assert!(reader.next().is_none());
    assert!(reader.is_complete());
}

#[test]
fn test_not_complete_after_error() {
    let mut reader = reader_for("1\t2\ta\t1\nbroken\n");

    assert_eq!(reader.by_ref().count(), 2);
    assert!(reader.next().is_none());
    assert!(!reader.is_complete());
}

#[test]
fn test_completion_reported_through_shared_flag() {
    let flag = Arc::new(AtomicBool::new(false));
    let reader = reader_for("1\t2\ta\t1\n").with_completion(Arc::clone(&flag));

    assert_eq!(reader.count(), 1);
    assert!(flag.load(Ordering::SeqCst));
}

// =============================================================================
// Shared Counter Tests
// =============================================================================

#[test]
fn test_reader_advances_shared_counter() {
    let sequence = Arc::new(AtomicU64::new(0));
    let reader = LogReader::new(
        Cursor::new(b"1\t2\ta\t1\n2\t2\tb\t2\n".to_vec()),
        Arc::clone(&sequence),
    );

    assert_eq!(reader.count(), 2);
    assert_eq!(sequence.load(Ordering::SeqCst), 2);
}

#[test]
fn test_reader_respects_existing_counter() {
    // Counter already past the log's first record
    let sequence = Arc::new(AtomicU64::new(4));
    let results: Vec<_> = LogReader::new(
        Cursor::new(b"4\t2\ta\t1\n".to_vec()),
        Arc::clone(&sequence),
    )
    .collect();

    assert!(matches!(results[0], Err(KvError::Sequence { found: 4, last: 4, .. })));
}

// =============================================================================
// File Tests
// =============================================================================

#[test]
fn test_open_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("transactions.log");
    fs::write(&path, "1\t2\tfoo\tbar\n2\t2\tbaz\tqux\n").unwrap();

    let mut reader = LogReader::open(&path).unwrap();
    let events: Vec<_> = reader.by_ref().collect::<Result<Vec<_>, _>>().unwrap();

    assert_eq!(events.len(), 2);
    assert_eq!(reader.last_sequence(), 2);
}

#[test]
fn test_open_missing_file_fails() {
    let temp = TempDir::new().unwrap();

    assert!(matches!(
        LogReader::open(&temp.path().join("missing.log")),
        Err(KvError::Io(_))
    ));
}
