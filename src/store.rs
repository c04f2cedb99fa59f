//! Store Module
//!
//! In-memory key/value table served by the engine.
//!
//! ## Concurrency
//! BTreeMap behind a RwLock: many concurrent readers, one writer at a time.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::wal::{Event, EventKind};

/// Guarded key/value table
#[derive(Debug, Default)]
pub struct Store {
    data: RwLock<BTreeMap<String, String>>,
}

impl Store {
    /// Create a new empty Store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value by key (read lock)
    pub fn get(&self, key: &str) -> Option<String> {
        self.data.read().get(key).cloned()
    }

    /// Put a key-value pair (write lock)
    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) {
        self.data.write().insert(key.into(), value.into());
    }

    /// Delete a key, returning whether it was present (write lock)
    pub fn delete(&self, key: &str) -> bool {
        self.data.write().remove(key).is_some()
    }

    /// Apply a logged mutation
    pub fn apply(&self, event: &Event) {
        match event.kind {
            EventKind::Put => self.put(event.key.as_str(), event.value.as_str()),
            EventKind::Delete => {
                self.delete(&event.key);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Copy of the whole table, in key order
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.data.read().clone()
    }
}
