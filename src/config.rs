//! Configuration for kvlog
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{KvError, Result};

/// Main configuration for a kvlog instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Transaction Log Configuration
    // -------------------------------------------------------------------------
    /// Path of the transaction log file (created if missing)
    pub log_path: PathBuf,

    /// Capacity of the pending-event queue. Producers block once it is full.
    pub queue_capacity: usize,

    /// Sync strategy: how often to fsync the log
    pub sync_strategy: SyncStrategy,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// HTTP listen address
    pub listen_addr: String,
}

/// Log sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every record (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted records (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("transactions.log"),
            queue_capacity: 16,
            sync_strategy: SyncStrategy::EveryNEntries { count: 100 },
            listen_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the logger cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(KvError::Config("queue capacity must be at least 1".into()));
        }
        if let SyncStrategy::EveryNEntries { count: 0 } = self.sync_strategy {
            return Err(KvError::Config("sync count must be at least 1".into()));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the transaction log path
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.log_path = path.into();
        self
    }

    /// Set the pending-event queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Set the log sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Set the HTTP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
