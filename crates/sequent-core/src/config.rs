//! Store configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// SQLite synchronous pragma setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SynchronousMode {
    /// Full durability, slowest
    Full,
    /// Durable with WAL, good default
    Normal,
    /// Fastest, unsafe on power loss
    Off,
}

/// Configuration for a sequence store backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the database file
    pub path: PathBuf,

    /// Enable WAL journal mode
    pub wal_mode: bool,

    /// Synchronous mode
    pub synchronous: SynchronousMode,

    /// SQLite cache size (negative = KiB)
    pub cache_size: i64,
}

impl StoreConfig {
    /// Create a config with default settings for the given path
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            wal_mode: true,
            synchronous: SynchronousMode::Normal,
            cache_size: -64_000,
        }
    }

    /// Set WAL mode
    pub fn with_wal_mode(mut self, enabled: bool) -> Self {
        self.wal_mode = enabled;
        self
    }

    /// Set synchronous mode
    pub fn with_synchronous(mut self, mode: SynchronousMode) -> Self {
        self.synchronous = mode;
        self
    }
}
