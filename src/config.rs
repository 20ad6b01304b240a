use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// IO strategy for log files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoType {
    /// Buffered positional file IO.
    FileIo,
    /// Memory-mapped IO, sized to the file threshold. Speeds up the
    /// sequential scans of reopen and GC.
    MMap,
}

/// How much of each entry the in-memory index retains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMode {
    /// Index holds only locators; reads fetch values from the log.
    KeyOnly,
    /// Index caches values alongside locators; reads never touch disk.
    KeyValue,
}

/// Configuration for an EmberDB instance.
#[derive(Debug, Clone)]
pub struct Options {
    /// Root directory holding the per-type subdirectories.
    pub db_path: PathBuf,

    /// IO strategy for log files (default: FileIo).
    pub io_type: IoType,

    /// Index memory mode (default: KeyOnly).
    pub index_mode: IndexMode,

    /// Per-file byte limit before rotation (default: 512 MiB).
    pub log_file_size_threshold: u64,

    /// Sync the active file on every write (default: false).
    pub sync: bool,

    /// Period for background GC sweeps (default: 8 hours).
    pub log_file_gc_interval: Duration,

    /// Minimum discard ratio for a file to be a GC candidate (default: 0.5).
    pub log_file_gc_ratio: f64,

    /// Slot count of the per-type discard tables (default: 1024).
    pub discard_buffer_size: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./emberdb"),
            io_type: IoType::FileIo,
            index_mode: IndexMode::KeyOnly,
            log_file_size_threshold: 512 * 1024 * 1024,
            sync: false,
            log_file_gc_interval: Duration::from_secs(8 * 60 * 60),
            log_file_gc_ratio: 0.5,
            discard_buffer_size: 1024,
        }
    }
}

impl Options {
    /// Create options rooted at the given directory.
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            ..Default::default()
        }
    }

    /// Set the IO strategy.
    pub fn io_type(mut self, io_type: IoType) -> Self {
        self.io_type = io_type;
        self
    }

    /// Set the index memory mode.
    pub fn index_mode(mut self, mode: IndexMode) -> Self {
        self.index_mode = mode;
        self
    }

    /// Set the per-file rotation threshold.
    pub fn log_file_size_threshold(mut self, bytes: u64) -> Self {
        self.log_file_size_threshold = bytes;
        self
    }

    /// Enable sync-on-every-write.
    pub fn sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    /// Set the background GC sweep interval.
    pub fn log_file_gc_interval(mut self, interval: Duration) -> Self {
        self.log_file_gc_interval = interval;
        self
    }

    /// Set the minimum discard ratio for GC eligibility.
    pub fn log_file_gc_ratio(mut self, ratio: f64) -> Self {
        self.log_file_gc_ratio = ratio;
        self
    }

    /// Set the discard table slot count.
    pub fn discard_buffer_size(mut self, slots: usize) -> Self {
        self.discard_buffer_size = slots;
        self
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.db_path.as_os_str().is_empty() {
            return Err(Error::InvalidOptions("db path must not be empty".into()));
        }
        if self.log_file_size_threshold < 64 * 1024 {
            return Err(Error::InvalidOptions(
                "log file size threshold must be at least 64 KiB".into(),
            ));
        }
        // Discard slots store sizes as u32.
        if self.log_file_size_threshold > u32::MAX as u64 {
            return Err(Error::InvalidOptions(
                "log file size threshold must fit in 4 GiB".into(),
            ));
        }
        if !(self.log_file_gc_ratio > 0.0 && self.log_file_gc_ratio <= 1.0) {
            return Err(Error::InvalidOptions(
                "gc ratio must be within (0, 1]".into(),
            ));
        }
        if self.discard_buffer_size == 0 {
            return Err(Error::InvalidOptions(
                "discard buffer size must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
