//! EmberDB: an embedded, multi-structure key-value store.
//!
//! Durable state lives in per-type append-only log files; lookups are
//! served from in-memory indices rebuilt by replay on open. Five data
//! types share one log format and one garbage collector: String, List,
//! Hash, Set, and Sorted Set.
//!
//! ```text
//!              EmberDb
//!    ┌──────┬────┼─────┬───────┐
//! string   list hash  set    zset        one shard per type:
//!    │                                   index + active log file
//!    ├── log.string.00000001  (sealed)   + sealed files + discard
//!    ├── log.string.00000002  (active)
//!    └── discard.string
//! ```
//!
//! # Write path
//!
//! 1. Frame the operation as a checksummed log entry
//! 2. Append it to the type's active file, rotating at the size threshold
//! 3. Swing the in-memory index; the superseded entry's bytes are
//!    credited to the discard table
//!
//! # Read path
//!
//! 1. Look the key up in the type's index under the shared lock
//! 2. Return the cached value (`KeyValue` index mode), or read the log
//!    entry the locator points at and verify its checksum
//!
//! # Garbage collection
//!
//! Per-file discard statistics drive candidate selection; live entries of
//! a candidate are rewritten into the active file and the candidate is
//! deleted. See [`EmberDb::run_log_file_gc`] and the [`scheduler`] for
//! periodic sweeps.
//!
//! # Example
//!
//! ```no_run
//! use emberdb::{EmberDb, Options};
//!
//! # fn main() -> emberdb::Result<()> {
//! let db = EmberDb::open(Options::new("/tmp/emberdb"))?;
//! db.set(b"greeting", b"hello")?;
//! db.rpush(b"queue", &[b"a", b"b"])?;
//! assert_eq!(db.get(b"greeting")?, b"hello");
//! db.close()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod discard;
pub mod encoding;
pub mod error;
pub mod flock;
pub mod index;
pub mod logfile;
pub mod scheduler;

pub use config::{IndexMode, IoType, Options};
pub use db::EmberDb;
pub use error::{Error, Result};
pub use logfile::DataKind;
