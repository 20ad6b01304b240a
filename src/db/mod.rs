//! The storage engine.
//!
//! One [`Shard`] per data type bundles everything that type's reader/writer
//! lock protects: the in-memory index, the active log file, and the sealed
//! files. Reads take the lock in shared mode, writes and GC relocations in
//! exclusive mode.
//!
//! ```text
//!             EmberDb
//!   ┌───────────┼──────────────────┐
//!   │           │                  │
//! Shard<StringIndex>  …  Shard<ZSetIndex>     (one per data type)
//!   │
//!   ├─ RwLock ─ index + active LogFile + sealed LogFiles
//!   └─ Discard (slot file + listener thread)
//! ```

pub mod gc;
pub mod hash;
pub mod list;
pub mod recovery;
pub mod set;
pub mod strs;
pub mod zset;

use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use crate::config::{IndexMode, Options};
use crate::discard::Discard;
use crate::error::{Error, Result};
use crate::flock::FileLock;
use crate::index::{HashIndex, ListIndex, SetIndex, StringIndex, ValueLocator, ZSetIndex};
use crate::logfile::{DataKind, LogEntry, LogFile};

/// State guarded by a data type's reader/writer lock.
pub(crate) struct ShardInner<I> {
    pub index: I,
    pub active: Arc<LogFile>,
    pub sealed: BTreeMap<u32, Arc<LogFile>>,
}

/// Everything one data type owns.
pub(crate) struct Shard<I> {
    pub kind: DataKind,
    pub inner: RwLock<ShardInner<I>>,
    pub discard: Discard,
    /// One GC pass per type at a time.
    pub gc_running: AtomicBool,
}

/// Appends an entry to the shard's active file, rotating first if the
/// write would overflow it. Callers hold the shard's write lock.
pub(crate) fn append_entry<I>(
    shard: &Shard<I>,
    inner: &mut ShardInner<I>,
    opts: &Options,
    entry: &LogEntry,
) -> Result<ValueLocator> {
    let buf = entry.encode();
    let size = buf.len() as u64;
    if size > opts.log_file_size_threshold {
        return Err(Error::Io(format!(
            "entry of {size} bytes exceeds the log file size threshold"
        )));
    }
    if inner.active.write_offset() + size > opts.log_file_size_threshold {
        rotate(shard, inner, opts)?;
    }

    let offset = inner.active.append(&buf)?;
    if opts.sync {
        inner.active.sync()?;
    }
    Ok(ValueLocator::new(inner.active.file_id(), offset, size))
}

fn rotate<I>(shard: &Shard<I>, inner: &mut ShardInner<I>, opts: &Options) -> Result<()> {
    inner.active.sync()?;

    let next_id = inner.active.file_id() + 1;
    let dir = opts.db_path.join(shard.kind.name());
    let new = LogFile::open(
        &dir,
        shard.kind,
        next_id,
        opts.io_type,
        opts.log_file_size_threshold,
    )?;
    shard.discard.set_total(next_id, opts.log_file_size_threshold)?;
    tracing::debug!(
        kind = shard.kind.name(),
        file_id = next_id,
        "rotated active log file"
    );

    let old = std::mem::replace(&mut inner.active, Arc::new(new));
    inner.sealed.insert(old.file_id(), old);
    Ok(())
}

/// Reads the log entry a locator points at.
pub(crate) fn read_entry_at<I>(inner: &ShardInner<I>, loc: &ValueLocator) -> Result<LogEntry> {
    let file = if inner.active.file_id() == loc.file_id {
        &inner.active
    } else {
        inner
            .sealed
            .get(&loc.file_id)
            .ok_or(Error::LogFileNotFound(loc.file_id))?
    };
    let (entry, _) = file.read(loc.offset)?;
    Ok(entry)
}

/// Resolves a locator to its value: the cached copy in `KeyValue` mode,
/// the log otherwise.
pub(crate) fn read_value<I>(inner: &ShardInner<I>, loc: &ValueLocator) -> Result<Vec<u8>> {
    if let Some(value) = &loc.value {
        return Ok(value.clone());
    }
    Ok(read_entry_at(inner, loc)?.value)
}

/// Attaches a cached value to a locator in `KeyValue` mode.
pub(crate) fn cache_value(mut loc: ValueLocator, mode: IndexMode, value: &[u8]) -> ValueLocator {
    if mode == IndexMode::KeyValue {
        loc.value = Some(value.to_vec());
    }
    loc
}

/// An embedded multi-structure key-value store over append-only logs.
///
/// Safe for concurrent use from many threads; all operations run to
/// completion or return an error.
impl std::fmt::Debug for EmberDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmberDb").finish_non_exhaustive()
    }
}

pub struct EmberDb {
    pub(crate) opts: Options,
    lock: Mutex<Option<FileLock>>,
    pub(crate) strs: Shard<StringIndex>,
    pub(crate) lists: Shard<ListIndex>,
    pub(crate) hashes: Shard<HashIndex>,
    pub(crate) sets: Shard<SetIndex>,
    pub(crate) zsets: Shard<ZSetIndex>,
}

impl EmberDb {
    /// Opens (creating if needed) the database rooted at
    /// `options.db_path`, replaying every log file to rebuild the
    /// indices. Fails if another process holds the directory.
    pub fn open(opts: Options) -> Result<Self> {
        opts.validate()?;
        fs::create_dir_all(&opts.db_path)?;
        let lock = FileLock::acquire(&opts.db_path)?;

        let started = Instant::now();
        let db = Self {
            strs: recovery::load_shard(&opts, DataKind::String)?,
            lists: recovery::load_shard(&opts, DataKind::List)?,
            hashes: recovery::load_shard(&opts, DataKind::Hash)?,
            sets: recovery::load_shard(&opts, DataKind::Set)?,
            zsets: recovery::load_shard(&opts, DataKind::ZSet)?,
            lock: Mutex::new(Some(lock)),
            opts,
        };
        tracing::info!(
            path = %db.opts.db_path.display(),
            elapsed = ?started.elapsed(),
            "opened database"
        );
        Ok(db)
    }

    pub fn options(&self) -> &Options {
        &self.opts
    }

    /// Flushes every active log file and discard table.
    pub fn sync(&self) -> Result<()> {
        sync_shard(&self.strs)?;
        sync_shard(&self.lists)?;
        sync_shard(&self.hashes)?;
        sync_shard(&self.sets)?;
        sync_shard(&self.zsets)?;
        Ok(())
    }

    pub(crate) fn sync_discards(&self) -> Result<()> {
        self.strs.discard.sync()?;
        self.lists.discard.sync()?;
        self.hashes.discard.sync()?;
        self.sets.discard.sync()?;
        self.zsets.discard.sync()?;
        Ok(())
    }

    /// Flushes and trims every log file, stops the discard listeners, and
    /// releases the directory lock. Idempotent; the handle must not be
    /// used afterwards.
    pub fn close(&self) -> Result<()> {
        close_shard(&self.strs)?;
        close_shard(&self.lists)?;
        close_shard(&self.hashes)?;
        close_shard(&self.sets)?;
        close_shard(&self.zsets)?;
        // Dropping the lock releases the directory to other processes.
        self.lock.lock()?.take();
        tracing::info!(path = %self.opts.db_path.display(), "closed database");
        Ok(())
    }

    /// Copies the database into `dir` while all five types are
    /// write-locked, yielding a directory a fresh instance can open.
    pub fn backup(&self, dir: impl AsRef<Path>) -> Result<()> {
        let target = dir.as_ref();
        fs::create_dir_all(target)?;

        // Exclusive over every type for a consistent cut.
        let strs = self.strs.inner.write()?;
        let lists = self.lists.inner.write()?;
        let hashes = self.hashes.inner.write()?;
        let sets = self.sets.inner.write()?;
        let zsets = self.zsets.inner.write()?;

        backup_shard(&self.strs, &strs, &self.opts, target)?;
        backup_shard(&self.lists, &lists, &self.opts, target)?;
        backup_shard(&self.hashes, &hashes, &self.opts, target)?;
        backup_shard(&self.sets, &sets, &self.opts, target)?;
        backup_shard(&self.zsets, &zsets, &self.opts, target)?;
        Ok(())
    }
}

impl Drop for EmberDb {
    fn drop(&mut self) {
        let needs_close = self.lock.lock().map(|l| l.is_some()).unwrap_or(false);
        if needs_close {
            // Not closed explicitly; flush what we can.
            let _ = self.close();
        }
    }
}

fn sync_shard<I>(shard: &Shard<I>) -> Result<()> {
    {
        let inner = shard.inner.read()?;
        inner.active.sync()?;
    }
    shard.discard.sync()
}

fn close_shard<I>(shard: &Shard<I>) -> Result<()> {
    {
        let inner = shard.inner.read()?;
        inner.active.close()?;
        for file in inner.sealed.values() {
            file.close()?;
        }
    }
    shard.discard.close()
}

fn backup_shard<I>(
    shard: &Shard<I>,
    inner: &ShardInner<I>,
    opts: &Options,
    target: &Path,
) -> Result<()> {
    inner.active.sync()?;
    shard.discard.sync()?;

    let kind_dir = target.join(shard.kind.name());
    fs::create_dir_all(&kind_dir)?;

    // Copy log files only up to their data size; a memory-mapped active
    // file is threshold-sized on disk.
    for file in inner.sealed.values().chain([&inner.active]) {
        let name = shard.kind.log_file_name(file.file_id());
        copy_prefix(file.path(), &kind_dir.join(name), file.write_offset())?;
    }

    let discard_name = shard.kind.discard_file_name();
    let src = opts.db_path.join(shard.kind.name()).join(&discard_name);
    fs::copy(&src, kind_dir.join(&discard_name))?;
    Ok(())
}

fn copy_prefix(src: &Path, dst: &Path, len: u64) -> Result<()> {
    let mut reader = fs::File::open(src)?.take(len);
    let mut writer = fs::File::create(dst)?;
    std::io::copy(&mut reader, &mut writer)?;
    writer.sync_all()?;
    Ok(())
}
