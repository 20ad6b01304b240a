//! Bounded append-only log files.
//!
//! Each data type owns a sequence of log files named
//! `log.<type>.<00000001>` inside its subdirectory. Exactly one file per
//! type is active (writable); the rest are sealed and immutable until GC
//! drops them. Entries are addressed by byte offset and framed by the
//! [`entry`] codec.

pub mod entry;
pub mod io;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::IoType;
use crate::error::{Error, Result};

pub use entry::{EntryKind, LogEntry, CRC32, MAX_HEADER_SIZE};
use io::{FileIo, LogIo, MmapIo};

/// The five data types, each with its own log files, index, and discard
/// table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    String,
    List,
    Hash,
    Set,
    ZSet,
}

impl DataKind {
    pub const ALL: [DataKind; 5] = [
        DataKind::String,
        DataKind::List,
        DataKind::Hash,
        DataKind::Set,
        DataKind::ZSet,
    ];

    /// Name used in directory, log file, and discard file names.
    pub fn name(&self) -> &'static str {
        match self {
            DataKind::String => "string",
            DataKind::List => "list",
            DataKind::Hash => "hash",
            DataKind::Set => "set",
            DataKind::ZSet => "zset",
        }
    }

    pub fn log_file_name(&self, file_id: u32) -> String {
        format!("log.{}.{:08}", self.name(), file_id)
    }

    pub fn discard_file_name(&self) -> String {
        format!("discard.{}", self.name())
    }

    /// Extracts the file id from a log file name of this kind.
    pub fn parse_file_id(&self, file_name: &str) -> Option<u32> {
        let prefix = format!("log.{}.", self.name());
        file_name.strip_prefix(&prefix)?.parse().ok()
    }
}

/// A single bounded append-only log file.
///
/// Appends are serialized by the owning engine's per-type write lock;
/// reads are safe from any thread. Callers must check the write offset
/// against the size threshold and rotate before an overflowing append.
pub struct LogFile {
    file_id: u32,
    path: PathBuf,
    write_offset: AtomicU64,
    io: Box<dyn LogIo>,
}

impl std::fmt::Debug for LogFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogFile")
            .field("file_id", &self.file_id)
            .field("path", &self.path)
            .field("write_offset", &self.write_offset)
            .finish()
    }
}

impl LogFile {
    /// Opens (creating if absent) the log file with the given id inside
    /// `dir`, the data type's subdirectory.
    pub fn open(
        dir: &Path,
        kind: DataKind,
        file_id: u32,
        io_type: IoType,
        size_threshold: u64,
    ) -> Result<Self> {
        let path = dir.join(kind.log_file_name(file_id));
        // Captured before MmapIo extends the file to the threshold. Replay
        // re-establishes the true offset for files with a zero-filled tail.
        let init_size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);

        let io: Box<dyn LogIo> = match io_type {
            IoType::FileIo => Box::new(FileIo::open(&path)?),
            IoType::MMap => Box::new(MmapIo::open(&path, size_threshold)?),
        };

        Ok(Self {
            file_id,
            path,
            write_offset: AtomicU64::new(init_size),
            io,
        })
    }

    pub fn file_id(&self) -> u32 {
        self.file_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_offset(&self) -> u64 {
        self.write_offset.load(Ordering::Acquire)
    }

    /// Resets the append position, used by replay after it finds the last
    /// good entry.
    pub fn set_write_offset(&self, offset: u64) {
        self.write_offset.store(offset, Ordering::Release);
    }

    /// Reads the entry at `offset`, returning it with its on-disk size.
    /// `EndOfEntry` past the last entry, `InvalidCrc` on corruption.
    pub fn read(&self, offset: u64) -> Result<(LogEntry, u64)> {
        let mut header_buf = [0u8; MAX_HEADER_SIZE];
        let n = self.io.read_at(&mut header_buf, offset)?;
        let header = entry::decode_header(&header_buf[..n])?;

        let payload_len = header.key_size + header.value_size;
        let total = (header.len + payload_len) as u64;

        let mut payload = vec![0u8; payload_len];
        if payload_len > 0 {
            let m = self.io.read_at(&mut payload, offset + header.len as u64)?;
            if m < payload_len {
                return Err(Error::EndOfEntry);
            }
        }

        let mut digest = CRC32.digest();
        digest.update(&header_buf[4..header.len]);
        digest.update(&payload);
        if digest.finalize() != header.crc {
            return Err(Error::InvalidCrc);
        }

        let value = payload.split_off(header.key_size);
        Ok((
            LogEntry {
                kind: header.kind,
                key: payload,
                value,
                expire_at: header.expire_at,
            },
            total,
        ))
    }

    /// Appends pre-encoded entry bytes, returning the offset they were
    /// written at. Must be called under the engine's per-type write lock.
    pub fn append(&self, buf: &[u8]) -> Result<u64> {
        let offset = self.write_offset.fetch_add(buf.len() as u64, Ordering::AcqRel);
        self.io.write_at(buf, offset)?;
        Ok(offset)
    }

    /// Flushes OS buffers and the mapped region if applicable.
    pub fn sync(&self) -> Result<()> {
        self.io.sync()
    }

    /// Flushes and trims the file to its data size, releasing the
    /// zero-filled mmap tail. Reads must not follow.
    pub fn close(&self) -> Result<()> {
        self.io.sync()?;
        self.io.truncate(self.write_offset())
    }

    /// Removes the file from disk. Outstanding handles can still read it
    /// until they drop.
    pub fn delete(&self) -> Result<()> {
        Ok(std::fs::remove_file(&self.path)?)
    }
}
