//! Positional IO strategies behind a common contract.
//!
//! `FileIo` issues pread/pwrite against an ordinary file handle. `MmapIo`
//! maps the file at its rotation threshold up front, so appends are plain
//! memory copies and the sequential scans of reopen and GC avoid syscalls
//! entirely.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use memmap2::MmapMut;

use crate::error::{Error, Result};

/// Contract shared by the IO strategies. Writes only ever target the
/// active file and are serialized by the engine's per-type write lock;
/// concurrent reads are safe.
pub trait LogIo: Send + Sync {
    /// Reads up to `buf.len()` bytes at `offset`, returning how many were
    /// available. Zero means `offset` is at or past the end of the data.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize>;

    /// Writes all of `buf` at `offset`.
    fn write_at(&self, buf: &[u8], offset: u64) -> Result<()>;

    /// Flushes OS buffers (and the mapped region, if any).
    fn sync(&self) -> Result<()>;

    /// Shrinks the file to `size` bytes. No reads past `size` may follow.
    fn truncate(&self, size: u64) -> Result<()>;
}

fn open_file(path: &Path) -> Result<File> {
    Ok(OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(path)?)
}

/// Standard positional file IO.
pub struct FileIo {
    file: File,
}

impl FileIo {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            file: open_file(path)?,
        })
    }
}

impl LogIo for FileIo {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        use std::os::unix::fs::FileExt;

        let mut read = 0;
        while read < buf.len() {
            let n = self.file.read_at(&mut buf[read..], offset + read as u64)?;
            if n == 0 {
                break;
            }
            read += n;
        }
        Ok(read)
    }

    fn write_at(&self, buf: &[u8], offset: u64) -> Result<()> {
        use std::os::unix::fs::FileExt;

        Ok(self.file.write_all_at(buf, offset)?)
    }

    fn sync(&self) -> Result<()> {
        Ok(self.file.sync_all()?)
    }

    fn truncate(&self, size: u64) -> Result<()> {
        Ok(self.file.set_len(size)?)
    }
}

/// Memory-mapped IO. The file is extended to `capacity` and mapped
/// read-write; `data_len` tracks the readable extent so a scan cannot
/// wander into a region released by `truncate`.
pub struct MmapIo {
    file: File,
    map: RwLock<MmapMut>,
    data_len: AtomicU64,
}

impl MmapIo {
    pub fn open(path: &Path, capacity: u64) -> Result<Self> {
        let file = open_file(path)?;
        let map_len = file.metadata()?.len().max(capacity);
        file.set_len(map_len)?;

        // Safe as long as no other process mutates the file; the engine
        // holds an exclusive directory lock.
        let map = unsafe { MmapMut::map_mut(&file)? };

        Ok(Self {
            file,
            map: RwLock::new(map),
            data_len: AtomicU64::new(map_len),
        })
    }
}

impl LogIo for MmapIo {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let data_len = self.data_len.load(Ordering::Acquire);
        if offset >= data_len {
            return Ok(0);
        }
        let map = self.map.read()?;
        let n = buf.len().min((data_len - offset) as usize);
        buf[..n].copy_from_slice(&map[offset as usize..offset as usize + n]);
        Ok(n)
    }

    fn write_at(&self, buf: &[u8], offset: u64) -> Result<()> {
        let mut map = self.map.write()?;
        let end = offset as usize + buf.len();
        if end > map.len() {
            return Err(Error::Io(format!(
                "mmap write of {} bytes at {} exceeds capacity {}",
                buf.len(),
                offset,
                map.len()
            )));
        }
        map[offset as usize..end].copy_from_slice(buf);
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        self.map.read()?.flush()?;
        Ok(())
    }

    fn truncate(&self, size: u64) -> Result<()> {
        self.map.read()?.flush()?;
        self.file.set_len(size)?;
        self.data_len.store(size, Ordering::Release);
        Ok(())
    }
}
