//! Single-process ownership of the database directory.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const LOCK_FILE: &str = "emberdb.lock";

/// Exclusive advisory lock on the database root, held for the lifetime
/// of an open database. Dropping the value releases the lock; the lock
/// file itself is left behind (removing it would race a concurrent
/// opener) and records the owning pid for debugging.
pub struct FileLock {
    _file: File,
    path: PathBuf,
}

impl FileLock {
    /// Locks the database rooted at `db_path`, failing if another
    /// process already holds it.
    pub fn acquire(db_path: &Path) -> Result<Self> {
        let path = db_path.join(LOCK_FILE);
        let mut file = File::options()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;

        if !try_flock(&file)? {
            return Err(Error::Io(format!(
                "database at {} is locked by another process",
                db_path.display()
            )));
        }

        writeln!(file, "{}", std::process::id())?;
        file.flush()?;
        Ok(Self { _file: file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// `Ok(false)` when the lock is held elsewhere; errors are real IO
/// failures.
#[cfg(unix)]
fn try_flock(file: &File) -> Result<bool> {
    use std::os::unix::io::AsRawFd;

    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        return Ok(true);
    }
    let err = std::io::Error::last_os_error();
    if err.kind() == std::io::ErrorKind::WouldBlock {
        return Ok(false);
    }
    Err(err.into())
}

#[cfg(not(unix))]
fn try_flock(_file: &File) -> Result<bool> {
    // No advisory locking on this platform.
    Ok(true)
}
