//! String operations.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::{Error, Result};
use crate::index::StringIndex;
use crate::logfile::LogEntry;

use super::{append_entry, cache_value, read_value, EmberDb, ShardInner};

impl EmberDb {
    /// Sets `key` to `value`, replacing any previous value.
    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut inner = self.strs.inner.write()?;
        self.set_inner(&mut inner, key, value, 0)
    }

    /// Like [`set`](Self::set), additionally recording a deadline in the
    /// entry. The deadline is persisted for the key but not evaluated;
    /// expiry is outside the engine's semantics.
    pub fn set_ex(&self, key: &[u8], value: &[u8], ttl: Duration) -> Result<()> {
        let expire_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| Error::Io(e.to_string()))?
            .saturating_add(ttl)
            .as_secs();
        let mut inner = self.strs.inner.write()?;
        self.set_inner(&mut inner, key, value, expire_at)
    }

    /// Sets `key` only if it does not exist. Returns whether it was set.
    pub fn set_nx(&self, key: &[u8], value: &[u8]) -> Result<bool> {
        let mut inner = self.strs.inner.write()?;
        if inner.index.contains(key) {
            return Ok(false);
        }
        self.set_inner(&mut inner, key, value, 0)?;
        Ok(true)
    }

    /// Sets several keys under one exclusive acquisition.
    pub fn mset(&self, pairs: &[(&[u8], &[u8])]) -> Result<()> {
        let mut inner = self.strs.inner.write()?;
        for (key, value) in pairs {
            self.set_inner(&mut inner, key, value, 0)?;
        }
        Ok(())
    }

    fn set_inner(
        &self,
        inner: &mut ShardInner<StringIndex>,
        key: &[u8],
        value: &[u8],
        expire_at: u64,
    ) -> Result<()> {
        let mut entry = LogEntry::put(key.to_vec(), value.to_vec());
        entry.expire_at = expire_at;

        let loc = append_entry(&self.strs, inner, &self.opts, &entry)?;
        let loc = cache_value(loc, self.opts.index_mode, value);
        if let Some(old) = inner.index.put(key.to_vec(), loc) {
            self.strs.discard.incr_discard(old.file_id, old.entry_size);
        }
        Ok(())
    }

    /// Returns the value of `key`, or [`Error::KeyNotFound`].
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let inner = self.strs.inner.read()?;
        let loc = inner.index.get(key).ok_or(Error::KeyNotFound)?;
        read_value(&inner, loc)
    }

    /// Returns each key's value, `None` for the absent ones.
    pub fn mget(&self, keys: &[&[u8]]) -> Result<Vec<Option<Vec<u8>>>> {
        let inner = self.strs.inner.read()?;
        keys.iter()
            .map(|key| match inner.index.get(key) {
                Some(loc) => read_value(&inner, loc).map(Some),
                None => Ok(None),
            })
            .collect()
    }

    /// Appends `value` to the existing value of `key`, or sets it if the
    /// key is absent.
    pub fn append(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut inner = self.strs.inner.write()?;
        let combined = match inner.index.get(key) {
            Some(loc) => {
                let mut current = read_value(&inner, loc)?;
                current.extend_from_slice(value);
                current
            }
            None => value.to_vec(),
        };
        self.set_inner(&mut inner, key, &combined, 0)
    }

    /// Length of the value stored at `key`, zero if absent or unreadable.
    pub fn str_len(&self, key: &[u8]) -> usize {
        let Ok(inner) = self.strs.inner.read() else {
            return 0;
        };
        inner
            .index
            .get(key)
            .and_then(|loc| read_value(&inner, loc).ok())
            .map_or(0, |value| value.len())
    }

    /// Removes `key`. A tombstone is appended even if the key is absent,
    /// matching the write-path contract that every mutation is logged.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        let mut inner = self.strs.inner.write()?;
        let entry = LogEntry::delete(key.to_vec());
        let tomb = append_entry(&self.strs, &mut inner, &self.opts, &entry)?;

        if let Some(old) = inner.index.remove(key) {
            self.strs.discard.incr_discard(old.file_id, old.entry_size);
            // The tombstone has taken effect; its own bytes are garbage.
            self.strs.discard.incr_discard(tomb.file_id, tomb.entry_size);
        }
        Ok(())
    }
}
