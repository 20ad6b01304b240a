//! Hash operations. Each field is its own log entry keyed by
//! `(user key, field)`.

use crate::encoding::encode_hash_key;
use crate::error::Result;
use crate::index::HashIndex;
use crate::logfile::LogEntry;

use super::{append_entry, cache_value, read_value, EmberDb, ShardInner};

impl EmberDb {
    /// Sets `field` of the hash at `key`.
    pub fn hset(&self, key: &[u8], field: &[u8], value: &[u8]) -> Result<()> {
        let mut inner = self.hashes.inner.write()?;
        self.hset_inner(&mut inner, key, field, value)
    }

    /// Sets `field` only if it is absent. Returns whether it was set.
    pub fn hsetnx(&self, key: &[u8], field: &[u8], value: &[u8]) -> Result<bool> {
        let mut inner = self.hashes.inner.write()?;
        if inner.index.get(key, field).is_some() {
            return Ok(false);
        }
        self.hset_inner(&mut inner, key, field, value)?;
        Ok(true)
    }

    fn hset_inner(
        &self,
        inner: &mut ShardInner<HashIndex>,
        key: &[u8],
        field: &[u8],
        value: &[u8],
    ) -> Result<()> {
        let entry = LogEntry::put(encode_hash_key(key, field), value.to_vec());
        let loc = append_entry(&self.hashes, inner, &self.opts, &entry)?;
        let loc = cache_value(loc, self.opts.index_mode, value);

        if let Some(old) = inner.index.put(key, field.to_vec(), loc) {
            self.hashes.discard.incr_discard(old.file_id, old.entry_size);
        }
        Ok(())
    }

    /// Value of `field`, `Ok(None)` if the key or field is absent.
    pub fn hget(&self, key: &[u8], field: &[u8]) -> Result<Option<Vec<u8>>> {
        let inner = self.hashes.inner.read()?;
        match inner.index.get(key, field) {
            Some(loc) => read_value(&inner, loc).map(Some),
            None => Ok(None),
        }
    }

    /// Values of several fields, `None` for absent ones.
    pub fn hmget(&self, key: &[u8], fields: &[&[u8]]) -> Result<Vec<Option<Vec<u8>>>> {
        let inner = self.hashes.inner.read()?;
        fields
            .iter()
            .map(|field| match inner.index.get(key, field) {
                Some(loc) => read_value(&inner, loc).map(Some),
                None => Ok(None),
            })
            .collect()
    }

    /// Removes fields, returning how many existed.
    pub fn hdel(&self, key: &[u8], fields: &[&[u8]]) -> Result<usize> {
        let mut inner = self.hashes.inner.write()?;
        let mut removed = 0;
        for field in fields {
            if inner.index.get(key, field).is_none() {
                continue;
            }
            let entry = LogEntry::delete(encode_hash_key(key, field));
            let tomb = append_entry(&self.hashes, &mut inner, &self.opts, &entry)?;
            if let Some(old) = inner.index.remove(key, field) {
                self.hashes.discard.incr_discard(old.file_id, old.entry_size);
                self.hashes.discard.incr_discard(tomb.file_id, tomb.entry_size);
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Whether `field` exists in the hash at `key`.
    pub fn hexists(&self, key: &[u8], field: &[u8]) -> bool {
        self.hashes
            .inner
            .read()
            .map(|inner| inner.index.get(key, field).is_some())
            .unwrap_or(false)
    }

    /// Number of fields in the hash at `key`, zero if absent.
    pub fn hlen(&self, key: &[u8]) -> usize {
        self.hashes
            .inner
            .read()
            .map(|inner| inner.index.field_count(key))
            .unwrap_or(0)
    }

    /// All field names of the hash at `key`, in no particular order.
    pub fn hkeys(&self, key: &[u8]) -> Result<Vec<Vec<u8>>> {
        let inner = self.hashes.inner.read()?;
        Ok(inner
            .index
            .keys
            .get(key)
            .map(|fields| fields.keys().cloned().collect())
            .unwrap_or_default())
    }

    /// All values of the hash at `key`, in no particular order.
    pub fn hvals(&self, key: &[u8]) -> Result<Vec<Vec<u8>>> {
        let inner = self.hashes.inner.read()?;
        let Some(fields) = inner.index.keys.get(key) else {
            return Ok(Vec::new());
        };
        fields.values().map(|loc| read_value(&inner, loc)).collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{IndexMode, IoType, Options};
    use crate::db::EmberDb;

    fn modes() -> [(IoType, IndexMode); 2] {
        [
            (IoType::FileIo, IndexMode::KeyOnly),
            (IoType::MMap, IndexMode::KeyValue),
        ]
    }

    #[test]
    fn test_hset_hget() {
        for (io_type, index_mode) in modes() {
            let dir = tempfile::TempDir::new().unwrap();
            let db = EmberDb::open(
                Options::new(dir.path())
                    .io_type(io_type)
                    .index_mode(index_mode),
            )
            .unwrap();

            assert_eq!(db.hget(b"h", b"f").unwrap(), None);

            db.hset(b"h", b"f", b"v1").unwrap();
            assert_eq!(db.hget(b"h", b"f").unwrap().unwrap(), b"v1");

            db.hset(b"h", b"f", b"v2").unwrap();
            assert_eq!(db.hget(b"h", b"f").unwrap().unwrap(), b"v2");
            assert_eq!(db.hlen(b"h"), 1);
            db.close().unwrap();
        }
    }

    #[test]
    fn test_hsetnx() {
        let dir = tempfile::TempDir::new().unwrap();
        let db = EmberDb::open(Options::new(dir.path())).unwrap();

        assert!(db.hsetnx(b"h", b"f", b"first").unwrap());
        assert!(!db.hsetnx(b"h", b"f", b"second").unwrap());
        assert_eq!(db.hget(b"h", b"f").unwrap().unwrap(), b"first");
        db.close().unwrap();
    }

    #[test]
    fn test_hdel_hexists() {
        let dir = tempfile::TempDir::new().unwrap();
        let db = EmberDb::open(Options::new(dir.path())).unwrap();

        db.hset(b"h", b"f1", b"1").unwrap();
        db.hset(b"h", b"f2", b"2").unwrap();
        db.hset(b"h", b"f3", b"3").unwrap();

        assert!(db.hexists(b"h", b"f1"));
        assert_eq!(db.hdel(b"h", &[b"f1", b"missing", b"f3"]).unwrap(), 2);
        assert!(!db.hexists(b"h", b"f1"));
        assert_eq!(db.hlen(b"h"), 1);
        db.close().unwrap();
    }

    #[test]
    fn test_hkeys_hvals() {
        let dir = tempfile::TempDir::new().unwrap();
        let db = EmberDb::open(Options::new(dir.path())).unwrap();

        db.hset(b"h", b"a", b"1").unwrap();
        db.hset(b"h", b"b", b"2").unwrap();

        let mut keys = db.hkeys(b"h").unwrap();
        keys.sort();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec()]);

        let mut vals = db.hvals(b"h").unwrap();
        vals.sort();
        assert_eq!(vals, vec![b"1".to_vec(), b"2".to_vec()]);

        assert!(db.hkeys(b"missing").unwrap().is_empty());
        assert!(db.hvals(b"missing").unwrap().is_empty());
        db.close().unwrap();
    }

    #[test]
    fn test_hash_reopen() {
        for (io_type, index_mode) in modes() {
            let dir = tempfile::TempDir::new().unwrap();
            let opts = Options::new(dir.path())
                .io_type(io_type)
                .index_mode(index_mode);

            let db = EmberDb::open(opts.clone()).unwrap();
            db.hset(b"h", b"kept", b"v").unwrap();
            db.hset(b"h", b"dropped", b"x").unwrap();
            db.hdel(b"h", &[b"dropped"]).unwrap();
            db.close().unwrap();

            let db = EmberDb::open(opts).unwrap();
            assert_eq!(db.hget(b"h", b"kept").unwrap().unwrap(), b"v");
            assert_eq!(db.hget(b"h", b"dropped").unwrap(), None);
            assert_eq!(db.hlen(b"h"), 1);
            db.close().unwrap();
        }
    }
}
