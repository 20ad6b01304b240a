//! List operations.
//!
//! A list is point records keyed by `(user key, seq)` plus a ListMeta
//! record persisting the `(head, tail)` window, so replay can rebuild the
//! ordering without scanning for bounds. Every operation that moves a
//! bound appends a fresh ListMeta entry. `lrem` keeps the window dense by
//! rewriting displaced elements onto contiguous seqs, so the arithmetic
//! between logical indexes and seqs stays exact.

use crate::encoding::{encode_list_key, ListMeta};
use crate::error::{Error, Result};
use crate::index::{sequence_for, ListIndex, ValueLocator};
use crate::logfile::LogEntry;

use super::{append_entry, cache_value, read_value, EmberDb, ShardInner};

impl EmberDb {
    /// Prepends values to the list, leftmost last.
    pub fn lpush(&self, key: &[u8], values: &[&[u8]]) -> Result<()> {
        self.push(key, values, true, false)
    }

    /// Appends values to the list.
    pub fn rpush(&self, key: &[u8], values: &[&[u8]]) -> Result<()> {
        self.push(key, values, false, false)
    }

    /// [`lpush`](Self::lpush) that fails with [`Error::KeyNotFound`] when
    /// the list does not already exist.
    pub fn lpushx(&self, key: &[u8], values: &[&[u8]]) -> Result<()> {
        self.push(key, values, true, true)
    }

    /// [`rpush`](Self::rpush) that fails when the list does not exist.
    pub fn rpushx(&self, key: &[u8], values: &[&[u8]]) -> Result<()> {
        self.push(key, values, false, true)
    }

    fn push(&self, key: &[u8], values: &[&[u8]], left: bool, require_exists: bool) -> Result<()> {
        let mut inner = self.lists.inner.write()?;
        if require_exists && inner.index.list(key).is_none() {
            return Err(Error::KeyNotFound);
        }
        self.push_inner(&mut inner, key, values, left)
    }

    fn push_inner(
        &self,
        inner: &mut ShardInner<ListIndex>,
        key: &[u8],
        values: &[&[u8]],
        left: bool,
    ) -> Result<()> {
        for value in values {
            let seq = {
                let tree = inner.index.or_default(key);
                if left {
                    tree.head
                } else {
                    tree.tail
                }
            };

            let entry = LogEntry::put(encode_list_key(key, seq), value.to_vec());
            let loc = append_entry(&self.lists, inner, &self.opts, &entry)?;
            let loc = cache_value(loc, self.opts.index_mode, value);

            let tree = inner.index.or_default(key);
            if let Some(old) = tree.seqs.insert(seq, loc) {
                self.lists.discard.incr_discard(old.file_id, old.entry_size);
            }
            tree.widen(seq);
        }
        self.write_list_meta(inner, key)
    }

    /// Pops the leftmost element. `Ok(None)` on a missing or empty list.
    pub fn lpop(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut inner = self.lists.inner.write()?;
        self.pop_inner(&mut inner, key, true)
    }

    /// Pops the rightmost element.
    pub fn rpop(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut inner = self.lists.inner.write()?;
        self.pop_inner(&mut inner, key, false)
    }

    /// Pops one end of `src` and pushes it onto one end of `dst`,
    /// atomically under the list write lock. `Ok(None)` if `src` is
    /// missing or empty.
    pub fn lmove(
        &self,
        src: &[u8],
        dst: &[u8],
        src_left: bool,
        dst_left: bool,
    ) -> Result<Option<Vec<u8>>> {
        let mut inner = self.lists.inner.write()?;
        let Some(value) = self.pop_inner(&mut inner, src, src_left)? else {
            return Ok(None);
        };
        self.push_inner(&mut inner, dst, &[&value], dst_left)?;
        Ok(Some(value))
    }

    fn pop_inner(
        &self,
        inner: &mut ShardInner<ListIndex>,
        key: &[u8],
        left: bool,
    ) -> Result<Option<Vec<u8>>> {
        let Some(tree) = inner.index.list(key) else {
            return Ok(None);
        };
        // The edge element comes from the tree itself rather than window
        // arithmetic, tolerating a window healed after a crash.
        let edge = if left {
            tree.seqs.first_key_value()
        } else {
            tree.seqs.last_key_value()
        };
        let Some((&seq, loc)) = edge else {
            return Ok(None);
        };
        let loc = loc.clone();
        let value = read_value(inner, &loc)?;

        let entry = LogEntry::delete(encode_list_key(key, seq));
        let tomb = append_entry(&self.lists, inner, &self.opts, &entry)?;
        self.lists.discard.incr_discard(loc.file_id, loc.entry_size);
        self.lists.discard.incr_discard(tomb.file_id, tomb.entry_size);

        let Some(tree) = inner.index.list_mut(key) else {
            return Err(Error::Index("list vanished during pop".into()));
        };
        tree.seqs.remove(&seq);
        if left {
            tree.head = seq;
        } else {
            tree.tail = seq;
        }

        if tree.seqs.is_empty() {
            let stale_meta = tree.meta_loc.take();
            inner.index.remove_list(key);
            if let Some(meta) = stale_meta {
                self.lists.discard.incr_discard(meta.file_id, meta.entry_size);
            }
        } else {
            self.write_list_meta(inner, key)?;
        }
        Ok(Some(value))
    }

    fn write_list_meta(&self, inner: &mut ShardInner<ListIndex>, key: &[u8]) -> Result<()> {
        let Some(tree) = inner.index.list(key) else {
            return Ok(());
        };
        let meta = ListMeta {
            head: tree.head,
            tail: tree.tail,
        };
        let entry = LogEntry::list_meta(key.to_vec(), meta.encode());
        let loc = append_entry(&self.lists, inner, &self.opts, &entry)?;

        if let Some(tree) = inner.index.list_mut(key) {
            if let Some(old) = tree.meta_loc.replace(loc) {
                self.lists.discard.incr_discard(old.file_id, old.entry_size);
            }
        }
        Ok(())
    }

    /// Number of elements in the list, zero if missing.
    pub fn llen(&self, key: &[u8]) -> usize {
        self.lists
            .inner
            .read()
            .map(|inner| inner.index.list(key).map_or(0, |tree| tree.len()))
            .unwrap_or(0)
    }

    /// Element at the logical index, negatives counting from the tail.
    /// `Ok(None)` if the list is missing; [`Error::WrongIndex`] if the
    /// index falls outside an existing list.
    pub fn lindex(&self, key: &[u8], index: i64) -> Result<Option<Vec<u8>>> {
        let inner = self.lists.inner.read()?;
        let Some(tree) = inner.index.list(key) else {
            return Ok(None);
        };
        let seq = sequence_for(tree.head, tree.tail, index)?;
        let loc = tree
            .seqs
            .get(&seq)
            .cloned()
            .ok_or_else(|| Error::Index(format!("missing list element at seq {seq}")))?;
        read_value(&inner, &loc).map(Some)
    }

    /// Replaces the element at the logical index.
    pub fn lset(&self, key: &[u8], index: i64, value: &[u8]) -> Result<()> {
        let mut inner = self.lists.inner.write()?;
        let Some(tree) = inner.index.list(key) else {
            return Err(Error::KeyNotFound);
        };
        let seq = sequence_for(tree.head, tree.tail, index)?;
        let old = tree
            .seqs
            .get(&seq)
            .cloned()
            .ok_or_else(|| Error::Index(format!("missing list element at seq {seq}")))?;

        let entry = LogEntry::put(encode_list_key(key, seq), value.to_vec());
        let loc = append_entry(&self.lists, &mut inner, &self.opts, &entry)?;
        let loc = cache_value(loc, self.opts.index_mode, value);

        if let Some(tree) = inner.index.list_mut(key) {
            tree.seqs.insert(seq, loc);
        }
        self.lists.discard.incr_discard(old.file_id, old.entry_size);
        Ok(())
    }

    /// Elements between the logical indexes `start` and `end`, inclusive.
    /// Negatives count from the tail; `start` clamps to the head on
    /// underflow and `end` to the tail on overflow. [`Error::KeyNotFound`]
    /// if the list is missing, [`Error::WrongIndex`] if the clamped range
    /// is empty.
    pub fn lrange(&self, key: &[u8], start: i64, end: i64) -> Result<Vec<Vec<u8>>> {
        let inner = self.lists.inner.read()?;
        let tree = inner.index.list(key).ok_or(Error::KeyNotFound)?;
        let len = tree.len() as i64;
        if len == 0 {
            return Err(Error::KeyNotFound);
        }

        let mut start = start;
        if start < 0 {
            start += len;
        }
        let mut end = end;
        if end < 0 {
            end += len;
        }
        start = start.max(0);
        end = end.min(len - 1);
        if start > end || start >= len {
            return Err(Error::WrongIndex);
        }

        let first = sequence_for(tree.head, tree.tail, start)?;
        let last = sequence_for(tree.head, tree.tail, end)?;
        tree.seqs
            .range(first..=last)
            .map(|(_, loc)| read_value(&inner, loc))
            .collect()
    }

    /// Removes up to `count` elements equal to `value`: from the head if
    /// `count > 0`, from the tail if `count < 0`, all of them if zero.
    /// Returns how many were removed.
    pub fn lrem(&self, key: &[u8], count: i64, value: &[u8]) -> Result<usize> {
        let mut inner = self.lists.inner.write()?;
        let Some(tree) = inner.index.list(key) else {
            return Ok(0);
        };
        let head = tree.head;
        let items: Vec<(u32, ValueLocator)> = tree
            .seqs
            .iter()
            .map(|(&seq, loc)| (seq, loc.clone()))
            .collect();

        let mut values = Vec::with_capacity(items.len());
        for (_, loc) in &items {
            values.push(read_value(&inner, loc)?);
        }

        let limit = if count == 0 {
            usize::MAX
        } else {
            count.unsigned_abs() as usize
        };
        let mut remove = vec![false; items.len()];
        let mut removed = 0usize;
        let positions: Vec<usize> = if count >= 0 {
            (0..items.len()).collect()
        } else {
            (0..items.len()).rev().collect()
        };
        for i in positions {
            if removed == limit {
                break;
            }
            if values[i] == value {
                remove[i] = true;
                removed += 1;
            }
        }
        if removed == 0 {
            return Ok(0);
        }

        for (i, (seq, loc)) in items.iter().enumerate() {
            if !remove[i] {
                continue;
            }
            let entry = LogEntry::delete(encode_list_key(key, *seq));
            let tomb = append_entry(&self.lists, &mut inner, &self.opts, &entry)?;
            self.lists.discard.incr_discard(loc.file_id, loc.entry_size);
            self.lists.discard.incr_discard(tomb.file_id, tomb.entry_size);
        }

        if removed == items.len() {
            if let Some(tree) = inner.index.remove_list(key) {
                if let Some(meta) = tree.meta_loc {
                    self.lists.discard.incr_discard(meta.file_id, meta.entry_size);
                }
            }
            return Ok(removed);
        }

        // Repack the survivors onto contiguous seqs from the fixed head so
        // logical-index arithmetic stays exact. Elements whose seq did not
        // move keep their entry; the rest are rewritten at the new seq and
        // tombstoned at the old one, keeping replay in step.
        let mut packed = std::collections::BTreeMap::new();
        let mut next = 0u32;
        for (i, (seq, loc)) in items.iter().enumerate() {
            if remove[i] {
                continue;
            }
            let new_seq = head + 1 + next;
            next += 1;
            if *seq == new_seq {
                packed.insert(new_seq, loc.clone());
                continue;
            }
            let entry = LogEntry::put(encode_list_key(key, new_seq), values[i].clone());
            let new_loc = append_entry(&self.lists, &mut inner, &self.opts, &entry)?;
            packed.insert(new_seq, cache_value(new_loc, self.opts.index_mode, &values[i]));

            let entry = LogEntry::delete(encode_list_key(key, *seq));
            let tomb = append_entry(&self.lists, &mut inner, &self.opts, &entry)?;
            self.lists.discard.incr_discard(loc.file_id, loc.entry_size);
            self.lists.discard.incr_discard(tomb.file_id, tomb.entry_size);
        }

        if let Some(tree) = inner.index.list_mut(key) {
            tree.seqs = packed;
            tree.tail = head + 1 + next;
        }
        self.write_list_meta(&mut inner, key)?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{IndexMode, IoType, Options};
    use crate::db::EmberDb;
    use crate::error::Error;
    use std::path::Path;

    fn modes() -> [(IoType, IndexMode); 2] {
        [
            (IoType::FileIo, IndexMode::KeyOnly),
            (IoType::MMap, IndexMode::KeyValue),
        ]
    }

    fn open_db(dir: &Path, io_type: IoType, index_mode: IndexMode) -> EmberDb {
        EmberDb::open(
            Options::new(dir)
                .io_type(io_type)
                .index_mode(index_mode),
        )
        .unwrap()
    }

    fn seed_mixed(db: &EmberDb, key: &[u8]) {
        db.lpush(key, &[b"zero"]).unwrap();
        db.lpush(key, &[b"negative one"]).unwrap();
        db.rpush(key, &[b"one", b"two", b"three"]).unwrap();
    }

    #[test]
    fn test_push_ordering() {
        for (io_type, index_mode) in modes() {
            let dir = tempfile::TempDir::new().unwrap();
            let db = open_db(dir.path(), io_type, index_mode);

            seed_mixed(&db, b"k");
            assert_eq!(db.llen(b"k"), 5);
            assert_eq!(
                db.lrange(b"k", 0, -1).unwrap(),
                vec![
                    b"negative one".to_vec(),
                    b"zero".to_vec(),
                    b"one".to_vec(),
                    b"two".to_vec(),
                    b"three".to_vec(),
                ]
            );
            db.close().unwrap();
        }
    }

    #[test]
    fn test_pop_reverses_push() {
        for (io_type, index_mode) in modes() {
            let dir = tempfile::TempDir::new().unwrap();
            let db = open_db(dir.path(), io_type, index_mode);

            assert_eq!(db.lpop(b"k").unwrap(), None);
            assert_eq!(db.rpop(b"k").unwrap(), None);

            db.lpush(b"k", &[b"a", b"b", b"c"]).unwrap();
            let mut popped = Vec::new();
            while db.llen(b"k") > 0 {
                popped.push(db.lpop(b"k").unwrap().unwrap());
            }
            assert_eq!(popped, vec![b"c".to_vec(), b"b".to_vec(), b"a".to_vec()]);

            // Fully popped lists read as absent.
            assert_eq!(db.lrange(b"k", 0, -1), Err(Error::KeyNotFound));

            db.rpush(b"k", &[b"a", b"b", b"c"]).unwrap();
            let mut popped = Vec::new();
            while db.llen(b"k") > 0 {
                popped.push(db.rpop(b"k").unwrap().unwrap());
            }
            assert_eq!(popped, vec![b"c".to_vec(), b"b".to_vec(), b"a".to_vec()]);
            db.close().unwrap();
        }
    }

    #[test]
    fn test_lindex_bounds() {
        for (io_type, index_mode) in modes() {
            let dir = tempfile::TempDir::new().unwrap();
            let db = open_db(dir.path(), io_type, index_mode);

            assert_eq!(db.lindex(b"k", 0).unwrap(), None);

            seed_mixed(&db, b"k");
            assert_eq!(db.lindex(b"k", 0).unwrap().unwrap(), b"negative one");
            assert_eq!(db.lindex(b"k", 1).unwrap().unwrap(), b"zero");
            assert_eq!(db.lindex(b"k", -1).unwrap().unwrap(), b"three");
            assert_eq!(db.lindex(b"k", -4).unwrap().unwrap(), b"zero");
            assert_eq!(db.lindex(b"k", 5), Err(Error::WrongIndex));
            assert_eq!(db.lindex(b"k", -6), Err(Error::WrongIndex));
            db.close().unwrap();
        }
    }

    #[test]
    fn test_lrange_clamping() {
        let dir = tempfile::TempDir::new().unwrap();
        let db = open_db(dir.path(), IoType::FileIo, IndexMode::KeyOnly);
        seed_mixed(&db, b"k");

        assert_eq!(db.lrange(b"k", 1, 1).unwrap(), vec![b"zero".to_vec()]);
        assert_eq!(db.lrange(b"k", 4, 4).unwrap(), vec![b"three".to_vec()]);
        assert_eq!(db.lrange(b"k", 0, 8).unwrap().len(), 5);
        assert_eq!(db.lrange(b"k", -100, 100).unwrap().len(), 5);
        assert_eq!(
            db.lrange(b"k", -4, 2).unwrap(),
            vec![b"zero".to_vec(), b"one".to_vec()]
        );
        assert_eq!(db.lrange(b"k", 5, 10), Err(Error::WrongIndex));
        assert_eq!(db.lrange(b"k", 1, -8), Err(Error::WrongIndex));
        assert_eq!(db.lrange(b"k", -1, 1), Err(Error::WrongIndex));
        assert_eq!(db.lrange(b"missing", 0, -1), Err(Error::KeyNotFound));
        db.close().unwrap();
    }

    #[test]
    fn test_lset() {
        for (io_type, index_mode) in modes() {
            let dir = tempfile::TempDir::new().unwrap();
            let db = open_db(dir.path(), io_type, index_mode);

            assert_eq!(db.lset(b"k", 0, b"x"), Err(Error::KeyNotFound));

            db.rpush(b"k", &[b"a", b"b", b"c"]).unwrap();
            db.lset(b"k", 0, b"first").unwrap();
            db.lset(b"k", 1, b"second").unwrap();
            db.lset(b"k", -1, b"third").unwrap();
            assert_eq!(
                db.lrange(b"k", 0, -1).unwrap(),
                vec![b"first".to_vec(), b"second".to_vec(), b"third".to_vec()]
            );
            assert_eq!(db.lset(b"k", 3, b"x"), Err(Error::WrongIndex));
            assert_eq!(db.lset(b"k", -4, b"x"), Err(Error::WrongIndex));
            db.close().unwrap();
        }
    }

    #[test]
    fn test_lmove() {
        let dir = tempfile::TempDir::new().unwrap();
        let db = open_db(dir.path(), IoType::FileIo, IndexMode::KeyOnly);

        assert_eq!(db.lmove(b"src", b"dst", true, true).unwrap(), None);

        db.rpush(b"src", &[b"1", b"2", b"3", b"4", b"5"]).unwrap();

        assert_eq!(db.lmove(b"src", b"dst", true, true).unwrap().unwrap(), b"1");
        assert_eq!(db.lmove(b"src", b"dst", true, false).unwrap().unwrap(), b"2");
        assert_eq!(db.lmove(b"src", b"dst", false, true).unwrap().unwrap(), b"5");
        assert_eq!(db.lmove(b"src", b"dst", false, false).unwrap().unwrap(), b"4");

        assert_eq!(db.lrange(b"src", 0, -1).unwrap(), vec![b"3".to_vec()]);
        assert_eq!(
            db.lrange(b"dst", 0, -1).unwrap(),
            vec![b"5".to_vec(), b"1".to_vec(), b"2".to_vec(), b"4".to_vec()]
        );
        db.close().unwrap();
    }

    #[test]
    fn test_pushx_requires_list() {
        for (io_type, index_mode) in modes() {
            let dir = tempfile::TempDir::new().unwrap();
            let db = open_db(dir.path(), io_type, index_mode);

            assert_eq!(db.lpushx(b"k", &[b"v"]), Err(Error::KeyNotFound));
            assert_eq!(db.rpushx(b"k", &[b"v"]), Err(Error::KeyNotFound));

            db.lpush(b"k", &[b"seed"]).unwrap();
            db.lpushx(b"k", &[b"left"]).unwrap();
            db.rpushx(b"k", &[b"right"]).unwrap();
            assert_eq!(
                db.lrange(b"k", 0, -1).unwrap(),
                vec![b"left".to_vec(), b"seed".to_vec(), b"right".to_vec()]
            );
            db.close().unwrap();
        }
    }

    #[test]
    fn test_lrem_counts() {
        for (io_type, index_mode) in modes() {
            let dir = tempfile::TempDir::new().unwrap();
            let db = open_db(dir.path(), io_type, index_mode);

            // Missing list removes nothing.
            assert_eq!(db.lrem(b"k", 1, b"1").unwrap(), 0);
            assert_eq!(db.lrem(b"k", 0, b"1").unwrap(), 0);
            assert_eq!(db.lrem(b"k", -1, b"1").unwrap(), 0);

            db.rpush(b"k", &[b"1", b"2", b"1", b"3", b"3", b"4"]).unwrap();

            // No matches leaves the list untouched.
            assert_eq!(db.lrem(b"k", 1, b"5").unwrap(), 0);
            assert_eq!(db.llen(b"k"), 6);

            assert_eq!(db.lrem(b"k", 3, b"1").unwrap(), 2);
            assert_eq!(
                db.lrange(b"k", 0, -1).unwrap(),
                vec![b"2".to_vec(), b"3".to_vec(), b"3".to_vec(), b"4".to_vec()]
            );

            assert_eq!(db.lrem(b"k", -3, b"3").unwrap(), 2);
            assert_eq!(
                db.lrange(b"k", 0, -1).unwrap(),
                vec![b"2".to_vec(), b"4".to_vec()]
            );

            assert_eq!(db.lrem(b"k", 0, b"2").unwrap(), 1);
            assert_eq!(db.lrange(b"k", 0, -1).unwrap(), vec![b"4".to_vec()]);

            // Tail-side removals.
            db.rpush(b"k", &[b"3", b"2", b"1"]).unwrap();
            assert_eq!(db.lrem(b"k", 1, b"4").unwrap(), 1);
            assert_eq!(db.lrem(b"k", -1, b"1").unwrap(), 1);
            assert_eq!(
                db.lrange(b"k", 0, -1).unwrap(),
                vec![b"3".to_vec(), b"2".to_vec()]
            );
            db.close().unwrap();
        }
    }

    #[test]
    fn test_lrem_survives_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let opts = Options::new(dir.path());

        let db = EmberDb::open(opts.clone()).unwrap();
        db.rpush(b"k", &[b"1", b"2", b"1", b"3", b"3", b"4"]).unwrap();
        assert_eq!(db.lrem(b"k", 3, b"1").unwrap(), 2);
        assert_eq!(db.lrem(b"k", -3, b"3").unwrap(), 2);
        db.close().unwrap();

        let db = EmberDb::open(opts).unwrap();
        assert_eq!(db.llen(b"k"), 2);
        assert_eq!(
            db.lrange(b"k", 0, -1).unwrap(),
            vec![b"2".to_vec(), b"4".to_vec()]
        );
        db.close().unwrap();
    }

    #[test]
    fn test_llen_survives_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let opts = Options::new(dir.path());

        let db = EmberDb::open(opts.clone()).unwrap();
        db.lpush(b"k", &[b"a", b"b", b"c"]).unwrap();
        assert_eq!(db.llen(b"k"), 3);
        db.close().unwrap();

        let db = EmberDb::open(opts).unwrap();
        db.lpush(b"k", &[b"d", b"e", b"f"]).unwrap();
        assert_eq!(db.llen(b"k"), 6);
        db.close().unwrap();
    }

    #[test]
    fn test_order_survives_reopen_and_rotation() {
        for (io_type, index_mode) in modes() {
            let dir = tempfile::TempDir::new().unwrap();
            let opts = Options::new(dir.path())
                .io_type(io_type)
                .index_mode(index_mode)
                .log_file_size_threshold(64 * 1024);

            let db = EmberDb::open(opts.clone()).unwrap();
            for i in 0..500u32 {
                db.rpush(b"k", &[format!("item-{i:04}").as_bytes()]).unwrap();
            }
            db.lpop(b"k").unwrap();
            db.rpop(b"k").unwrap();
            let before = db.lrange(b"k", 0, -1).unwrap();
            db.close().unwrap();

            let db = EmberDb::open(opts).unwrap();
            assert_eq!(db.llen(b"k"), 498);
            assert_eq!(db.lrange(b"k", 0, -1).unwrap(), before);
            assert_eq!(db.lindex(b"k", 0).unwrap().unwrap(), b"item-0001");
            assert_eq!(db.lindex(b"k", -1).unwrap().unwrap(), b"item-0498");
            db.close().unwrap();
        }
    }

    #[test]
    fn test_lset_persists() {
        let dir = tempfile::TempDir::new().unwrap();
        let opts = Options::new(dir.path());

        let db = EmberDb::open(opts.clone()).unwrap();
        db.rpush(b"k", &[b"a", b"b"]).unwrap();
        db.lset(b"k", 0, b"replaced").unwrap();
        db.close().unwrap();

        let db = EmberDb::open(opts).unwrap();
        assert_eq!(
            db.lrange(b"k", 0, -1).unwrap(),
            vec![b"replaced".to_vec(), b"b".to_vec()]
        );
        db.close().unwrap();
    }
}
