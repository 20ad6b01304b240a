//! Sorted-set operations.
//!
//! The on-disk key is `(user key, score_bits, member)` with the member
//! repeated as the value, so a record is self-describing on replay; the
//! index carries the score separately. Member map and rank skiplist
//! mutate together under the zset write lock.

use crate::encoding::{decode_score, encode_score, encode_zset_key};
use crate::error::Result;
use crate::logfile::LogEntry;

use super::{append_entry, cache_value, EmberDb};

impl EmberDb {
    /// Adds `member` with `score`, replacing the score of an existing
    /// member.
    pub fn zadd(&self, key: &[u8], score: f64, member: &[u8]) -> Result<()> {
        let score_bits = encode_score(score);
        let mut inner = self.zsets.inner.write()?;

        let entry = LogEntry::put(encode_zset_key(key, score_bits, member), member.to_vec());
        let loc = append_entry(&self.zsets, &mut inner, &self.opts, &entry)?;
        let loc = cache_value(loc, self.opts.index_mode, member);

        if let Some(old) = inner.index.or_default(key).insert(member, score_bits, loc) {
            self.zsets
                .discard
                .incr_discard(old.loc.file_id, old.loc.entry_size);
        }
        Ok(())
    }

    /// Score of `member`, if present.
    pub fn zscore(&self, key: &[u8], member: &[u8]) -> Option<f64> {
        let inner = self.zsets.inner.read().ok()?;
        let node = inner.index.set(key)?.get(member)?;
        Some(decode_score(node.score_bits))
    }

    /// Removes `member`, returning whether it was present.
    pub fn zrem(&self, key: &[u8], member: &[u8]) -> Result<bool> {
        let mut inner = self.zsets.inner.write()?;
        let Some(node) = inner.index.set(key).and_then(|set| set.get(member)).cloned() else {
            return Ok(false);
        };

        let entry = LogEntry::delete(encode_zset_key(key, node.score_bits, member));
        let tomb = append_entry(&self.zsets, &mut inner, &self.opts, &entry)?;
        if let Some(old) = inner.index.remove_member(key, member) {
            self.zsets
                .discard
                .incr_discard(old.loc.file_id, old.loc.entry_size);
            self.zsets.discard.incr_discard(tomb.file_id, tomb.entry_size);
        }
        Ok(true)
    }

    /// Number of members, zero if absent.
    pub fn zcard(&self, key: &[u8]) -> usize {
        self.zsets
            .inner
            .read()
            .map(|inner| inner.index.set(key).map_or(0, |set| set.card()))
            .unwrap_or(0)
    }

    /// Members between ranks `start` and `stop` inclusive, ascending by
    /// score. Negatives count from the highest rank; the range is clamped
    /// and an empty clamp yields an empty vec.
    pub fn zrange(&self, key: &[u8], start: i64, stop: i64) -> Result<Vec<Vec<u8>>> {
        self.range_inner(key, start, stop, false)
    }

    /// Like [`zrange`](Self::zrange) but descending by score.
    pub fn zrevrange(&self, key: &[u8], start: i64, stop: i64) -> Result<Vec<Vec<u8>>> {
        self.range_inner(key, start, stop, true)
    }

    fn range_inner(&self, key: &[u8], start: i64, stop: i64, rev: bool) -> Result<Vec<Vec<u8>>> {
        let inner = self.zsets.inner.read()?;
        let Some(set) = inner.index.set(key) else {
            return Ok(Vec::new());
        };
        let len = set.card() as i64;

        let mut start = start;
        if start < 0 {
            start += len;
        }
        let mut stop = stop;
        if stop < 0 {
            stop += len;
        }
        start = start.max(0);
        stop = stop.min(len - 1);
        if start > stop || start >= len {
            return Ok(Vec::new());
        }

        let take = (stop - start + 1) as usize;
        let members: Vec<Vec<u8>> = if rev {
            set.ranks
                .iter()
                .rev()
                .skip(start as usize)
                .take(take)
                .map(|entry| entry.key().1.clone())
                .collect()
        } else {
            set.ranks
                .iter()
                .skip(start as usize)
                .take(take)
                .map(|entry| entry.key().1.clone())
                .collect()
        };
        Ok(members)
    }

    /// Ascending rank of `member` (0 = lowest score), if present.
    pub fn zrank(&self, key: &[u8], member: &[u8]) -> Option<usize> {
        let inner = self.zsets.inner.read().ok()?;
        inner.index.set(key)?.rank(member)
    }

    /// Descending rank of `member` (0 = highest score), if present.
    pub fn zrevrank(&self, key: &[u8], member: &[u8]) -> Option<usize> {
        let inner = self.zsets.inner.read().ok()?;
        let set = inner.index.set(key)?;
        Some(set.card() - 1 - set.rank(member)?)
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
    fn test_zadd_zscore_replace() {
        for (io_type, index_mode) in modes() {
            let dir = tempfile::TempDir::new().unwrap();
            let db = EmberDb::open(
                Options::new(dir.path())
                    .io_type(io_type)
                    .index_mode(index_mode),
            )
            .unwrap();

            assert_eq!(db.zscore(b"z", b"m"), None);

            db.zadd(b"z", 123.33, b"m").unwrap();
            assert_eq!(db.zscore(b"z", b"m"), Some(123.33));

            db.zadd(b"z", 223.33, b"m").unwrap();
            assert_eq!(db.zscore(b"z", b"m"), Some(223.33));
            assert_eq!(db.zcard(b"z"), 1);
            db.close().unwrap();
        }
    }

    #[test]
    fn test_zrem_zcard() {
        let dir = tempfile::TempDir::new().unwrap();
        let db = EmberDb::open(Options::new(dir.path())).unwrap();

        db.zadd(b"z", 11.33, b"a").unwrap();
        db.zadd(b"z", 21.33, b"b").unwrap();
        db.zadd(b"z", 31.33, b"c").unwrap();
        assert_eq!(db.zcard(b"z"), 3);

        assert!(db.zrem(b"z", b"b").unwrap());
        assert!(!db.zrem(b"z", b"b").unwrap());
        assert_eq!(db.zcard(b"z"), 2);
        assert_eq!(db.zscore(b"z", b"b"), None);
        db.close().unwrap();
    }

    #[test]
    fn test_zrank_zrevrank() {
        let dir = tempfile::TempDir::new().unwrap();
        let db = EmberDb::open(Options::new(dir.path())).unwrap();

        for i in 0..100i64 {
            db.zadd(b"z", (i + 100) as f64, format!("key-{i}").as_bytes())
                .unwrap();
        }

        assert_eq!(db.zrank(b"z", b"missing"), None);
        assert_eq!(db.zrank(b"z", b"key-3"), Some(3));
        assert_eq!(db.zrevrank(b"z", b"key-1"), Some(98));

        // Ranks are complementary: rank + revrank == card - 1.
        for member in [b"key-0".as_slice(), b"key-42", b"key-99"] {
            let rank = db.zrank(b"z", member).unwrap();
            let rev = db.zrevrank(b"z", member).unwrap();
            assert_eq!(rank + rev, db.zcard(b"z") - 1);
        }
        db.close().unwrap();
    }

    #[test]
    fn test_zrange_orders_by_score() {
        let dir = tempfile::TempDir::new().unwrap();
        let db = EmberDb::open(Options::new(dir.path())).unwrap();

        db.zadd(b"z", 32.55, b"m0").unwrap();
        db.zadd(b"z", 99.34, b"m1").unwrap();
        db.zadd(b"z", 31.33, b"m2").unwrap();
        db.zadd(b"z", 54.10, b"m3").unwrap();

        assert_eq!(
            db.zrange(b"z", 0, 100).unwrap(),
            vec![b"m2".to_vec(), b"m0".to_vec(), b"m3".to_vec(), b"m1".to_vec()]
        );
        assert_eq!(
            db.zrange(b"z", -2, -1).unwrap(),
            vec![b"m3".to_vec(), b"m1".to_vec()]
        );
        assert_eq!(
            db.zrevrange(b"z", 1, 2).unwrap(),
            vec![b"m3".to_vec(), b"m0".to_vec()]
        );
        assert!(db.zrange(b"z", 5, 10).unwrap().is_empty());
        assert!(db.zrange(b"missing", 0, -1).unwrap().is_empty());
        db.close().unwrap();
    }

    #[test]
    fn test_negative_scores_sort_first() {
        let dir = tempfile::TempDir::new().unwrap();
        let db = EmberDb::open(Options::new(dir.path())).unwrap();

        db.zadd(b"z", 5.0, b"pos").unwrap();
        db.zadd(b"z", -5.0, b"neg").unwrap();
        db.zadd(b"z", 0.0, b"zero").unwrap();

        assert_eq!(
            db.zrange(b"z", 0, -1).unwrap(),
            vec![b"neg".to_vec(), b"zero".to_vec(), b"pos".to_vec()]
        );
        db.close().unwrap();
    }

    #[test]
    fn test_zset_reopen() {
        for (io_type, index_mode) in modes() {
            let dir = tempfile::TempDir::new().unwrap();
            let opts = Options::new(dir.path())
                .io_type(io_type)
                .index_mode(index_mode);

            let db = EmberDb::open(opts.clone()).unwrap();
            db.zadd(b"z", 123.33, b"m").unwrap();
            db.zadd(b"z", 223.33, b"m").unwrap();
            db.zadd(b"z", 50.0, b"gone").unwrap();
            db.zrem(b"z", b"gone").unwrap();
            db.close().unwrap();

            let db = EmberDb::open(opts).unwrap();
            assert_eq!(db.zscore(b"z", b"m"), Some(223.33));
            assert_eq!(db.zscore(b"z", b"gone"), None);
            assert_eq!(db.zcard(b"z"), 1);
            assert_eq!(db.zrank(b"z", b"m"), Some(0));
            db.close().unwrap();
        }
    }
}
