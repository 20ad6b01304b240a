//! Log file garbage collection.
//!
//! Candidates come from the discard table, ratio-sorted. For each sealed
//! candidate the scan walks every entry and asks the index whether the
//! entry is still the live version of its logical key; live entries are
//! re-appended to the active file and the index is swung to the new
//! location under a brief exclusive acquisition per entry, so user
//! operations interleave with the pass. Once the scan completes, every
//! entry on the candidate is dead and the file is dropped.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::IndexMode;
use crate::encoding::{decode_hash_key, decode_list_key, decode_set_key, decode_zset_key};
use crate::error::{Error, Result};
use crate::index::{
    member_hash, HashIndex, ListIndex, SetIndex, StringIndex, ValueLocator, ZSetIndex,
};
use crate::logfile::{DataKind, EntryKind, LogEntry};

use super::{append_entry, cache_value, EmberDb, Shard};

/// Minimum reclaimable bytes before a file is worth considering at all;
/// the caller-supplied ratio is the real gate.
const GC_MIN_DISCARD_BYTES: u64 = 64;

/// Judges entry liveness and applies relocations for one index type.
pub(crate) trait GcIndex {
    /// Whether the entry at `(file_id, offset)` is what the index
    /// currently points at for its logical key.
    fn is_live(&self, entry: &LogEntry, file_id: u32, offset: u64) -> bool;

    /// Swings the logical key to the entry's rewritten location.
    fn relocate(&mut self, entry: &LogEntry, loc: ValueLocator, mode: IndexMode) -> Result<()>;
}

impl GcIndex for StringIndex {
    fn is_live(&self, entry: &LogEntry, file_id: u32, offset: u64) -> bool {
        entry.kind == EntryKind::Put
            && self
                .get(&entry.key)
                .is_some_and(|loc| loc.points_to(file_id, offset))
    }

    fn relocate(&mut self, entry: &LogEntry, loc: ValueLocator, mode: IndexMode) -> Result<()> {
        self.put(entry.key.clone(), cache_value(loc, mode, &entry.value));
        Ok(())
    }
}

impl GcIndex for ListIndex {
    fn is_live(&self, entry: &LogEntry, file_id: u32, offset: u64) -> bool {
        match entry.kind {
            EntryKind::Put => {
                let Ok((key, seq)) = decode_list_key(&entry.key) else {
                    return false;
                };
                self.list(&key)
                    .and_then(|tree| tree.seqs.get(&seq))
                    .is_some_and(|loc| loc.points_to(file_id, offset))
            }
            EntryKind::ListMeta => self
                .list(&entry.key)
                .and_then(|tree| tree.meta_loc.as_ref())
                .is_some_and(|loc| loc.points_to(file_id, offset)),
            EntryKind::Delete => false,
        }
    }

    fn relocate(&mut self, entry: &LogEntry, loc: ValueLocator, mode: IndexMode) -> Result<()> {
        match entry.kind {
            EntryKind::Put => {
                let (key, seq) = decode_list_key(&entry.key)?;
                if let Some(tree) = self.list_mut(&key) {
                    tree.seqs.insert(seq, cache_value(loc, mode, &entry.value));
                }
            }
            EntryKind::ListMeta => {
                if let Some(tree) = self.list_mut(&entry.key) {
                    tree.meta_loc = Some(loc);
                }
            }
            EntryKind::Delete => {}
        }
        Ok(())
    }
}

impl GcIndex for HashIndex {
    fn is_live(&self, entry: &LogEntry, file_id: u32, offset: u64) -> bool {
        if entry.kind != EntryKind::Put {
            return false;
        }
        let Ok((key, field)) = decode_hash_key(&entry.key) else {
            return false;
        };
        self.get(&key, &field)
            .is_some_and(|loc| loc.points_to(file_id, offset))
    }

    fn relocate(&mut self, entry: &LogEntry, loc: ValueLocator, mode: IndexMode) -> Result<()> {
        let (key, field) = decode_hash_key(&entry.key)?;
        self.put(&key, field, cache_value(loc, mode, &entry.value));
        Ok(())
    }
}

impl GcIndex for SetIndex {
    fn is_live(&self, entry: &LogEntry, file_id: u32, offset: u64) -> bool {
        if entry.kind != EntryKind::Put {
            return false;
        }
        let Ok((key, member)) = decode_set_key(&entry.key) else {
            return false;
        };
        self.get(&key, member_hash(&member))
            .is_some_and(|loc| loc.points_to(file_id, offset))
    }

    fn relocate(&mut self, entry: &LogEntry, loc: ValueLocator, mode: IndexMode) -> Result<()> {
        let (key, member) = decode_set_key(&entry.key)?;
        self.put(&key, member_hash(&member), cache_value(loc, mode, &member));
        Ok(())
    }
}

impl GcIndex for ZSetIndex {
    fn is_live(&self, entry: &LogEntry, file_id: u32, offset: u64) -> bool {
        if entry.kind != EntryKind::Put {
            return false;
        }
        let Ok((key, _, member)) = decode_zset_key(&entry.key) else {
            return false;
        };
        self.set(&key)
            .and_then(|set| set.get(&member))
            .is_some_and(|node| node.loc.points_to(file_id, offset))
    }

    fn relocate(&mut self, entry: &LogEntry, loc: ValueLocator, mode: IndexMode) -> Result<()> {
        let (key, score_bits, member) = decode_zset_key(&entry.key)?;
        self.or_default(&key)
            .insert(&member, score_bits, cache_value(loc, mode, &member));
        Ok(())
    }
}

/// Clears the per-type "GC in progress" flag on scope exit.
struct GcGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for GcGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

impl EmberDb {
    /// Collects sealed log files of `kind` whose discard ratio meets
    /// `ratio`. A non-zero `file_id` restricts the pass to that file.
    /// If a pass for the type is already running, returns without doing
    /// anything.
    pub fn run_log_file_gc(&self, kind: DataKind, file_id: u32, ratio: f64) -> Result<()> {
        match kind {
            DataKind::String => gc_shard(self, &self.strs, file_id, ratio),
            DataKind::List => gc_shard(self, &self.lists, file_id, ratio),
            DataKind::Hash => gc_shard(self, &self.hashes, file_id, ratio),
            DataKind::Set => gc_shard(self, &self.sets, file_id, ratio),
            DataKind::ZSet => gc_shard(self, &self.zsets, file_id, ratio),
        }
    }
}

fn gc_shard<I: GcIndex>(db: &EmberDb, shard: &Shard<I>, file_id: u32, ratio: f64) -> Result<()> {
    if shard.gc_running.swap(true, Ordering::SeqCst) {
        tracing::warn!(kind = shard.kind.name(), "gc already running, skipping");
        return Ok(());
    }
    let _guard = GcGuard {
        flag: &shard.gc_running,
    };

    let active_id = shard.inner.read()?.active.file_id();
    let mut candidates = shard.discard.get_ccl(GC_MIN_DISCARD_BYTES, ratio)?;
    candidates.retain(|&fid| fid < active_id && (file_id == 0 || fid == file_id));
    if candidates.is_empty() {
        return Ok(());
    }

    for fid in candidates {
        let Some(file) = shard.inner.read()?.sealed.get(&fid).cloned() else {
            continue;
        };

        let mut offset = 0u64;
        let mut rewritten = 0u64;
        loop {
            match file.read(offset) {
                Ok((entry, size)) => {
                    if entry.kind != EntryKind::Delete {
                        let mut inner = shard.inner.write()?;
                        if inner.index.is_live(&entry, fid, offset) {
                            let loc = append_entry(shard, &mut inner, &db.opts, &entry)?;
                            inner.index.relocate(&entry, loc, db.opts.index_mode)?;
                            // Dead on the candidate now that it moved.
                            shard.discard.incr_discard(fid, size);
                            rewritten += 1;
                        }
                    }
                    offset += size;
                }
                Err(Error::EndOfEntry) => break,
                Err(e) => {
                    tracing::warn!(
                        kind = shard.kind.name(),
                        file_id = fid,
                        offset,
                        error = %e,
                        "gc pass aborted, file kept"
                    );
                    return Err(e);
                }
            }
        }

        // Every live entry has been moved off; drop the file.
        shard.inner.write()?.sealed.remove(&fid);
        file.delete()?;
        shard.discard.clear(fid)?;
        tracing::info!(
            kind = shard.kind.name(),
            file_id = fid,
            rewritten,
            "collected log file"
        );
    }
    Ok(())
}
