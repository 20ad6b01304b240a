//! Index reconstruction on open.
//!
//! Each data type's log files are scanned in ascending file-id order and
//! every entry is applied to the in-memory index exactly as a live write
//! would be, minus the append. A corrupt or truncated trailing entry ends
//! that file's replay at the last good offset; later files still replay.
//! The highest-id file becomes the active file.

use std::collections::BTreeMap;
use std::fs;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, RwLock};

use crate::config::{IndexMode, Options};
use crate::discard::Discard;
use crate::encoding::{
    decode_hash_key, decode_list_key, decode_set_key, decode_zset_key, ListMeta,
};
use crate::error::{Error, Result};
use crate::index::{
    member_hash, HashIndex, ListIndex, SetIndex, StringIndex, ValueLocator, ZSetIndex,
};
use crate::logfile::{DataKind, EntryKind, LogEntry, LogFile};

use super::{cache_value, Shard, ShardInner};

/// Applies replayed entries to an index the way the live write path does.
pub(crate) trait ReplayIndex: Default {
    fn apply(&mut self, entry: &LogEntry, loc: ValueLocator, mode: IndexMode) -> Result<()>;

    /// Called once after the last file of the type has been replayed.
    fn finish(&mut self) {}
}

impl ReplayIndex for StringIndex {
    fn apply(&mut self, entry: &LogEntry, loc: ValueLocator, mode: IndexMode) -> Result<()> {
        match entry.kind {
            EntryKind::Put => {
                self.put(entry.key.clone(), cache_value(loc, mode, &entry.value));
            }
            EntryKind::Delete => {
                self.remove(&entry.key);
            }
            EntryKind::ListMeta => {
                tracing::warn!("ignoring list meta entry in string log");
            }
        }
        Ok(())
    }
}

impl ReplayIndex for ListIndex {
    fn apply(&mut self, entry: &LogEntry, loc: ValueLocator, mode: IndexMode) -> Result<()> {
        match entry.kind {
            EntryKind::Put => {
                let (key, seq) = decode_list_key(&entry.key)?;
                let tree = self.or_default(&key);
                tree.seqs.insert(seq, cache_value(loc, mode, &entry.value));
                // A seq outside the window means the crash fell between
                // this record and its ListMeta entry; heal the bounds.
                tree.widen(seq);
            }
            EntryKind::Delete => {
                let (key, seq) = decode_list_key(&entry.key)?;
                if let Some(tree) = self.list_mut(&key) {
                    tree.seqs.remove(&seq);
                    if seq == tree.head + 1 {
                        tree.head = seq;
                    } else if seq + 1 == tree.tail {
                        tree.tail = seq;
                    }
                }
            }
            EntryKind::ListMeta => {
                let meta = ListMeta::decode(&entry.value)?;
                let tree = self.or_default(&entry.key);
                tree.head = meta.head;
                tree.tail = meta.tail;
                tree.meta_loc = Some(loc);
            }
        }
        Ok(())
    }

    fn finish(&mut self) {
        // A list whose every element was popped leaves only stale meta.
        self.lists.retain(|_, tree| !tree.seqs.is_empty());
    }
}

impl ReplayIndex for HashIndex {
    fn apply(&mut self, entry: &LogEntry, loc: ValueLocator, mode: IndexMode) -> Result<()> {
        let (key, field) = decode_hash_key(&entry.key)?;
        match entry.kind {
            EntryKind::Put => {
                self.put(&key, field, cache_value(loc, mode, &entry.value));
            }
            EntryKind::Delete => {
                self.remove(&key, &field);
            }
            EntryKind::ListMeta => {
                tracing::warn!("ignoring list meta entry in hash log");
            }
        }
        Ok(())
    }
}

impl ReplayIndex for SetIndex {
    fn apply(&mut self, entry: &LogEntry, loc: ValueLocator, mode: IndexMode) -> Result<()> {
        let (key, member) = decode_set_key(&entry.key)?;
        match entry.kind {
            EntryKind::Put => {
                // The entry value is empty; the member itself is the
                // useful cache.
                self.put(&key, member_hash(&member), cache_value(loc, mode, &member));
            }
            EntryKind::Delete => {
                self.remove(&key, member_hash(&member));
            }
            EntryKind::ListMeta => {
                tracing::warn!("ignoring list meta entry in set log");
            }
        }
        Ok(())
    }
}

impl ReplayIndex for ZSetIndex {
    fn apply(&mut self, entry: &LogEntry, loc: ValueLocator, mode: IndexMode) -> Result<()> {
        let (key, score_bits, member) = decode_zset_key(&entry.key)?;
        match entry.kind {
            EntryKind::Put => {
                self.or_default(&key).insert(
                    &member,
                    score_bits,
                    cache_value(loc, mode, &member),
                );
            }
            EntryKind::Delete => {
                self.remove_member(&key, &member);
            }
            EntryKind::ListMeta => {
                tracing::warn!("ignoring list meta entry in zset log");
            }
        }
        Ok(())
    }
}

/// Builds one data type's shard: opens its discard table, replays its log
/// files oldest first, and elects or creates the active file.
pub(crate) fn load_shard<I: ReplayIndex>(opts: &Options, kind: DataKind) -> Result<Shard<I>> {
    let dir = opts.db_path.join(kind.name());
    fs::create_dir_all(&dir)?;

    let discard = Discard::open(dir.join(kind.discard_file_name()), opts.discard_buffer_size)?;

    let mut file_ids: Vec<u32> = fs::read_dir(&dir)?
        .filter_map(|dent| dent.ok())
        .filter_map(|dent| kind.parse_file_id(&dent.file_name().to_string_lossy()))
        .collect();
    file_ids.sort_unstable();

    let mut index = I::default();
    let mut files = Vec::with_capacity(file_ids.len());
    let mut entries = 0u64;

    for &fid in &file_ids {
        let file = LogFile::open(&dir, kind, fid, opts.io_type, opts.log_file_size_threshold)?;
        let mut offset = 0u64;
        loop {
            match file.read(offset) {
                Ok((entry, size)) => {
                    index.apply(&entry, ValueLocator::new(fid, offset, size), opts.index_mode)?;
                    offset += size;
                    entries += 1;
                }
                Err(Error::EndOfEntry) => break,
                Err(Error::InvalidCrc) => {
                    tracing::warn!(
                        kind = kind.name(),
                        file_id = fid,
                        offset,
                        "corrupt entry, truncating replay of this file"
                    );
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        file.set_write_offset(offset);
        files.push(Arc::new(file));
    }
    index.finish();

    let active = match files.pop() {
        Some(file) => file,
        None => Arc::new(LogFile::open(
            &dir,
            kind,
            1,
            opts.io_type,
            opts.log_file_size_threshold,
        )?),
    };
    discard.set_total(active.file_id(), opts.log_file_size_threshold)?;

    tracing::debug!(
        kind = kind.name(),
        files = files.len() + 1,
        entries,
        active_file_id = active.file_id(),
        "replayed log files"
    );

    let sealed: BTreeMap<u32, Arc<LogFile>> =
        files.into_iter().map(|f| (f.file_id(), f)).collect();
    Ok(Shard {
        kind,
        inner: RwLock::new(ShardInner {
            index,
            active,
            sealed,
        }),
        discard,
        gc_running: AtomicBool::new(false),
    })
}
