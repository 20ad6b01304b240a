//! Per-type discard statistics backing GC candidate selection.
//!
//! Each data type persists a fixed-capacity array of 12-byte slots:
//!
//! ```text
//! +-------------+-----------+---------------+
//! | file_id:u32 | total:u32 | discarded:u32 |   (big-endian)
//! +-------------+-----------+---------------+
//! ```
//!
//! A slot with `file_id == 0` is free. Increment traffic from the write
//! path is batched through a channel and applied by a listener thread so
//! hot writers never block on the slot file; `sync` round-trips a flush
//! marker through the same channel, guaranteeing every prior increment is
//! applied and persisted when it returns.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use byteorder::{BigEndian, ByteOrder};

use crate::error::{Error, Result};

const SLOT_SIZE: usize = 12;

/// Upper bound on candidates returned by a single `get_ccl` call; the next
/// GC pass picks up whatever was left behind.
const CCL_MAX: usize = 16;

#[derive(Debug, Clone, Copy)]
struct SlotStat {
    slot: usize,
    total: u32,
    discarded: u32,
}

struct Table {
    file: File,
    stats: HashMap<u32, SlotStat>,
    free: Vec<usize>,
}

impl Table {
    fn write_slot(&self, slot: usize, file_id: u32, total: u32, discarded: u32) -> Result<()> {
        use std::os::unix::fs::FileExt;

        let mut buf = [0u8; SLOT_SIZE];
        BigEndian::write_u32(&mut buf[0..4], file_id);
        BigEndian::write_u32(&mut buf[4..8], total);
        BigEndian::write_u32(&mut buf[8..12], discarded);
        self.file
            .write_all_at(&buf, (slot * SLOT_SIZE) as u64)
            .map_err(Error::from)
    }

    fn incr(&mut self, file_id: u32, delta: u64) -> Result<()> {
        let Some(stat) = self.stats.get_mut(&file_id) else {
            // No slot was allocated for this file, typically because the
            // table was full when it became active. Stats stay best-effort.
            return Ok(());
        };
        stat.discarded = stat.discarded.saturating_add(delta.min(u32::MAX as u64) as u32);
        let stat = *stat;
        self.write_slot(stat.slot, file_id, stat.total, stat.discarded)
    }
}

enum Msg {
    Incr { file_id: u32, delta: u64 },
    Flush(SyncSender<()>),
}

/// Discard table for one data type.
pub struct Discard {
    path: PathBuf,
    inner: Arc<Mutex<Table>>,
    tx: Mutex<Option<Sender<Msg>>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Discard {
    /// Opens (creating if absent) the slot file and starts the listener.
    pub fn open(path: impl AsRef<Path>, capacity: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)?;
        file.set_len((capacity * SLOT_SIZE) as u64)?;

        let mut raw = vec![0u8; capacity * SLOT_SIZE];
        {
            use std::os::unix::fs::FileExt;
            file.read_exact_at(&mut raw, 0)?;
        }

        let mut stats = HashMap::new();
        let mut free = Vec::new();
        for slot in 0..capacity {
            let buf = &raw[slot * SLOT_SIZE..(slot + 1) * SLOT_SIZE];
            let file_id = BigEndian::read_u32(&buf[0..4]);
            if file_id == 0 {
                free.push(slot);
            } else {
                stats.insert(
                    file_id,
                    SlotStat {
                        slot,
                        total: BigEndian::read_u32(&buf[4..8]),
                        discarded: BigEndian::read_u32(&buf[8..12]),
                    },
                );
            }
        }
        // Allocate low slots first.
        free.reverse();

        let inner = Arc::new(Mutex::new(Table { file, stats, free }));
        let (tx, rx) = mpsc::channel();
        let listener = Self::spawn_listener(Arc::clone(&inner), rx, path.clone());

        Ok(Self {
            path,
            inner,
            tx: Mutex::new(Some(tx)),
            listener: Mutex::new(Some(listener)),
        })
    }

    fn spawn_listener(
        inner: Arc<Mutex<Table>>,
        rx: Receiver<Msg>,
        path: PathBuf,
    ) -> JoinHandle<()> {
        std::thread::spawn(move || {
            while let Ok(msg) = rx.recv() {
                match msg {
                    Msg::Incr { file_id, delta } => {
                        let Ok(mut table) = inner.lock() else { return };
                        if let Err(e) = table.incr(file_id, delta) {
                            tracing::warn!(path = %path.display(), error = %e,
                                "failed to persist discard increment");
                        }
                    }
                    Msg::Flush(ack) => {
                        if let Ok(table) = inner.lock() {
                            if let Err(e) = table.file.sync_all() {
                                tracing::warn!(path = %path.display(), error = %e,
                                    "failed to sync discard file");
                            }
                        }
                        let _ = ack.send(());
                    }
                }
            }
            // Channel closed: final best-effort sync.
            if let Ok(table) = inner.lock() {
                let _ = table.file.sync_all();
            }
        })
    }

    /// Records the capacity of a file that just became active. Preserves
    /// any discard count already accumulated for the id.
    pub fn set_total(&self, file_id: u32, total: u64) -> Result<()> {
        let mut table = self.inner.lock()?;
        let total = total.min(u32::MAX as u64) as u32;
        if let Some(stat) = table.stats.get_mut(&file_id) {
            stat.total = total;
            let stat = *stat;
            return table.write_slot(stat.slot, file_id, stat.total, stat.discarded);
        }
        let Some(slot) = table.free.pop() else {
            tracing::warn!(path = %self.path.display(), file_id,
                "discard table full, file will not be a gc candidate");
            return Ok(());
        };
        table.stats.insert(
            file_id,
            SlotStat {
                slot,
                total,
                discarded: 0,
            },
        );
        table.write_slot(slot, file_id, total, 0)
    }

    /// Queues a reclaimable-bytes increment for the file. Never blocks on
    /// the slot file.
    pub fn incr_discard(&self, file_id: u32, delta: u64) {
        if delta == 0 {
            return;
        }
        if let Ok(tx) = self.tx.lock() {
            if let Some(tx) = tx.as_ref() {
                let _ = tx.send(Msg::Incr { file_id, delta });
            }
        }
    }

    /// Releases the slot of a dropped file.
    pub fn clear(&self, file_id: u32) -> Result<()> {
        self.drain()?;
        let mut table = self.inner.lock()?;
        if let Some(stat) = table.stats.remove(&file_id) {
            table.free.push(stat.slot);
            table.write_slot(stat.slot, 0, 0, 0)?;
        }
        Ok(())
    }

    /// Applies every queued increment and syncs the slot file.
    pub fn sync(&self) -> Result<()> {
        self.drain()
    }

    fn drain(&self) -> Result<()> {
        let ack = {
            let tx = self.tx.lock()?;
            let Some(tx) = tx.as_ref() else {
                return Ok(());
            };
            let (ack_tx, ack_rx) = mpsc::sync_channel(1);
            tx.send(Msg::Flush(ack_tx))
                .map_err(|_| Error::Io("discard listener is gone".into()))?;
            ack_rx
        };
        ack.recv()
            .map_err(|_| Error::Io("discard listener is gone".into()))
    }

    /// Compaction candidate list: file ids whose discarded bytes exceed
    /// `threshold` and whose discard ratio meets `ratio`, highest ratio
    /// first. At most [`CCL_MAX`] entries.
    pub fn get_ccl(&self, threshold: u64, ratio: f64) -> Result<Vec<u32>> {
        self.drain()?;
        let table = self.inner.lock()?;

        let mut candidates: Vec<(u32, f64)> = table
            .stats
            .iter()
            .filter(|(_, stat)| stat.total > 0 && stat.discarded as u64 > threshold)
            .map(|(&fid, stat)| (fid, stat.discarded as f64 / stat.total as f64))
            .filter(|&(_, r)| r >= ratio)
            .collect();
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
        candidates.truncate(CCL_MAX);

        Ok(candidates.into_iter().map(|(fid, _)| fid).collect())
    }

    /// Stops the listener after applying everything still queued.
    pub fn close(&self) -> Result<()> {
        self.tx.lock()?.take();
        if let Some(listener) = self.listener.lock()?.take() {
            listener
                .join()
                .map_err(|_| Error::Io("discard listener panicked".into()))?;
        }
        Ok(())
    }
}

impl Drop for Discard {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_discard(dir: &Path) -> Discard {
        Discard::open(dir.join("discard.string"), 64).unwrap()
    }

    #[test]
    fn test_incr_and_ccl_ordering() {
        let dir = tempfile::TempDir::new().unwrap();
        let discard = open_discard(dir.path());

        discard.set_total(1, 1000).unwrap();
        discard.set_total(2, 1000).unwrap();
        discard.set_total(3, 1000).unwrap();

        discard.incr_discard(1, 300);
        discard.incr_discard(2, 900);
        discard.incr_discard(3, 500);

        let ccl = discard.get_ccl(10, 0.3).unwrap();
        assert_eq!(ccl, vec![2, 3, 1]);

        // Ratio filter drops the low file; threshold drops everything else.
        assert_eq!(discard.get_ccl(10, 0.4).unwrap(), vec![2, 3]);
        assert_eq!(discard.get_ccl(899, 0.3).unwrap(), vec![2]);
    }

    #[test]
    fn test_increments_accumulate() {
        let dir = tempfile::TempDir::new().unwrap();
        let discard = open_discard(dir.path());

        discard.set_total(7, 100).unwrap();
        for _ in 0..10 {
            discard.incr_discard(7, 5);
        }
        assert_eq!(discard.get_ccl(0, 0.5).unwrap(), vec![7]);
        assert!(discard.get_ccl(0, 0.51).unwrap().is_empty());
    }

    #[test]
    fn test_clear_releases_slot() {
        let dir = tempfile::TempDir::new().unwrap();
        let discard = open_discard(dir.path());

        discard.set_total(4, 100).unwrap();
        discard.incr_discard(4, 100);
        assert_eq!(discard.get_ccl(0, 1.0).unwrap(), vec![4]);

        discard.clear(4).unwrap();
        assert!(discard.get_ccl(0, 0.0).unwrap().is_empty());
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        {
            let discard = open_discard(dir.path());
            discard.set_total(9, 200).unwrap();
            discard.incr_discard(9, 150);
            discard.sync().unwrap();
            discard.close().unwrap();
        }

        let discard = open_discard(dir.path());
        assert_eq!(discard.get_ccl(0, 0.7).unwrap(), vec![9]);
        // set_total on a known id keeps the discarded count.
        discard.set_total(9, 400).unwrap();
        assert_eq!(discard.get_ccl(0, 0.3).unwrap(), vec![9]);
        assert!(discard.get_ccl(0, 0.5).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_file_ignored() {
        let dir = tempfile::TempDir::new().unwrap();
        let discard = open_discard(dir.path());
        discard.incr_discard(42, 1000);
        assert!(discard.get_ccl(0, 0.0).unwrap().is_empty());
    }
}
