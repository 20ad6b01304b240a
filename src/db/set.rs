//! Set operations.
//!
//! Members are stored in the entry key, `(user key, member)`, with an
//! empty value; the index keys them by a deterministic 64-bit hash.
//! Whenever a hash match decides membership the actual member bytes are
//! verified against the entry (or its cache) first.

use itertools::Itertools;

use crate::encoding::{decode_set_key, encode_set_key};
use crate::error::Result;
use crate::index::{member_hash, SetIndex, ValueLocator};
use crate::logfile::LogEntry;

use super::{append_entry, cache_value, read_entry_at, EmberDb, ShardInner};

/// Recovers the member bytes a locator stands for.
fn member_of(inner: &ShardInner<SetIndex>, loc: &ValueLocator) -> Result<Vec<u8>> {
    if let Some(member) = &loc.value {
        return Ok(member.clone());
    }
    let entry = read_entry_at(inner, loc)?;
    let (_, member) = decode_set_key(&entry.key)?;
    Ok(member)
}

/// Hash lookup plus reverse check of the member bytes.
fn contains(inner: &ShardInner<SetIndex>, key: &[u8], member: &[u8]) -> Result<bool> {
    match inner.index.get(key, member_hash(member)) {
        Some(loc) => Ok(member_of(inner, loc)? == member),
        None => Ok(false),
    }
}

impl EmberDb {
    /// Adds members to the set at `key`. Re-adding an existing member
    /// refreshes its entry.
    pub fn sadd(&self, key: &[u8], members: &[&[u8]]) -> Result<()> {
        let mut inner = self.sets.inner.write()?;
        for member in members {
            let entry = LogEntry::put(encode_set_key(key, member), Vec::new());
            let loc = append_entry(&self.sets, &mut inner, &self.opts, &entry)?;
            // The member itself is the useful cache; the value is empty.
            let loc = cache_value(loc, self.opts.index_mode, member);
            if let Some(old) = inner.index.put(key, member_hash(member), loc) {
                self.sets.discard.incr_discard(old.file_id, old.entry_size);
            }
        }
        Ok(())
    }

    /// Removes `member`, returning whether it was present.
    pub fn srem(&self, key: &[u8], member: &[u8]) -> Result<bool> {
        let mut inner = self.sets.inner.write()?;
        if !contains(&inner, key, member)? {
            return Ok(false);
        }

        let entry = LogEntry::delete(encode_set_key(key, member));
        let tomb = append_entry(&self.sets, &mut inner, &self.opts, &entry)?;
        if let Some(old) = inner.index.remove(key, member_hash(member)) {
            self.sets.discard.incr_discard(old.file_id, old.entry_size);
            self.sets.discard.incr_discard(tomb.file_id, tomb.entry_size);
        }
        Ok(true)
    }

    /// Removes and returns up to `count` arbitrary members.
    pub fn spop(&self, key: &[u8], count: usize) -> Result<Vec<Vec<u8>>> {
        let mut inner = self.sets.inner.write()?;
        let Some(members) = inner.index.keys.get(key) else {
            return Ok(Vec::new());
        };

        let picked: Vec<Vec<u8>> = members
            .values()
            .take(count)
            .map(|loc| member_of(&inner, loc))
            .collect::<Result<_>>()?;

        for member in &picked {
            let entry = LogEntry::delete(encode_set_key(key, member));
            let tomb = append_entry(&self.sets, &mut inner, &self.opts, &entry)?;
            if let Some(old) = inner.index.remove(key, member_hash(member)) {
                self.sets.discard.incr_discard(old.file_id, old.entry_size);
                self.sets.discard.incr_discard(tomb.file_id, tomb.entry_size);
            }
        }
        Ok(picked)
    }

    /// Whether `member` is in the set at `key`.
    pub fn sismember(&self, key: &[u8], member: &[u8]) -> bool {
        self.sets
            .inner
            .read()
            .ok()
            .and_then(|inner| contains(&inner, key, member).ok())
            .unwrap_or(false)
    }

    /// All members of the set at `key`, in no particular order.
    pub fn smembers(&self, key: &[u8]) -> Result<Vec<Vec<u8>>> {
        let inner = self.sets.inner.read()?;
        self.members_inner(&inner, key)
    }

    fn members_inner(&self, inner: &ShardInner<SetIndex>, key: &[u8]) -> Result<Vec<Vec<u8>>> {
        let Some(members) = inner.index.keys.get(key) else {
            return Ok(Vec::new());
        };
        members.values().map(|loc| member_of(inner, loc)).collect()
    }

    /// Cardinality of the set at `key`, zero if absent.
    pub fn scard(&self, key: &[u8]) -> usize {
        self.sets
            .inner
            .read()
            .map(|inner| inner.index.card(key))
            .unwrap_or(0)
    }

    /// Union of the sets at `keys`, each member once.
    pub fn sunion(&self, keys: &[&[u8]]) -> Result<Vec<Vec<u8>>> {
        let inner = self.sets.inner.read()?;
        let mut all = Vec::new();
        for key in keys {
            all.extend(self.members_inner(&inner, key)?);
        }
        Ok(all.into_iter().unique().collect())
    }

    /// Members of the first set that are in none of the others.
    pub fn sdiff(&self, keys: &[&[u8]]) -> Result<Vec<Vec<u8>>> {
        let inner = self.sets.inner.read()?;
        let Some((first, rest)) = keys.split_first() else {
            return Ok(Vec::new());
        };

        let mut result = Vec::new();
        'member: for member in self.members_inner(&inner, first)? {
            for other in rest {
                if contains(&inner, other, &member)? {
                    continue 'member;
                }
            }
            result.push(member);
        }
        Ok(result)
    }
}
