//! Sorted-set index.
//!
//! One logical structure needs two views: a member-hash map for point
//! lookups and a score-ordered skiplist for ranks and ranges. The
//! skiplist is keyed by `(score_bits, member)`, where `score_bits` is the
//! order-preserving f64 transform, so byte comparison yields score order
//! with members as the tiebreak. Both views mutate together under the
//! engine's zset write lock.

use crossbeam_skiplist::SkipMap;
use fxhash::FxHashMap;

use super::{member_hash, ValueLocator};

/// A member's score and position.
#[derive(Debug, Clone, PartialEq)]
pub struct ZNode {
    pub score_bits: u64,
    pub loc: ValueLocator,
}

/// One sorted set.
pub struct SortedSet {
    pub members: FxHashMap<u64, ZNode>,
    pub ranks: SkipMap<(u64, Vec<u8>), u64>,
}

impl Default for SortedSet {
    fn default() -> Self {
        Self {
            members: FxHashMap::default(),
            ranks: SkipMap::new(),
        }
    }
}

impl SortedSet {
    pub fn card(&self) -> usize {
        self.members.len()
    }

    /// Inserts or rescores a member, returning the superseded node.
    pub fn insert(&mut self, member: &[u8], score_bits: u64, loc: ValueLocator) -> Option<ZNode> {
        let hash = member_hash(member);
        let old = self.members.insert(hash, ZNode { score_bits, loc });
        if let Some(old) = &old {
            self.ranks.remove(&(old.score_bits, member.to_vec()));
        }
        self.ranks.insert((score_bits, member.to_vec()), hash);
        old
    }

    /// Removes a member from both views.
    pub fn remove(&mut self, member: &[u8]) -> Option<ZNode> {
        let hash = member_hash(member);
        let old = self.members.remove(&hash)?;
        self.ranks.remove(&(old.score_bits, member.to_vec()));
        Some(old)
    }

    pub fn get(&self, member: &[u8]) -> Option<&ZNode> {
        self.members.get(&member_hash(member))
    }

    /// Ascending rank of a member, if present.
    pub fn rank(&self, member: &[u8]) -> Option<usize> {
        let node = self.get(member)?;
        let target = (node.score_bits, member.to_vec());
        self.ranks.iter().position(|entry| *entry.key() == target)
    }
}

/// ZSet index: user key to sorted set.
#[derive(Default)]
pub struct ZSetIndex {
    pub keys: FxHashMap<Vec<u8>, SortedSet>,
}

impl ZSetIndex {
    pub fn set(&self, key: &[u8]) -> Option<&SortedSet> {
        self.keys.get(key)
    }

    pub fn set_mut(&mut self, key: &[u8]) -> Option<&mut SortedSet> {
        self.keys.get_mut(key)
    }

    pub fn or_default(&mut self, key: &[u8]) -> &mut SortedSet {
        self.keys.entry(key.to_vec()).or_default()
    }

    /// Removes a member, dropping the key once it is empty.
    pub fn remove_member(&mut self, key: &[u8], member: &[u8]) -> Option<ZNode> {
        let set = self.keys.get_mut(key)?;
        let old = set.remove(member);
        if set.card() == 0 {
            self.keys.remove(key);
        }
        old
    }
}
