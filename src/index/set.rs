use fxhash::FxHashMap;

use super::ValueLocator;

/// Deterministic 64-bit member hash. Members are keyed by hash so the
/// index stays small with large members; readers verify the actual member
/// bytes against the log entry before trusting a match.
pub fn member_hash(member: &[u8]) -> u64 {
    fxhash::hash64(member)
}

/// Set index: user key to a member-hash map.
#[derive(Debug, Default)]
pub struct SetIndex {
    pub keys: FxHashMap<Vec<u8>, FxHashMap<u64, ValueLocator>>,
}

impl SetIndex {
    pub fn get(&self, key: &[u8], hash: u64) -> Option<&ValueLocator> {
        self.keys.get(key)?.get(&hash)
    }

    pub fn put(&mut self, key: &[u8], hash: u64, loc: ValueLocator) -> Option<ValueLocator> {
        self.keys.entry(key.to_vec()).or_default().insert(hash, loc)
    }

    /// Removes a member, dropping the key once it is empty.
    pub fn remove(&mut self, key: &[u8], hash: u64) -> Option<ValueLocator> {
        let members = self.keys.get_mut(key)?;
        let old = members.remove(&hash);
        if members.is_empty() {
            self.keys.remove(key);
        }
        old
    }

    pub fn card(&self, key: &[u8]) -> usize {
        self.keys.get(key).map_or(0, |members| members.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_hash_deterministic() {
        assert_eq!(member_hash(b"alice"), member_hash(b"alice"));
        assert_ne!(member_hash(b"alice"), member_hash(b"bob"));
    }

    #[test]
    fn test_put_remove_card() {
        let mut index = SetIndex::default();
        let h1 = member_hash(b"one");
        let h2 = member_hash(b"two");

        index.put(b"s", h1, ValueLocator::new(1, 0, 12));
        index.put(b"s", h2, ValueLocator::new(1, 12, 12));
        assert_eq!(index.card(b"s"), 2);
        assert!(index.get(b"s", h1).is_some());

        assert!(index.remove(b"s", h1).is_some());
        assert!(index.remove(b"s", h1).is_none());
        assert!(index.remove(b"s", h2).is_some());
        assert_eq!(index.card(b"s"), 0);
        assert!(!index.keys.contains_key(b"s".as_slice()));
    }
}
