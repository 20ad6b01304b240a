use fxhash::FxHashMap;

use super::ValueLocator;

/// Hash index: user key to a field map.
#[derive(Debug, Default)]
pub struct HashIndex {
    pub keys: FxHashMap<Vec<u8>, FxHashMap<Vec<u8>, ValueLocator>>,
}

impl HashIndex {
    pub fn get(&self, key: &[u8], field: &[u8]) -> Option<&ValueLocator> {
        self.keys.get(key)?.get(field)
    }

    /// Inserts or replaces a field, returning the superseded locator.
    pub fn put(&mut self, key: &[u8], field: Vec<u8>, loc: ValueLocator) -> Option<ValueLocator> {
        self.keys.entry(key.to_vec()).or_default().insert(field, loc)
    }

    /// Removes a field, dropping the key once its last field is gone.
    pub fn remove(&mut self, key: &[u8], field: &[u8]) -> Option<ValueLocator> {
        let fields = self.keys.get_mut(key)?;
        let old = fields.remove(field);
        if fields.is_empty() {
            self.keys.remove(key);
        }
        old
    }

    pub fn field_count(&self, key: &[u8]) -> usize {
        self.keys.get(key).map_or(0, |fields| fields.len())
    }
}
