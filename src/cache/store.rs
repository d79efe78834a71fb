//! Thread-safe local key/value store

use crate::cache::ByteView;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Key -> value map guarded by one reader/writer lock
///
/// Writers hold the lock exclusively, so a reader never observes a partly
/// applied write.
#[derive(Debug, Default)]
pub struct LocalStore {
    map: RwLock<HashMap<String, ByteView>>,
}

impl LocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite (last write wins)
    pub fn set(&self, key: &str, value: ByteView) {
        self.map.write().insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<ByteView> {
        self.map.read().get(key).cloned()
    }

    pub fn delete(&self, key: &str) {
        self.map.write().remove(key);
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}
