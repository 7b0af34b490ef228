//! In-memory key-value backend.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Result;
use crate::{KeyValueStore, validate_key};

/// Thread-safe in-memory key-value store.
///
/// Clones share the same underlying map, so a test can keep a handle to
/// inspect what an engine instance wrote, or hand the same store to a second
/// instance to simulate a restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of keys written.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Removes every key.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        Ok(self.entries.read().get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        validate_key(key)?;
        self.entries.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }
}
