//! Typed JSON-array collections stored under a single key.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::KeyValueStore;
use crate::error::{PersistError, Result};

/// A `Vec<T>` persisted as one JSON array under one key.
///
/// The whole collection is read at startup and rewritten on every save;
/// there is no partial update.
pub struct JsonCollection<T> {
    store: Arc<dyn KeyValueStore>,
    key: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonCollection<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Creates a collection view over `key` in `store`.
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            _marker: PhantomData,
        }
    }

    /// Returns the storage key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Loads the collection. A key that was never written loads as empty.
    pub fn load(&self) -> Result<Vec<T>> {
        let Some(bytes) = self.store.get(&self.key)? else {
            debug!(key = %self.key, "no persisted collection, starting empty");
            return Ok(Vec::new());
        };

        let items: Vec<T> = serde_json::from_slice(&bytes).map_err(|e| PersistError::Decode {
            key: self.key.clone(),
            reason: e.to_string(),
        })?;
        debug!(key = %self.key, count = items.len(), "loaded persisted collection");
        Ok(items)
    }

    /// Replaces the persisted collection with `items`.
    pub fn save(&self, items: &[T]) -> Result<()> {
        let bytes = serde_json::to_vec(items).map_err(|e| PersistError::Encode {
            key: self.key.clone(),
            reason: e.to_string(),
        })?;
        self.store.put(&self.key, &bytes)
    }
}

impl<T> fmt::Debug for JsonCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonCollection")
            .field("key", &self.key)
            .field("store", &self.store)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FileStore, MemoryStore};
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Entry {
        id: String,
        count: u32,
    }

    fn entries() -> Vec<Entry> {
        vec![
            Entry {
                id: "a".to_string(),
                count: 1,
            },
            Entry {
                id: "b".to_string(),
                count: 2,
            },
        ]
    }

    #[test]
    fn load_missing_is_empty() {
        let store = Arc::new(MemoryStore::new());
        let coll: JsonCollection<Entry> = JsonCollection::new(store, "entries");
        assert!(coll.load().unwrap().is_empty());
    }

    #[test]
    fn save_writes_json_array() {
        let store = MemoryStore::new();
        let coll: JsonCollection<Entry> = JsonCollection::new(Arc::new(store.clone()), "entries");
        coll.save(&entries()).unwrap();

        let raw = store.get("entries").unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert!(value.is_array());
        assert_eq!(value.as_array().map(Vec::len), Some(2));
        assert_eq!(coll.load().unwrap(), entries());
    }

    #[test]
    fn save_preserves_order() {
        let store = Arc::new(MemoryStore::new());
        let coll: JsonCollection<Entry> = JsonCollection::new(store, "entries");
        let mut items = entries();
        items.reverse();
        coll.save(&items).unwrap();
        assert_eq!(coll.load().unwrap(), items);
    }

    #[test]
    fn corrupt_payload_is_decode_error() {
        let store = MemoryStore::new();
        store.put("entries", b"{not json").unwrap();
        let coll: JsonCollection<Entry> = JsonCollection::new(Arc::new(store), "entries");

        match coll.load() {
            Err(PersistError::Decode { key, .. }) => assert_eq!(key, "entries"),
            other => panic!("expected Decode error, got {other:?}"),
        }
    }

    #[test]
    fn file_backed_collection_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let store = Arc::new(FileStore::open(dir.path()).expect("open"));
            let coll: JsonCollection<Entry> = JsonCollection::new(store, "entries");
            coll.save(&entries()).expect("save");
        }
        let store = Arc::new(FileStore::open(dir.path()).expect("reopen"));
        let coll: JsonCollection<Entry> = JsonCollection::new(store, "entries");
        assert_eq!(coll.load().expect("load"), entries());
    }
}
