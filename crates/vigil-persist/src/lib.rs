//! Key-value persistence for the Vigil alerting engine.
//!
//! The alerting engine keeps two collections durable across restarts: the
//! rule set and the alert history. Each is stored as a JSON array under a
//! single key. This crate provides the storage boundary:
//!
//! - [`KeyValueStore`]: the byte-level contract a host backend implements
//! - [`MemoryStore`]: in-process backend for tests and diskless hosts
//! - [`FileStore`]: one JSON file per key in a state directory
//! - [`JsonCollection`]: typed `Vec<T>` view over one key
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use vigil_persist::{JsonCollection, KeyValueStore, MemoryStore};
//!
//! let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
//! let names: JsonCollection<String> = JsonCollection::new(store, "names");
//!
//! assert!(names.load().unwrap().is_empty());
//! names.save(&["a".to_string(), "b".to_string()]).unwrap();
//! assert_eq!(names.load().unwrap().len(), 2);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod collection;
pub mod error;
pub mod file;
pub mod memory;

pub use collection::JsonCollection;
pub use error::{PersistError, Result};
pub use file::FileStore;
pub use memory::MemoryStore;

/// Byte-level durable storage keyed by opaque names.
///
/// Writes are synchronous: when `put` returns `Ok`, the value must be
/// readable by a later `get`, including after a process restart for
/// durable backends.
pub trait KeyValueStore: Send + Sync + std::fmt::Debug {
    /// Reads the value stored under `key`, or `None` if nothing was written.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Replaces the value stored under `key`.
    fn put(&self, key: &str, value: &[u8]) -> Result<()>;
}

/// Checks that a key is safe to use as a file stem.
///
/// Accepted keys are non-empty, use only ASCII alphanumerics, `-`, `_` and
/// `.`, and are not `.` or `..`.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(PersistError::InvalidKey {
            key: key.to_string(),
            reason: "key cannot be empty".to_string(),
        });
    }
    if key == "." || key == ".." {
        return Err(PersistError::InvalidKey {
            key: key.to_string(),
            reason: "key cannot be a relative path component".to_string(),
        });
    }
    if let Some(c) = key
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(PersistError::InvalidKey {
            key: key.to_string(),
            reason: format!("invalid character {c:?}"),
        });
    }
    Ok(())
}
