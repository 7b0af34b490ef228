//! File-backed key-value store.
//!
//! Each key maps to `<dir>/<key>.json`. Writes go to a sibling temp file
//! which is flushed and renamed over the target, so a crash mid-write leaves
//! either the old or the new contents on disk, never a truncated file.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{PersistError, Result};
use crate::{KeyValueStore, validate_key};

/// Durable key-value store rooted at a state directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Opens a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| PersistError::Io {
            key: dir.display().to_string(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// Returns the state directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the file path backing `key`.
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(PersistError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        let io_err = |source| PersistError::Io {
            key: key.to_string(),
            source,
        };

        if let Err(source) = write_then_rename(&tmp, &path, value) {
            match fs::remove_file(&tmp) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => debug!(path = %tmp.display(), error = %e, "failed to remove temp file"),
            }
            return Err(io_err(source));
        }

        debug!(key = %key, bytes = value.len(), path = %path.display(), "wrote state file");
        Ok(())
    }
}

fn write_then_rename(tmp: &Path, path: &Path, value: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(tmp)?;
    file.write_all(value)?;
    file.sync_all()?;
    drop(file);
    fs::rename(tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("state").join("alerts");
        let store = FileStore::open(&nested).expect("open");
        assert!(store.dir().is_dir());
    }

    #[test]
    fn missing_key_reads_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::open(dir.path()).expect("open");
        assert!(store.get("alert-rules").expect("get").is_none());
    }

    #[test]
    fn put_then_get_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::open(dir.path()).expect("open");

        store.put("alert-rules", b"[]").expect("put");
        assert_eq!(
            store.get("alert-rules").expect("get").as_deref(),
            Some(&b"[]"[..])
        );
        assert!(dir.path().join("alert-rules.json").is_file());
        assert!(!dir.path().join("alert-rules.json.tmp").exists());
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let store = FileStore::open(dir.path()).expect("open");
            store.put("alert-history", b"[{\"id\":\"a\"}]").expect("put");
        }
        let store = FileStore::open(dir.path()).expect("reopen");
        assert_eq!(
            store.get("alert-history").expect("get").as_deref(),
            Some(&b"[{\"id\":\"a\"}]"[..])
        );
    }

    #[test]
    fn rejects_path_traversal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::open(dir.path()).expect("open");
        assert!(matches!(
            store.put("../outside", b"x"),
            Err(PersistError::InvalidKey { .. })
        ));
        assert!(matches!(
            store.get("nested/key"),
            Err(PersistError::InvalidKey { .. })
        ));
    }

    #[test]
    fn failed_rename_removes_temp_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::open(dir.path()).expect("open");
        // a non-empty directory where the target file should go
        let blocker = dir.path().join("alert-rules.json");
        fs::create_dir(&blocker).expect("mkdir");
        fs::write(blocker.join("keep"), b"x").expect("write");

        assert!(matches!(
            store.put("alert-rules", b"[]"),
            Err(PersistError::Io { .. })
        ));
        assert!(!dir.path().join("alert-rules.json.tmp").exists());
        assert!(blocker.join("keep").is_file());
    }

    #[test]
    fn write_into_removed_directory_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("gone");
        let store = FileStore::open(&root).expect("open");
        fs::remove_dir_all(&root).expect("remove");

        assert!(matches!(
            store.put("alert-rules", b"[]"),
            Err(PersistError::Io { .. })
        ));
    }
}
