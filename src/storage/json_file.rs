//! Directory-backed JSON record store.

use crate::storage::{RecordStore, StoreError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extension of every file written by [`JsonFileStore`].
pub const JSON_EXTENSION: &str = "json";

/// Stores each record as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open a store rooted at `dir`, creating the directory if absent.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            key: dir.display().to_string(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.{JSON_EXTENSION}"))
    }
}

impl RecordStore for JsonFileStore {
    fn store<R: Serialize>(&mut self, key: &str, record: &R) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            key: key.to_string(),
            source,
        };

        let json = serde_json::to_string_pretty(record).map_err(|source| StoreError::Serialize {
            key: key.to_string(),
            source,
        })?;

        // The directory may have been removed while tracking
        std::fs::create_dir_all(&self.dir).map_err(io_err)?;

        // Write-then-rename so a crash never leaves a half-written record
        let path = self.path_for(key);
        let tmp_path = path.with_extension(format!("{JSON_EXTENSION}.tmp"));
        std::fs::write(&tmp_path, json).map_err(io_err)?;
        std::fs::rename(&tmp_path, &path).map_err(io_err)?;

        debug!("Stored {path:?}");
        Ok(())
    }

    fn load<R: DeserializeOwned>(&self, key: &str) -> Result<Option<R>, StoreError> {
        let path = self.path_for(key);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Io {
                    key: key.to_string(),
                    source,
                })
            }
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| StoreError::Malformed {
                key: key.to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Note {
        text: String,
        count: u32,
    }

    #[test]
    fn test_creates_missing_directory() {
        let root = tempdir().unwrap();
        let dir = root.path().join("nested").join("sessions");

        let store = JsonFileStore::new(&dir).unwrap();
        assert!(dir.is_dir());
        assert_eq!(store.dir(), dir.as_path());
    }

    #[test]
    fn test_store_overwrites_and_loads() {
        let root = tempdir().unwrap();
        let mut store = JsonFileStore::new(root.path()).unwrap();

        let first = Note {
            text: "draft".to_string(),
            count: 1,
        };
        let second = Note {
            text: "final".to_string(),
            count: 2,
        };
        store.store("note", &first).unwrap();
        store.store("note", &second).unwrap();

        let loaded: Option<Note> = store.load("note").unwrap();
        assert_eq!(loaded, Some(second));
        assert!(store.path_for("note").exists());
        assert!(!root.path().join("note.json.tmp").exists());
    }

    #[test]
    fn test_missing_key_loads_none() {
        let root = tempdir().unwrap();
        let store = JsonFileStore::new(root.path()).unwrap();

        let loaded: Option<Note> = store.load("absent").unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_malformed_content_is_reported() {
        let root = tempdir().unwrap();
        let store = JsonFileStore::new(root.path()).unwrap();
        std::fs::write(store.path_for("broken"), "{ not json").unwrap();

        let result: Result<Option<Note>, _> = store.load("broken");
        assert!(matches!(result, Err(StoreError::Malformed { .. })));
    }
}
