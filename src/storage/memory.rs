//! In-process record store.

use crate::storage::{RecordStore, StoreError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;

/// Keeps serialized records in memory.
///
/// Writes can be made to fail on demand, which lets callers exercise their
/// retry paths without touching the filesystem.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: HashMap<String, String>,
    fail_writes: bool,
    writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `store` call fail (or succeed again).
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Place raw text under `key`, bypassing serialization.
    pub fn insert_raw(&mut self, key: impl Into<String>, text: impl Into<String>) {
        self.records.insert(key.into(), text.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    /// Stored keys in sorted order.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.records.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of successful writes.
    pub fn write_count(&self) -> usize {
        self.writes
    }
}

impl RecordStore for MemoryStore {
    fn store<R: Serialize>(&mut self, key: &str, record: &R) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Unavailable(format!("write to '{key}' rejected")));
        }

        let json = serde_json::to_string_pretty(record).map_err(|source| StoreError::Serialize {
            key: key.to_string(),
            source,
        })?;
        self.records.insert(key.to_string(), json);
        self.writes += 1;
        Ok(())
    }

    fn load<R: DeserializeOwned>(&self, key: &str) -> Result<Option<R>, StoreError> {
        match self.records.get(key) {
            None => Ok(None),
            Some(json) => serde_json::from_str(json)
                .map(Some)
                .map_err(|source| StoreError::Malformed {
                    key: key.to_string(),
                    source,
                }),
        }
    }
}
