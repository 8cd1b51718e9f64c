//! Persistence of session records and daily logs.
//!
//! The tracker only needs two operations from storage: overwrite the record
//! under a key, and load it back. [`RecordStore`] is that seam;
//! [`JsonFileStore`] backs it with a directory of pretty-printed JSON files
//! and [`MemoryStore`] keeps everything in process.

pub mod json_file;
pub mod memory;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

use chrono::{DateTime, Local, NaiveDate};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Errors raised by a [`RecordStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error for '{key}': {source}")]
    Io {
        key: String,
        source: std::io::Error,
    },
    #[error("Could not serialize '{key}': {source}")]
    Serialize {
        key: String,
        source: serde_json::Error,
    },
    /// The stored content exists but does not parse
    #[error("Malformed record '{key}': {source}")]
    Malformed {
        key: String,
        source: serde_json::Error,
    },
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Keyed record storage.
pub trait RecordStore {
    /// Write `record` under `key`, replacing anything already there.
    fn store<R: Serialize>(&mut self, key: &str, record: &R) -> Result<(), StoreError>;

    /// Load the record under `key`, or `None` if nothing was stored.
    fn load<R: DeserializeOwned>(&self, key: &str) -> Result<Option<R>, StoreError>;
}

/// Key of the file holding one session, e.g. `2024-03-14_Typing_Session_09-05-12am`.
pub fn session_key(start: &DateTime<Local>) -> String {
    format!(
        "{}_Typing_Session_{}",
        start.format("%Y-%m-%d"),
        start.format("%I-%M-%S%p").to_string().to_lowercase()
    )
}

/// Key of the daily log for `date`, e.g. `2024-03-14_Daily_Typing_Log`.
pub fn daily_log_key(date: NaiveDate) -> String {
    format!("{}_Daily_Typing_Log", date.format("%Y-%m-%d"))
}
