//! Transparency log.
//!
//! Counts what the journal did with captured input so a user can check it
//! at any time. Counters are cumulative across runs when persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// File name used under the data directory.
pub const TRANSPARENCY_FILE: &str = "transparency.json";

/// Transparency statistics, updated from several threads.
#[derive(Debug)]
pub struct TransparencyLog {
    /// Key presses applied to a session
    keystrokes_captured: AtomicU64,
    /// Events lost because the capture channel was full
    events_dropped: AtomicU64,
    /// Events the tracker refused (not accepting)
    events_rejected: AtomicU64,
    /// Sessions closed, whether or not their writes succeeded yet
    sessions_finalized: AtomicU64,
    /// Writes that failed and had to be queued
    save_failures: AtomicU64,
    /// Start of the current run
    run_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl TransparencyLog {
    pub fn new() -> Self {
        Self {
            keystrokes_captured: AtomicU64::new(0),
            events_dropped: AtomicU64::new(0),
            events_rejected: AtomicU64::new(0),
            sessions_finalized: AtomicU64::new(0),
            save_failures: AtomicU64::new(0),
            run_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a log that resumes from, and saves to, `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            warn!("Could not load previous transparency stats: {e}");
        }

        log
    }

    pub fn record_keystroke(&self) {
        self.keystrokes_captured.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_events_dropped(&self, count: u64) {
        self.events_dropped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_event_rejected(&self) {
        self.events_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sessions_finalized(&self, count: u64) {
        self.sessions_finalized.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_save_failures(&self, count: u64) {
        self.save_failures.fetch_add(count, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> TransparencyStats {
        TransparencyStats {
            keystrokes_captured: self.keystrokes_captured.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            events_rejected: self.events_rejected.load(Ordering::Relaxed),
            sessions_finalized: self.sessions_finalized.load(Ordering::Relaxed),
            save_failures: self.save_failures.load(Ordering::Relaxed),
            run_start: self.run_start,
            run_duration_secs: (Utc::now() - self.run_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Transparency Statistics:\n\
             - Keystrokes captured: {}\n\
             - Events dropped (queue full): {}\n\
             - Events rejected: {}\n\
             - Sessions finalized: {}\n\
             - Save failures (retried): {}\n\
             - Run duration: {} seconds\n\
             \n\
             What is recorded:\n\
             - The text you type, with timestamps, in local JSON files\n\
             - Nothing is sent over the network",
            stats.keystrokes_captured,
            stats.events_dropped,
            stats.events_rejected,
            stats.sessions_finalized,
            stats.save_failures,
            stats.run_duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                keystrokes_captured: stats.keystrokes_captured,
                events_dropped: stats.events_dropped,
                events_rejected: stats.events_rejected,
                sessions_finalized: stats.sessions_finalized,
                save_failures: stats.save_failures,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        let Some(path) = self.persist_path.as_deref() else {
            return Ok(());
        };
        let Some(persisted) = read_persisted(path)? else {
            return Ok(());
        };

        self.keystrokes_captured
            .store(persisted.keystrokes_captured, Ordering::Relaxed);
        self.events_dropped
            .store(persisted.events_dropped, Ordering::Relaxed);
        self.events_rejected
            .store(persisted.events_rejected, Ordering::Relaxed);
        self.sessions_finalized
            .store(persisted.sessions_finalized, Ordering::Relaxed);
        self.save_failures
            .store(persisted.save_failures, Ordering::Relaxed);
        Ok(())
    }
}

impl Default for TransparencyLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of transparency statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransparencyStats {
    pub keystrokes_captured: u64,
    pub events_dropped: u64,
    pub events_rejected: u64,
    pub sessions_finalized: u64,
    pub save_failures: u64,
    pub run_start: DateTime<Utc>,
    pub run_duration_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    keystrokes_captured: u64,
    events_dropped: u64,
    events_rejected: u64,
    sessions_finalized: u64,
    save_failures: u64,
    last_updated: DateTime<Utc>,
}

fn read_persisted(path: &Path) -> Result<Option<PersistedStats>, std::io::Error> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map(Some)
        .map_err(std::io::Error::other)
}

/// Thread-safe shared transparency log.
pub type SharedTransparencyLog = Arc<TransparencyLog>;

/// Create a new shared transparency log.
pub fn create_shared_log() -> SharedTransparencyLog {
    Arc::new(TransparencyLog::new())
}

/// Create a new shared transparency log with persistence.
pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedTransparencyLog {
    Arc::new(TransparencyLog::with_persistence(path))
}
