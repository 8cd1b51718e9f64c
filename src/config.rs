//! Configuration for the typing journal.

use crate::collector::DEFAULT_CHANNEL_CAPACITY;
use crate::core::buffer::DEFAULT_PARAGRAPH_GAP_SECS;
use crate::core::session::{SessionBoundary, SessionPolicy, StorageLayout, TrackerSettings};
use crate::core::throughput::DEFAULT_WPM_WINDOW_SECS;
use crate::transparency::TRANSPARENCY_FILE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const APP_DIR: &str = "typing-journal";

/// Main configuration for the journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where session files and daily logs are written
    pub output_dir: PathBuf,

    /// Path for storing logs and transparency stats
    pub data_path: PathBuf,

    /// Pause after which a paragraph break is inserted
    #[serde(with = "duration_serde")]
    pub paragraph_gap: Duration,

    /// How often live stats are printed and failed writes retried
    #[serde(with = "duration_serde")]
    pub report_interval: Duration,

    /// Trailing window for words per minute
    #[serde(with = "duration_serde")]
    pub wpm_window: Duration,

    /// How a run is divided into sessions
    pub session_policy: SessionPolicy,

    /// Which files are written
    pub layout: StorageLayout,

    /// Capacity of the capture queue
    pub channel_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);

        Self {
            output_dir: data_dir.join("sessions"),
            data_path: data_dir,
            paragraph_gap: Duration::from_secs(DEFAULT_PARAGRAPH_GAP_SECS as u64),
            report_interval: Duration::from_secs(5),
            wpm_window: Duration::from_secs(DEFAULT_WPM_WINDOW_SECS as u64),
            session_policy: SessionPolicy::Continuous,
            layout: StorageLayout::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, or defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let content = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.json")
    }

    /// Directory for rotated log files.
    pub fn logs_dir(&self) -> PathBuf {
        self.data_path.join("logs")
    }

    pub fn transparency_path(&self) -> PathBuf {
        self.data_path.join(TRANSPARENCY_FILE)
    }

    /// Reject settings the tracker cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("paragraph_gap", self.paragraph_gap),
            ("report_interval", self.report_interval),
            ("wpm_window", self.wpm_window),
        ];
        for (name, value) in positive {
            if value.is_zero() {
                return Err(ConfigError::Invalid(format!("{name} must be greater than zero")));
            }
        }

        if self.channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "channel_capacity must be greater than zero".to_string(),
            ));
        }

        if let SessionPolicy::SplitOnIdle { gap_secs } = self.session_policy {
            split_gap(gap_secs)?;
            if Duration::from_secs(gap_secs) <= self.paragraph_gap {
                return Err(ConfigError::Invalid(format!(
                    "split gap ({gap_secs}s) must exceed the paragraph gap ({}s)",
                    self.paragraph_gap.as_secs()
                )));
            }
        }

        if !self.layout.session_files && !self.layout.daily_log {
            return Err(ConfigError::Invalid(
                "at least one of session files or daily log must be enabled".to_string(),
            ));
        }

        self.tracker_settings().map(|_| ())
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        for dir in [&self.output_dir, &self.data_path] {
            std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Settings for a [`crate::core::SessionController`].
    pub fn tracker_settings(&self) -> Result<TrackerSettings, ConfigError> {
        let boundary = match self.session_policy {
            SessionPolicy::Continuous => SessionBoundary::Continuous,
            SessionPolicy::SplitOnIdle { gap_secs } => {
                SessionBoundary::SplitOnIdle(split_gap(gap_secs)?)
            }
        };

        Ok(TrackerSettings {
            paragraph_gap: to_chrono(self.paragraph_gap, "paragraph_gap")?,
            wpm_window: to_chrono(self.wpm_window, "wpm_window")?,
            boundary,
            layout: self.layout,
        })
    }
}

fn to_chrono(value: Duration, name: &str) -> Result<chrono::Duration, ConfigError> {
    chrono::Duration::from_std(value)
        .map_err(|_| ConfigError::Invalid(format!("{name} is out of range")))
}

fn split_gap(gap_secs: u64) -> Result<chrono::Duration, ConfigError> {
    i64::try_from(gap_secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .ok_or_else(|| ConfigError::Invalid(format!("split gap ({gap_secs}s) is out of range")))
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Serialize error: {0}")]
    Serialize(serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
