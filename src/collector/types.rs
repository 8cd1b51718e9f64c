//! Raw keyboard event types produced by the platform collectors.
//!
//! A collector reports what the OS told it: when a key went down or up and
//! which key it was, either as the character it produced or by name.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default capacity of the channel between the capture thread and its consumer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 10_000;

/// Identity of the key behind a raw event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyIdentity {
    /// A key that produced a character after layout and modifier translation.
    Char(char),
    /// A key without a character payload, by lowercase name ("backspace", "shift", ...).
    Named(String),
}

impl KeyIdentity {
    /// Create a named key. Names are stored lowercase.
    pub fn named(name: impl AsRef<str>) -> Self {
        KeyIdentity::Named(name.as_ref().to_ascii_lowercase())
    }
}

/// A single key transition captured by a collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyboardEvent {
    /// Timestamp when the event occurred
    pub timestamp: DateTime<Local>,
    /// Whether this is a key press (true) or release (false)
    pub is_key_down: bool,
    /// Which key moved
    pub key: KeyIdentity,
}

impl KeyboardEvent {
    /// Create an event stamped with the current local time.
    pub fn new(key: KeyIdentity, is_key_down: bool) -> Self {
        Self::at(key, is_key_down, Local::now())
    }

    /// Create an event with an explicit timestamp.
    pub fn at(key: KeyIdentity, is_key_down: bool, timestamp: DateTime<Local>) -> Self {
        Self {
            timestamp,
            is_key_down,
            key,
        }
    }

    /// Shorthand for a key-down event at `timestamp`.
    pub fn press_at(key: KeyIdentity, timestamp: DateTime<Local>) -> Self {
        Self::at(key, true, timestamp)
    }
}

/// Configuration shared by all collectors.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Events buffered before the capture callback starts dropping them
    pub channel_capacity: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Errors that can occur while installing keyboard capture.
///
/// Every variant other than `AlreadyRunning` means capture is unavailable
/// and tracking cannot begin.
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("Collector is already running")]
    AlreadyRunning,
    #[error("Failed to create CGEvent tap")]
    TapCreationFailed,
    #[error("Failed to create run loop source")]
    RunLoopSourceFailed,
    #[error("Failed to install Windows hook")]
    HookInstallationFailed,
    #[error("Capture thread exited before reporting readiness")]
    CaptureThreadExited,
    #[error("Keyboard capture is not supported on this platform")]
    Unsupported,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyboard_event_creation() {
        let event = KeyboardEvent::new(KeyIdentity::Char('a'), true);
        assert!(event.is_key_down);
        assert_eq!(event.key, KeyIdentity::Char('a'));
    }

    #[test]
    fn test_named_keys_are_lowercased() {
        assert_eq!(
            KeyIdentity::named("BackSpace"),
            KeyIdentity::Named("backspace".to_string())
        );
    }

    #[test]
    fn test_collector_config_default() {
        let config = CollectorConfig::default();
        assert_eq!(config.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
    }

    #[test]
    fn test_capture_errors_name_the_failure() {
        assert_eq!(
            CollectorError::TapCreationFailed.to_string(),
            "Failed to create CGEvent tap"
        );
        assert_eq!(
            CollectorError::Unsupported.to_string(),
            "Keyboard capture is not supported on this platform"
        );
    }

    #[test]
    fn test_event_serializes_with_key() {
        let event = KeyboardEvent::new(KeyIdentity::named("shift"), false);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"is_key_down\":false"));
        assert!(json.contains("shift"));
    }
}
