//! Keyboard event collection.
//!
//! Platform-specific backends capture key transitions on a dedicated thread
//! and hand them to a bounded channel through an [`EventSink`].

pub mod keymap;
pub mod sink;
pub mod types;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub mod unsupported;

// Re-export commonly used types
pub use sink::EventSink;
pub use types::{
    CollectorConfig, CollectorError, KeyIdentity, KeyboardEvent, DEFAULT_CHANNEL_CAPACITY,
};

#[cfg(target_os = "macos")]
pub use macos::{check_permission, MacOSCollector};

/// Platform-agnostic collector type alias
#[cfg(target_os = "macos")]
pub type Collector = MacOSCollector;

#[cfg(target_os = "windows")]
pub use windows::{check_permission, WindowsCollector};

/// Platform-agnostic collector type alias
#[cfg(target_os = "windows")]
pub type Collector = WindowsCollector;

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub use unsupported::{check_permission, UnsupportedCollector};

/// Platform-agnostic collector type alias
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub type Collector = UnsupportedCollector;
