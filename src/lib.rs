//! Typing Journal - a local, background record of what you type.
//!
//! This library captures key presses system-wide, rebuilds the typed text
//! into sessions, and saves each session and a per-day roll-up as JSON
//! files on the local disk.
//!
//! # Disclosure
//!
//! - **Typed text is recorded**: every character you type, including in
//!   password fields, ends up in the session files
//! - **Local only**: nothing is sent over the network
//! - **Transparency**: capture and save counts are logged and auditable
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          Typing Journal                          │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌──────────────────────┐    │
//! │  │  Collector  │──▶│ Normalizer  │──▶│  SessionController   │    │
//! │  │ (OS hook)   │   │ (KeyToken)  │   │ buffer + throughput  │    │
//! │  └─────────────┘   └─────────────┘   └──────────────────────┘    │
//! │         │                                   │          │         │
//! │         ▼                                   ▼          ▼         │
//! │  ┌─────────────┐                    ┌────────────┐ ┌──────────┐  │
//! │  │Transparency │                    │  Session   │ │  Daily   │  │
//! │  │    Log      │                    │   files    │ │   log    │  │
//! │  └─────────────┘                    └────────────┘ └──────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use typing_journal::{agent::Agent, collector, core, storage, transparency};
//! use std::time::Duration;
//!
//! // Create a collector (requires Input Monitoring permission on macOS)
//! let mut collector = collector::Collector::new(collector::CollectorConfig::default());
//! collector.start().expect("Failed to start collector");
//!
//! let store = storage::JsonFileStore::new("sessions").expect("Failed to open store");
//! let controller = core::SessionController::new(core::TrackerSettings::default(), store);
//! let agent = Agent::spawn(
//!     collector.receiver().clone(),
//!     controller,
//!     transparency::create_shared_log(),
//!     Duration::from_secs(5),
//!     |report| println!("{} words, {:.1} wpm", report.words, report.wpm),
//! )
//! .expect("Failed to start tracking");
//!
//! // ... later
//! collector.stop();
//! agent.shutdown().expect("Failed to finalize");
//! ```

pub mod agent;
pub mod collector;
pub mod config;
pub mod core;
pub mod logging;
pub mod storage;
pub mod transparency;

// Re-export key types at crate root for convenience
pub use agent::{Agent, AgentError, RunSummary};
pub use collector::{Collector, CollectorConfig, CollectorError, KeyIdentity, KeyboardEvent};
pub use config::{Config, ConfigError};
pub use crate::core::{
    DailyAggregate, KeyToken, Report, SessionBoundary, SessionController, SessionPolicy,
    SessionRecord, StorageLayout, TrackerSettings,
};
pub use storage::{JsonFileStore, RecordStore, StoreError};
pub use transparency::{SharedTransparencyLog, TransparencyLog, TransparencyStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Disclosure shown before tracking starts.
pub const PRIVACY_DECLARATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║              TYPING JOURNAL - RECORDING DISCLOSURE               ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This tool records the text you type, in every application,      ║
║  while it is running.                                            ║
║                                                                  ║
║  ✓ WHAT IS RECORDED:                                             ║
║    • Every character you type, with timestamps                   ║
║    • Backspaces (applied to the saved text)                      ║
║    • Pauses, as paragraph breaks                                 ║
║    • Word counts and typing speed                                ║
║                                                                  ║
║  ⚠ THIS INCLUDES SENSITIVE INPUT:                                ║
║    • Passwords and messages are saved like any other text        ║
║    • Stop tracking (Ctrl+C) before typing secrets                ║
║                                                                  ║
║  ✗ WHAT NEVER HAPPENS:                                           ║
║    • Nothing is sent over the network                            ║
║    • No screen content or application names are captured         ║
║                                                                  ║
║  Files are written only to your local output directory.          ║
║  You can view collection statistics anytime with:                ║
║    typing-journal status                                         ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;
