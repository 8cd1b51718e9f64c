//! Transparency module for the typing journal.
//!
//! Tracks what the journal captured and saved so the user can always see
//! how much of their input was recorded.

pub mod log;

// Re-export commonly used types
pub use log::{
    create_shared_log, create_shared_log_with_persistence, SharedTransparencyLog, TransparencyLog,
    TransparencyStats, TRANSPARENCY_FILE,
};
