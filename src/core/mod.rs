//! Core functionality for the typing journal.
//!
//! This module contains:
//! - Key normalization into a small token vocabulary
//! - The session transcript and paragraph-break rules
//! - Rolling words-per-minute estimation
//! - Per-day aggregation of finalized sessions
//! - The session lifecycle controller tying them to storage

pub mod aggregate;
pub mod buffer;
pub mod normalize;
pub mod session;
pub mod throughput;

// Re-export commonly used types
pub use aggregate::{DailyAggregate, MergeOutcome};
pub use buffer::{count_words, Applied, SessionBuffer, SessionRecord, PARAGRAPH_BREAK};
pub use normalize::{normalize, KeyToken};
pub use session::{
    EventError, KeyOutcome, LifecycleError, Report, SessionBoundary, SessionController,
    SessionPolicy, StorageLayout, TrackerSettings, TrackerState,
};
pub use throughput::{ThroughputEstimator, ThroughputSample};
