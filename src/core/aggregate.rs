//! Per-day roll-up of finalized sessions.

use crate::core::buffer::SessionRecord;
use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// All finalized sessions that started on one calendar date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAggregate {
    pub date: NaiveDate,
    pub created: DateTime<Local>,
    pub last_updated: DateTime<Local>,
    pub total_sessions: u64,
    pub total_characters: u64,
    pub total_words: u64,
    pub total_keystrokes: u64,
    pub sessions: Vec<SessionRecord>,
}

/// Result of merging a session into an aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Added,
    /// A session with the same start time was already present
    Replaced,
    /// Sessions without any characters are not recorded
    Skipped,
}

impl DailyAggregate {
    pub fn new(date: NaiveDate, now: DateTime<Local>) -> Self {
        Self {
            date,
            created: now,
            last_updated: now,
            total_sessions: 0,
            total_characters: 0,
            total_words: 0,
            total_keystrokes: 0,
            sessions: Vec::new(),
        }
    }

    /// Merge a finalized session and refresh the totals.
    pub fn merge(&mut self, session: SessionRecord, now: DateTime<Local>) -> MergeOutcome {
        if session.character_count == 0 {
            return MergeOutcome::Skipped;
        }

        let outcome = match self
            .sessions
            .iter()
            .position(|s| s.start_time == session.start_time)
        {
            Some(index) => {
                self.sessions[index] = session;
                MergeOutcome::Replaced
            }
            None => {
                self.sessions.push(session);
                MergeOutcome::Added
            }
        };

        self.recompute_totals();
        self.last_updated = now;
        outcome
    }

    fn recompute_totals(&mut self) {
        self.total_sessions = self.sessions.len() as u64;
        self.total_characters = self.sessions.iter().map(|s| s.character_count).sum();
        self.total_words = self.sessions.iter().map(|s| s.word_count).sum();
        self.total_keystrokes = self.sessions.iter().map(|s| s.total_keystrokes).sum();
    }
}
