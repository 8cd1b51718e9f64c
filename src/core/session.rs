//! Session lifecycle: when sessions open and close, and how they are saved.
//!
//! The controller is a small state machine:
//!
//! ```text
//! Idle --start()--> Open --stop()--> Stopped
//!                   |  ^
//!                   +--+ key events (and, with SplitOnIdle, session rollover)
//! ```
//!
//! The session record itself is created lazily by the first key event after
//! `start()`. Writes that fail are queued and retried on the next flush or
//! finalize; tracking never stops because storage is unavailable.

use crate::core::aggregate::{DailyAggregate, MergeOutcome};
use crate::core::buffer::{Applied, SessionBuffer, SessionRecord, DEFAULT_PARAGRAPH_GAP_SECS};
use crate::core::normalize::KeyToken;
use crate::core::throughput::{ThroughputEstimator, DEFAULT_WPM_WINDOW_SECS};
use crate::storage::{daily_log_key, session_key, RecordStore, StoreError};
use chrono::{DateTime, Duration, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

/// How a run is divided into sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SessionPolicy {
    /// One session from the first key until stop
    Continuous,
    /// Close the session and open a new one after `gap_secs` of inactivity
    SplitOnIdle { gap_secs: u64 },
}

/// Session boundary rule with the idle gap already converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionBoundary {
    Continuous,
    /// Roll over to a new session after this much inactivity
    SplitOnIdle(Duration),
}

/// Which persisted layouts are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageLayout {
    /// One file per session, written at creation and on finalize
    pub session_files: bool,
    /// One roll-up file per calendar date, merged on finalize
    pub daily_log: bool,
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self {
            session_files: true,
            daily_log: true,
        }
    }
}

/// Tuning for a [`SessionController`].
#[derive(Debug, Clone)]
pub struct TrackerSettings {
    pub paragraph_gap: Duration,
    pub wpm_window: Duration,
    pub boundary: SessionBoundary,
    pub layout: StorageLayout,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            paragraph_gap: Duration::seconds(DEFAULT_PARAGRAPH_GAP_SECS),
            wpm_window: Duration::seconds(DEFAULT_WPM_WINDOW_SECS),
            boundary: SessionBoundary::Continuous,
            layout: StorageLayout::default(),
        }
    }
}

/// Controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackerState {
    Idle,
    Open,
    Stopped,
}

impl fmt::Display for TrackerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerState::Idle => write!(f, "idle"),
            TrackerState::Open => write!(f, "open"),
            TrackerState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Invalid lifecycle transitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("tracking has already started")]
    AlreadyStarted,
    #[error("tracking has stopped and cannot be restarted")]
    Stopped,
}

/// A key event that could not be applied.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
    #[error("key event dropped: tracker is {0}")]
    NotAccepting(TrackerState),
}

/// What handling a key event did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyOutcome {
    pub applied: Applied,
    /// This key opened a new session record
    pub session_opened: bool,
    /// The previous session was closed before applying this key
    pub session_closed: bool,
}

/// Point-in-time view for the periodic reporter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub at: DateTime<Local>,
    pub state: TrackerState,
    pub session_start: Option<DateTime<Local>>,
    pub words: u64,
    pub characters: u64,
    pub keystrokes: u64,
    pub wpm: f64,
    pub sessions_finalized: u64,
    pub pending_writes: usize,
    pub write_failures: u64,
}

#[derive(Debug, Clone)]
enum PendingWrite {
    Session { key: String, record: SessionRecord },
    DailyMerge(SessionRecord),
}

#[derive(Debug)]
struct OpenSession {
    key: String,
    record: SessionRecord,
}

/// Owns the open session and everything needed to persist it.
pub struct SessionController<S: RecordStore> {
    settings: TrackerSettings,
    buffer: SessionBuffer,
    throughput: ThroughputEstimator,
    store: S,
    state: TrackerState,
    current: Option<OpenSession>,
    pending: Vec<PendingWrite>,
    issued_keys: HashSet<String>,
    sessions_finalized: u64,
    write_failures: u64,
}

impl<S: RecordStore> SessionController<S> {
    pub fn new(settings: TrackerSettings, store: S) -> Self {
        Self {
            buffer: SessionBuffer::new(settings.paragraph_gap),
            throughput: ThroughputEstimator::new(settings.wpm_window),
            settings,
            store,
            state: TrackerState::Idle,
            current: None,
            pending: Vec::new(),
            issued_keys: HashSet::new(),
            sessions_finalized: 0,
            write_failures: 0,
        }
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// The open session record, if a key has been accepted since it opened.
    pub fn current_session(&self) -> Option<&SessionRecord> {
        self.current.as_ref().map(|open| &open.record)
    }

    /// Storage key of the open session.
    pub fn current_key(&self) -> Option<&str> {
        self.current.as_ref().map(|open| open.key.as_str())
    }

    /// Writes waiting to be retried.
    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }

    pub fn sessions_finalized(&self) -> u64 {
        self.sessions_finalized
    }

    /// Writes that failed on first attempt and had to be queued.
    pub fn write_failures(&self) -> u64 {
        self.write_failures
    }

    /// Begin accepting key events.
    pub fn start(&mut self, now: DateTime<Local>) -> Result<(), LifecycleError> {
        match self.state {
            TrackerState::Idle => {
                self.state = TrackerState::Open;
                info!(
                    at = %now.to_rfc3339(),
                    boundary = ?self.settings.boundary,
                    "Tracking started"
                );
                Ok(())
            }
            TrackerState::Open => Err(LifecycleError::AlreadyStarted),
            TrackerState::Stopped => Err(LifecycleError::Stopped),
        }
    }

    /// Apply one normalized key press accepted at `timestamp`.
    pub fn handle_key(
        &mut self,
        token: &KeyToken,
        timestamp: DateTime<Local>,
    ) -> Result<KeyOutcome, EventError> {
        if self.state != TrackerState::Open {
            return Err(EventError::NotAccepting(self.state));
        }

        let mut outcome = KeyOutcome::default();

        if let Some(end) = self.idle_boundary(timestamp) {
            self.close_current(end);
            outcome.session_closed = true;
        }

        if self.current.is_none() {
            let key = self.issue_key(&timestamp);
            debug!(%key, "Opening session");
            self.current = Some(OpenSession {
                key,
                record: SessionRecord::new(timestamp),
            });
            outcome.session_opened = true;
        }

        let Some(open) = self.current.as_mut() else {
            return Err(EventError::NotAccepting(self.state));
        };
        outcome.applied = self
            .buffer
            .apply(&mut open.record, token, timestamp, &mut self.throughput);

        if outcome.session_opened && self.settings.layout.session_files {
            let write = PendingWrite::Session {
                key: open.key.clone(),
                record: open.record.clone(),
            };
            self.persist(write);
        }

        Ok(outcome)
    }

    /// Finalize the open session and stop accepting events.
    ///
    /// Finalization happens once: calling `stop` again returns `Ok(None)`
    /// and writes nothing.
    pub fn stop(&mut self, now: DateTime<Local>) -> Result<Option<SessionRecord>, LifecycleError> {
        match self.state {
            TrackerState::Stopped => Ok(None),
            TrackerState::Idle => {
                self.state = TrackerState::Stopped;
                Ok(None)
            }
            TrackerState::Open => {
                self.state = TrackerState::Stopped;
                let finalized = self.close_current(now);
                info!(
                    pending = self.pending.len(),
                    sessions = self.sessions_finalized,
                    "Tracking stopped"
                );
                Ok(finalized)
            }
        }
    }

    /// Retry queued writes. Returns how many are still pending.
    pub fn flush_pending(&mut self) -> usize {
        if self.pending.is_empty() {
            return 0;
        }

        let queued = std::mem::take(&mut self.pending);
        let attempted = queued.len();
        for write in queued {
            if let Err(e) = self.execute(&write) {
                debug!("Retry failed: {e}");
                self.pending.push(write);
            }
        }

        if self.pending.len() < attempted {
            info!(
                saved = attempted - self.pending.len(),
                remaining = self.pending.len(),
                "Flushed pending writes"
            );
        }
        self.pending.len()
    }

    /// Current counters and WPM.
    pub fn snapshot(&mut self, now: DateTime<Local>) -> Report {
        let wpm = self.throughput.estimate_wpm(now);
        let record = self.current.as_ref().map(|open| &open.record);

        Report {
            at: now,
            state: self.state,
            session_start: record.map(|r| r.start_time),
            words: record.map(SessionRecord::current_word_count).unwrap_or(0),
            characters: record.map(|r| r.character_count).unwrap_or(0),
            keystrokes: record.map(|r| r.total_keystrokes).unwrap_or(0),
            wpm,
            sessions_finalized: self.sessions_finalized,
            pending_writes: self.pending.len(),
            write_failures: self.write_failures,
        }
    }

    /// End time for the open session if `timestamp` starts a new one.
    fn idle_boundary(&self, timestamp: DateTime<Local>) -> Option<DateTime<Local>> {
        let SessionBoundary::SplitOnIdle(gap) = self.settings.boundary else {
            return None;
        };
        let record = &self.current.as_ref()?.record;

        (record.total_keystrokes > 0 && timestamp - record.last_activity_time > gap)
            .then_some(record.last_activity_time)
    }

    /// Finalize and persist the open session, if any.
    fn close_current(&mut self, end: DateTime<Local>) -> Option<SessionRecord> {
        // Finalizing is also a retry opportunity
        self.flush_pending();

        let OpenSession { key, mut record } = self.current.take()?;
        record.finalize(end);
        self.sessions_finalized += 1;
        self.throughput.clear();

        info!(
            %key,
            characters = record.character_count,
            words = record.word_count,
            "Session finalized"
        );

        if self.settings.layout.session_files {
            self.persist(PendingWrite::Session {
                key,
                record: record.clone(),
            });
        }
        if self.settings.layout.daily_log && record.character_count > 0 {
            self.persist(PendingWrite::DailyMerge(record.clone()));
        }

        Some(record)
    }

    fn persist(&mut self, write: PendingWrite) {
        if let Err(e) = self.execute(&write) {
            warn!("Could not save record, will retry: {e}");
            self.write_failures += 1;
            self.enqueue(write);
        }
    }

    fn enqueue(&mut self, write: PendingWrite) {
        // A newer write of the same session supersedes the queued one
        if let PendingWrite::Session { key, .. } = &write {
            self.pending.retain(|queued| match queued {
                PendingWrite::Session { key: queued_key, .. } => queued_key != key,
                PendingWrite::DailyMerge(_) => true,
            });
        }
        self.pending.push(write);
    }

    fn execute(&mut self, write: &PendingWrite) -> Result<(), StoreError> {
        match write {
            PendingWrite::Session { key, record } => self.store.store(key, record),
            PendingWrite::DailyMerge(record) => self.merge_into_daily_log(record),
        }
    }

    fn merge_into_daily_log(&mut self, record: &SessionRecord) -> Result<(), StoreError> {
        let date = record.start_time.date_naive();
        let key = daily_log_key(date);
        let now = Local::now();

        let mut aggregate = match self.store.load::<DailyAggregate>(&key) {
            Ok(Some(aggregate)) => aggregate,
            Ok(None) => DailyAggregate::new(date, now),
            Err(StoreError::Malformed { source, .. }) => {
                warn!(%key, "Existing daily log is malformed, starting a fresh one: {source}");
                DailyAggregate::new(date, now)
            }
            Err(e) => return Err(e),
        };

        if aggregate.merge(record.clone(), now) == MergeOutcome::Skipped {
            return Ok(());
        }
        self.store.store(&key, &aggregate)?;
        debug!(%key, sessions = aggregate.total_sessions, "Daily log updated");
        Ok(())
    }

    /// Storage key for a session starting at `start`, unique within this run.
    fn issue_key(&mut self, start: &DateTime<Local>) -> String {
        let base = session_key(start);
        let mut key = base.clone();
        let mut suffix = 2;
        while self.issued_keys.contains(&key) {
            key = format!("{base}-{suffix}");
            suffix += 1;
        }
        self.issued_keys.insert(key.clone());
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use chrono::TimeZone;

    fn t0() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 14, 9, 0, 0).unwrap()
    }

    fn controller(settings: TrackerSettings) -> SessionController<MemoryStore> {
        let mut controller = SessionController::new(settings, MemoryStore::new());
        controller.start(t0()).unwrap();
        controller
    }

    /// Type `text` one key every 100ms starting at `start`; returns the next free instant.
    fn type_text(
        controller: &mut SessionController<MemoryStore>,
        text: &str,
        start: DateTime<Local>,
    ) -> DateTime<Local> {
        let mut at = start;
        for c in text.chars() {
            let token = if c == ' ' {
                KeyToken::Space
            } else {
                KeyToken::Character(c)
            };
            controller.handle_key(&token, at).unwrap();
            at += Duration::milliseconds(100);
        }
        at
    }

    fn daily_log(controller: &SessionController<MemoryStore>) -> DailyAggregate {
        controller
            .store()
            .load(&daily_log_key(t0().date_naive()))
            .unwrap()
            .unwrap()
    }

    fn split_settings() -> TrackerSettings {
        TrackerSettings {
            boundary: SessionBoundary::SplitOnIdle(Duration::seconds(60)),
            ..TrackerSettings::default()
        }
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut controller = SessionController::new(TrackerSettings::default(), MemoryStore::new());

        assert_eq!(
            controller.handle_key(&KeyToken::Character('a'), t0()),
            Err(EventError::NotAccepting(TrackerState::Idle))
        );

        controller.start(t0()).unwrap();
        assert_eq!(controller.start(t0()), Err(LifecycleError::AlreadyStarted));
        assert_eq!(controller.state(), TrackerState::Open);

        controller.stop(t0()).unwrap();
        assert_eq!(controller.state(), TrackerState::Stopped);
        assert_eq!(
            controller.handle_key(&KeyToken::Character('a'), t0()),
            Err(EventError::NotAccepting(TrackerState::Stopped))
        );
        assert_eq!(controller.start(t0()), Err(LifecycleError::Stopped));
    }

    #[test]
    fn test_session_created_on_first_key() {
        let mut controller = controller(TrackerSettings::default());
        assert!(controller.current_session().is_none());

        let outcome = controller
            .handle_key(&KeyToken::Character('h'), t0())
            .unwrap();

        assert!(outcome.session_opened);
        let key = session_key(&t0());
        assert_eq!(controller.current_key(), Some(key.as_str()));
        assert!(controller.store().contains(&key));

        let written: SessionRecord = controller.store().load(&key).unwrap().unwrap();
        assert_eq!(written.start_time, t0());
        assert!(written.end_time.is_none());
    }

    #[test]
    fn test_stop_finalizes_and_persists() {
        let mut controller = controller(TrackerSettings::default());
        let end = type_text(&mut controller, "the quick brown fox", t0());

        let record = controller.stop(end + Duration::seconds(1)).unwrap().unwrap();

        assert_eq!(record.content, "the quick brown fox");
        assert_eq!(record.word_count, 4);
        assert_eq!(record.end_time, Some(end + Duration::seconds(1)));
        assert!((record.duration_seconds - 2.9).abs() < 1e-9);

        let saved: SessionRecord = controller
            .store()
            .load(&session_key(&t0()))
            .unwrap()
            .unwrap();
        assert_eq!(saved, record);

        let log = daily_log(&controller);
        assert_eq!(log.total_sessions, 1);
        assert_eq!(log.total_words, 4);
    }

    #[test]
    fn test_stop_twice_does_not_double_count() {
        let mut controller = controller(TrackerSettings::default());
        let end = type_text(&mut controller, "hello", t0());

        assert!(controller.stop(end).unwrap().is_some());
        let writes = controller.store().write_count();
        assert_eq!(controller.stop(end).unwrap(), None);

        assert_eq!(controller.store().write_count(), writes);
        assert_eq!(daily_log(&controller).total_sessions, 1);
        assert_eq!(controller.sessions_finalized(), 1);
    }

    #[test]
    fn test_stop_without_keys_writes_nothing() {
        let mut controller = controller(TrackerSettings::default());
        assert_eq!(controller.stop(t0()).unwrap(), None);
        assert!(controller.store().keys().is_empty());
    }

    #[test]
    fn test_split_on_idle_rolls_sessions_into_daily_log() {
        let mut controller = controller(split_settings());

        let end = type_text(&mut controller, "ten chars!", t0());
        let second_start = end + Duration::seconds(120);
        let outcome = controller
            .handle_key(&KeyToken::Character('f'), second_start)
            .unwrap();
        assert!(outcome.session_closed);
        assert!(outcome.session_opened);

        let end = type_text(
            &mut controller,
            "ifteen chars!!",
            second_start + Duration::milliseconds(100),
        );
        controller.stop(end).unwrap();

        let log = daily_log(&controller);
        assert_eq!(log.total_sessions, 2);
        assert_eq!(log.total_characters, 25);

        // The first session ended at its last keystroke, not at the rollover
        let first = &log.sessions[0];
        assert_eq!(first.end_time, Some(t0() + Duration::milliseconds(900)));
        assert_eq!(first.content, "ten chars!");
        assert!(controller.store().contains(&session_key(&second_start)));
    }

    #[test]
    fn test_continuous_policy_keeps_one_session_across_long_gaps() {
        let mut controller = controller(TrackerSettings::default());

        let end = type_text(&mut controller, "one", t0());
        type_text(&mut controller, "two", end + Duration::minutes(30));
        let record = controller.stop(end + Duration::minutes(31)).unwrap().unwrap();

        assert_eq!(record.content, "one\n\ntwo");
        assert_eq!(controller.sessions_finalized(), 1);
    }

    #[test]
    fn test_long_split_gap_never_rolls_over() {
        let settings = TrackerSettings {
            boundary: SessionBoundary::SplitOnIdle(Duration::days(365_000)),
            ..TrackerSettings::default()
        };
        let mut controller = controller(settings);

        let end = type_text(&mut controller, "abc", t0());
        let outcome = controller
            .handle_key(&KeyToken::Character('d'), end + Duration::days(30))
            .unwrap();

        assert!(!outcome.session_closed);
        assert!(!outcome.session_opened);
        assert_eq!(controller.sessions_finalized(), 0);
    }

    #[test]
    fn test_empty_session_not_added_to_daily_log() {
        let mut controller = controller(TrackerSettings::default());
        controller
            .handle_key(&KeyToken::Other("shift".to_string()), t0())
            .unwrap();

        let record = controller.stop(t0()).unwrap().unwrap();

        assert_eq!(record.character_count, 0);
        assert_eq!(record.total_keystrokes, 1);
        assert!(controller.store().contains(&session_key(&t0())));
        assert!(!controller
            .store()
            .contains(&daily_log_key(t0().date_naive())));
    }

    #[test]
    fn test_failed_writes_are_retried() {
        let mut controller = controller(TrackerSettings::default());
        controller.store_mut().set_fail_writes(true);

        let end = type_text(&mut controller, "saved later", t0());
        // Creation write failed but tracking continued
        assert_eq!(controller.pending_writes(), 1);
        assert_eq!(controller.current_session().unwrap().character_count, 11);

        let record = controller.stop(end).unwrap().unwrap();
        // Final session write superseded the creation write; plus the daily merge
        assert_eq!(controller.pending_writes(), 2);
        assert_eq!(controller.write_failures(), 3);

        controller.store_mut().set_fail_writes(false);
        assert_eq!(controller.flush_pending(), 0);

        let saved: SessionRecord = controller
            .store()
            .load(&session_key(&t0()))
            .unwrap()
            .unwrap();
        assert_eq!(saved, record);
        assert_eq!(daily_log(&controller).total_characters, 11);
    }

    #[test]
    fn test_malformed_daily_log_is_replaced() {
        let mut controller = controller(TrackerSettings::default());
        controller
            .store_mut()
            .insert_raw(daily_log_key(t0().date_naive()), "{\"date\": oops");

        let end = type_text(&mut controller, "fresh", t0());
        controller.stop(end).unwrap();

        assert_eq!(controller.pending_writes(), 0);
        let log = daily_log(&controller);
        assert_eq!(log.total_sessions, 1);
        assert_eq!(log.total_characters, 5);
    }

    #[test]
    fn test_daily_log_only_layout() {
        let settings = TrackerSettings {
            layout: StorageLayout {
                session_files: false,
                daily_log: true,
            },
            ..TrackerSettings::default()
        };
        let mut controller = controller(settings);
        let end = type_text(&mut controller, "abc", t0());
        controller.stop(end).unwrap();

        assert_eq!(
            controller.store().keys(),
            vec![daily_log_key(t0().date_naive())]
        );
    }

    #[test]
    fn test_snapshot_reports_words_and_wpm() {
        let mut controller = controller(TrackerSettings::default());
        let mut at = t0();
        // Five words, one every six seconds
        for _ in 0..5 {
            at = type_text(&mut controller, "word ", at);
            at += Duration::milliseconds(5500);
        }

        let report = controller.snapshot(at);

        assert_eq!(report.state, TrackerState::Open);
        assert_eq!(report.words, 5);
        assert_eq!(report.session_start, Some(t0()));
        // 4 words between the first and last boundary, 24 seconds apart
        assert!((report.wpm - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_issued_keys_are_unique() {
        let mut controller = controller(TrackerSettings::default());
        let first = controller.issue_key(&t0());
        let second = controller.issue_key(&t0());
        let third = controller.issue_key(&t0());

        assert_eq!(first, session_key(&t0()));
        assert_eq!(second, format!("{first}-2"));
        assert_eq!(third, format!("{first}-3"));
    }
}
