//! Session transcript and the rules for applying key tokens to it.

use crate::core::normalize::KeyToken;
use crate::core::throughput::ThroughputEstimator;
use chrono::{DateTime, Duration, Local};
use serde::{Deserialize, Serialize};

/// Default inactivity gap after which a paragraph break is inserted.
pub const DEFAULT_PARAGRAPH_GAP_SECS: i64 = 5;

/// Inserted into the transcript when typing resumes after a pause.
pub const PARAGRAPH_BREAK: &str = "\n\n";

/// One continuous typing session.
///
/// `character_count` always equals the number of chars in `content`,
/// paragraph breaks included. `word_count`, `duration_seconds` and
/// `end_time` are only set once the session is finalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(rename = "session_start")]
    pub start_time: DateTime<Local>,
    #[serde(rename = "session_end")]
    pub end_time: Option<DateTime<Local>>,
    pub content: String,
    pub character_count: u64,
    pub word_count: u64,
    pub total_keystrokes: u64,
    pub duration_seconds: f64,
    #[serde(rename = "last_activity")]
    pub last_activity_time: DateTime<Local>,
}

impl SessionRecord {
    /// Create an empty, open session.
    pub fn new(start_time: DateTime<Local>) -> Self {
        Self {
            start_time,
            end_time: None,
            content: String::new(),
            character_count: 0,
            word_count: 0,
            total_keystrokes: 0,
            duration_seconds: 0.0,
            last_activity_time: start_time,
        }
    }

    /// Whitespace-delimited words currently in the transcript.
    pub fn current_word_count(&self) -> u64 {
        count_words(&self.content)
    }

    pub fn is_finalized(&self) -> bool {
        self.end_time.is_some()
    }

    /// Close the session at `end_time` and compute the derived fields.
    pub fn finalize(&mut self, end_time: DateTime<Local>) {
        self.end_time = Some(end_time);
        self.word_count = self.current_word_count();
        self.duration_seconds = (end_time - self.start_time).num_milliseconds() as f64 / 1000.0;
    }

    fn push_str(&mut self, text: &str) {
        self.content.push_str(text);
        self.character_count += text.chars().count() as u64;
    }

    fn push(&mut self, c: char) {
        self.content.push(c);
        self.character_count += 1;
    }

    fn delete_last(&mut self) {
        if self.content.pop().is_some() {
            self.character_count = self.character_count.saturating_sub(1);
        }
    }
}

/// Number of whitespace-delimited tokens in `text`.
pub fn count_words(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}

/// What applying a single token did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Applied {
    /// A paragraph break was inserted before the token
    pub paragraph_break: bool,
    /// Word count reported to the throughput estimator, if any
    pub sampled_words: Option<u64>,
}

/// Applies key tokens to a session record.
#[derive(Debug, Clone)]
pub struct SessionBuffer {
    paragraph_gap: Duration,
}

impl Default for SessionBuffer {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_PARAGRAPH_GAP_SECS))
    }
}

impl SessionBuffer {
    pub fn new(paragraph_gap: Duration) -> Self {
        Self { paragraph_gap }
    }

    /// Apply one token accepted at `timestamp`.
    ///
    /// 1. insert a paragraph break if the pause since the previous key
    ///    exceeds the paragraph gap
    /// 2. mutate the transcript
    /// 3. update activity time and keystroke count
    /// 4. report word boundaries to `throughput`
    pub fn apply(
        &self,
        record: &mut SessionRecord,
        token: &KeyToken,
        timestamp: DateTime<Local>,
        throughput: &mut ThroughputEstimator,
    ) -> Applied {
        let mut applied = Applied::default();

        if record.total_keystrokes > 0
            && timestamp - record.last_activity_time > self.paragraph_gap
        {
            record.push_str(PARAGRAPH_BREAK);
            applied.paragraph_break = true;
        }

        match token {
            KeyToken::Character('\r') | KeyToken::Character('\n') => record.push('\n'),
            KeyToken::Character(c) => record.push(*c),
            KeyToken::Space => record.push(' '),
            KeyToken::Backspace => record.delete_last(),
            KeyToken::Enter | KeyToken::Tab | KeyToken::Other(_) => {}
        }

        record.last_activity_time = timestamp;
        record.total_keystrokes += 1;

        if token.is_word_boundary() {
            let words = record.current_word_count();
            throughput.record(timestamp, words);
            applied.sampled_words = Some(words);
        }

        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 14, 9, 0, 0).unwrap()
    }

    fn type_text(
        buffer: &SessionBuffer,
        record: &mut SessionRecord,
        estimator: &mut ThroughputEstimator,
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
            buffer.apply(record, &token, at, estimator);
            at += Duration::milliseconds(100);
        }
        at
    }

    #[test]
    fn test_paragraph_break_after_pause() {
        let buffer = SessionBuffer::default();
        let mut estimator = ThroughputEstimator::default();
        let mut record = SessionRecord::new(t0());

        let end = type_text(&buffer, &mut record, &mut estimator, "hello", t0());
        type_text(
            &buffer,
            &mut record,
            &mut estimator,
            "world",
            end + Duration::seconds(6),
        );

        assert_eq!(record.content, "hello\n\nworld");
        // The break counts toward character_count
        assert_eq!(record.character_count, 12);
        assert_eq!(record.total_keystrokes, 10);
    }

    #[test]
    fn test_no_break_for_short_pause() {
        let buffer = SessionBuffer::default();
        let mut estimator = ThroughputEstimator::default();
        let mut record = SessionRecord::new(t0());

        let end = type_text(&buffer, &mut record, &mut estimator, "ab", t0());
        type_text(
            &buffer,
            &mut record,
            &mut estimator,
            "cd",
            end + Duration::seconds(4),
        );

        assert_eq!(record.content, "abcd");
    }

    #[test]
    fn test_no_break_at_exactly_the_gap() {
        let buffer = SessionBuffer::new(Duration::seconds(5));
        let mut estimator = ThroughputEstimator::default();
        let mut record = SessionRecord::new(t0());

        buffer.apply(&mut record, &KeyToken::Character('a'), t0(), &mut estimator);
        let applied = buffer.apply(
            &mut record,
            &KeyToken::Character('b'),
            t0() + Duration::seconds(5),
            &mut estimator,
        );
        assert_eq!(record.content, "ab");
        assert!(!applied.paragraph_break);

        // One millisecond more does break
        buffer.apply(
            &mut record,
            &KeyToken::Character('c'),
            t0() + Duration::milliseconds(10_001),
            &mut estimator,
        );
        assert_eq!(record.content, "ab\n\nc");
    }

    #[test]
    fn test_first_key_never_breaks() {
        let buffer = SessionBuffer::default();
        let mut estimator = ThroughputEstimator::default();
        let mut record = SessionRecord::new(t0());

        buffer.apply(
            &mut record,
            &KeyToken::Character('x'),
            t0() + Duration::minutes(10),
            &mut estimator,
        );
        assert_eq!(record.content, "x");
    }

    #[test]
    fn test_character_count_tracks_content() {
        let buffer = SessionBuffer::default();
        let mut estimator = ThroughputEstimator::default();
        let mut record = SessionRecord::new(t0());
        let mut at = t0();

        let tokens = [
            KeyToken::Character('a'),
            KeyToken::Character('b'),
            KeyToken::Space,
            KeyToken::Backspace,
            KeyToken::Backspace,
            KeyToken::Backspace,
            KeyToken::Backspace,
            KeyToken::Character('é'),
            KeyToken::Character('\t'),
            KeyToken::Backspace,
        ];

        for token in &tokens {
            buffer.apply(&mut record, token, at, &mut estimator);
            assert_eq!(
                record.character_count,
                record.content.chars().count() as u64
            );
            at += Duration::milliseconds(50);
        }

        assert_eq!(record.content, "é");
        assert_eq!(record.total_keystrokes, tokens.len() as u64);
    }

    #[test]
    fn test_backspace_on_empty_content() {
        let buffer = SessionBuffer::default();
        let mut estimator = ThroughputEstimator::default();
        let mut record = SessionRecord::new(t0());

        buffer.apply(&mut record, &KeyToken::Backspace, t0(), &mut estimator);

        assert_eq!(record.character_count, 0);
        assert!(record.content.is_empty());
        assert_eq!(record.total_keystrokes, 1);
    }

    #[test]
    fn test_control_characters_and_named_keys() {
        let buffer = SessionBuffer::default();
        let mut estimator = ThroughputEstimator::default();
        let mut record = SessionRecord::new(t0());

        for token in [
            KeyToken::Character('a'),
            KeyToken::Character('\r'),
            KeyToken::Character('\t'),
            KeyToken::Enter,
            KeyToken::Tab,
            KeyToken::Other("shift".to_string()),
        ] {
            buffer.apply(&mut record, &token, t0(), &mut estimator);
        }

        assert_eq!(record.content, "a\n\t");
        assert_eq!(record.character_count, 3);
        assert_eq!(record.total_keystrokes, 6);
    }

    #[test]
    fn test_word_boundaries_feed_estimator() {
        let buffer = SessionBuffer::default();
        let mut estimator = ThroughputEstimator::default();
        let mut record = SessionRecord::new(t0());

        type_text(&buffer, &mut record, &mut estimator, "one two ", t0());
        let applied = buffer.apply(
            &mut record,
            &KeyToken::Character('\n'),
            t0() + Duration::seconds(1),
            &mut estimator,
        );

        assert_eq!(applied.sampled_words, Some(2));
        assert_eq!(estimator.len(), 3);
    }

    #[test]
    fn test_word_count_on_finalize() {
        let mut record = SessionRecord::new(t0());
        record.content = "the quick brown fox".to_string();
        record.character_count = record.content.chars().count() as u64;
        assert_eq!(record.word_count, 0);

        record.finalize(t0() + Duration::seconds(90));

        assert_eq!(record.word_count, 4);
        assert_eq!(record.duration_seconds, 90.0);
        assert!(record.is_finalized());
    }

    #[test]
    fn test_record_serializes_with_journal_field_names() {
        let record = SessionRecord::new(t0());
        let json = serde_json::to_value(&record).unwrap();

        for field in [
            "session_start",
            "session_end",
            "content",
            "character_count",
            "word_count",
            "total_keystrokes",
            "duration_seconds",
            "last_activity",
        ] {
            assert!(json.get(field).is_some(), "missing {field}");
        }
        assert!(json["session_end"].is_null());
    }
}
