//! Rolling words-per-minute estimation.
//!
//! Samples of `(timestamp, cumulative word count)` are appended on word
//! boundaries and kept for a trailing window. WPM is the change in word
//! count between the oldest and newest retained samples.

use chrono::{DateTime, Duration, Local};
use std::collections::VecDeque;

/// Default trailing window for WPM.
pub const DEFAULT_WPM_WINDOW_SECS: i64 = 60;

/// A word-count observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThroughputSample {
    pub timestamp: DateTime<Local>,
    pub word_count: u64,
}

/// Maintains the trailing sample window.
#[derive(Debug, Clone)]
pub struct ThroughputEstimator {
    window: Duration,
    samples: VecDeque<ThroughputSample>,
}

impl Default for ThroughputEstimator {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_WPM_WINDOW_SECS))
    }
}

impl ThroughputEstimator {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            samples: VecDeque::new(),
        }
    }

    /// Append a sample and evict everything that has left the window.
    pub fn record(&mut self, timestamp: DateTime<Local>, word_count: u64) {
        self.samples.push_back(ThroughputSample {
            timestamp,
            word_count,
        });
        self.evict(timestamp);
    }

    /// Words per minute over the trailing window ending at `now`.
    ///
    /// The result is negative when the word count shrank over the window
    /// (net deletion); that is reported as-is.
    pub fn estimate_wpm(&mut self, now: DateTime<Local>) -> f64 {
        self.evict(now);

        let (first, last) = match (self.samples.front(), self.samples.back()) {
            (Some(first), Some(last)) if self.samples.len() >= 2 => (first, last),
            _ => return 0.0,
        };

        let delta_words = last.word_count as f64 - first.word_count as f64;
        let delta_minutes = (last.timestamp - first.timestamp).num_milliseconds() as f64 / 60_000.0;

        if delta_minutes <= 0.0 {
            return 0.0;
        }

        delta_words / delta_minutes
    }

    /// Number of samples currently retained.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Drop every sample.
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    fn evict(&mut self, now: DateTime<Local>) {
        let cutoff = now - self.window;
        while let Some(front) = self.samples.front() {
            if front.timestamp > cutoff {
                break;
            }
            self.samples.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 14, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_wpm_over_half_minute() {
        let mut estimator = ThroughputEstimator::default();
        estimator.record(t0(), 5);
        estimator.record(t0() + Duration::seconds(30), 10);

        let wpm = estimator.estimate_wpm(t0() + Duration::seconds(30));
        assert!((wpm - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_fewer_than_two_samples_is_zero() {
        let mut estimator = ThroughputEstimator::default();
        assert_eq!(estimator.estimate_wpm(t0()), 0.0);

        estimator.record(t0(), 3);
        assert_eq!(estimator.estimate_wpm(t0()), 0.0);
    }

    #[test]
    fn test_same_timestamp_is_zero() {
        let mut estimator = ThroughputEstimator::default();
        estimator.record(t0(), 3);
        estimator.record(t0(), 4);
        assert_eq!(estimator.estimate_wpm(t0()), 0.0);
    }

    #[test]
    fn test_stale_samples_are_excluded() {
        let mut estimator = ThroughputEstimator::default();
        // Far outside the window; would dominate the result if kept
        estimator.record(t0(), 0);
        estimator.record(t0() + Duration::seconds(70), 100);
        estimator.record(t0() + Duration::seconds(80), 102);
        estimator.record(t0() + Duration::seconds(90), 104);

        assert_eq!(estimator.len(), 3);
        let wpm = estimator.estimate_wpm(t0() + Duration::seconds(90));
        // 4 words over 20 seconds
        assert!((wpm - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_query_evicts_lazily() {
        let mut estimator = ThroughputEstimator::default();
        estimator.record(t0(), 1);
        estimator.record(t0() + Duration::seconds(10), 3);

        assert_eq!(estimator.estimate_wpm(t0() + Duration::seconds(65)), 0.0);
        assert_eq!(estimator.len(), 1);
    }

    #[test]
    fn test_net_deletion_reports_negative_wpm() {
        let mut estimator = ThroughputEstimator::default();
        estimator.record(t0(), 10);
        estimator.record(t0() + Duration::seconds(30), 8);

        let wpm = estimator.estimate_wpm(t0() + Duration::seconds(30));
        assert!((wpm + 4.0).abs() < 1e-9);
    }
}
