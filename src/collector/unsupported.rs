//! Collector for targets without a keyboard capture backend.
//!
//! This exists so the crate (and binary) compile everywhere. Starting it
//! always fails with [`CollectorError::Unsupported`], which callers treat as
//! "capture unavailable".

use crate::collector::types::{CollectorConfig, CollectorError, KeyboardEvent};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A collector that can never be started.
pub struct UnsupportedCollector {
    _sender: Sender<KeyboardEvent>,
    receiver: Receiver<KeyboardEvent>,
    dropped: Arc<AtomicU64>,
}

impl UnsupportedCollector {
    pub fn new(config: CollectorConfig) -> Self {
        let (sender, receiver) = bounded(config.channel_capacity.max(1));
        Self {
            _sender: sender,
            receiver,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn start(&mut self) -> Result<(), CollectorError> {
        Err(CollectorError::Unsupported)
    }

    pub fn stop(&mut self) {}

    pub fn is_running(&self) -> bool {
        false
    }

    pub fn receiver(&self) -> &Receiver<KeyboardEvent> {
        &self.receiver
    }

    pub fn try_recv(&self) -> Option<KeyboardEvent> {
        self.receiver.try_recv().ok()
    }

    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// There is no capture backend to grant access to on this platform.
pub fn check_permission() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_reports_unsupported() {
        let mut collector = UnsupportedCollector::new(CollectorConfig::default());
        assert!(matches!(
            collector.start(),
            Err(CollectorError::Unsupported)
        ));
        assert!(!collector.is_running());
        assert!(collector.try_recv().is_none());
        assert_eq!(collector.dropped_events(), 0);
    }
}
