//! Hand-off from an OS input callback to the processing thread.

use crate::collector::types::KeyboardEvent;
use crossbeam_channel::{Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Sending half used inside capture callbacks.
///
/// `push` never blocks: when the channel is full the event is dropped and
/// counted, so the OS hook is never stalled by a slow consumer.
#[derive(Debug, Clone)]
pub struct EventSink {
    sender: Sender<KeyboardEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventSink {
    pub fn new(sender: Sender<KeyboardEvent>, dropped: Arc<AtomicU64>) -> Self {
        Self { sender, dropped }
    }

    /// Queue an event. Returns false if it was dropped.
    pub fn push(&self, event: KeyboardEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            // Consumer is gone; tracking is shutting down
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Number of events dropped because the channel was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
