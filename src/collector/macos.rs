//! macOS implementation of keyboard collection using a CGEvent tap.
//!
//! The tap is listen-only and runs on its own run-loop thread. It requires
//! Input Monitoring permission.

use crate::collector::keymap::{macos_key, Modifiers};
use crate::collector::sink::EventSink;
use crate::collector::types::{CollectorConfig, CollectorError, KeyboardEvent};
use core_foundation::runloop::{kCFRunLoopCommonModes, CFRunLoop};
use core_graphics::event::{
    CGEvent, CGEventFlags, CGEventTap, CGEventTapLocation, CGEventTapOptions,
    CGEventTapPlacement, CGEventType, CallbackResult, EventField,
};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// The macOS keyboard collector using CGEvent tap.
pub struct MacOSCollector {
    sender: Sender<KeyboardEvent>,
    receiver: Receiver<KeyboardEvent>,
    running: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
    thread_handle: Option<JoinHandle<()>>,
}

impl MacOSCollector {
    /// Create a new macOS collector with the given configuration.
    pub fn new(config: CollectorConfig) -> Self {
        // Use a bounded channel to prevent unbounded memory growth
        let (sender, receiver) = bounded(config.channel_capacity.max(1));

        Self {
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            dropped: Arc::new(AtomicU64::new(0)),
            thread_handle: None,
        }
    }

    /// Start capturing events in a background thread.
    ///
    /// Blocks until the tap is installed, so a missing Input Monitoring
    /// permission is reported here rather than from the capture thread.
    pub fn start(&mut self) -> Result<(), CollectorError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CollectorError::AlreadyRunning);
        }

        self.running.store(true, Ordering::SeqCst);

        let sink = EventSink::new(self.sender.clone(), self.dropped.clone());
        let running = self.running.clone();
        let (ready_tx, ready_rx) = bounded(1);

        let handle = thread::spawn(move || {
            if let Err(e) = run_event_loop(sink, running.clone(), &ready_tx) {
                tracing::error!("Event tap error: {e}");
                let _ = ready_tx.send(Err(e));
            }
            running.store(false, Ordering::SeqCst);
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.thread_handle = Some(handle);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                self.running.store(false, Ordering::SeqCst);
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                self.running.store(false, Ordering::SeqCst);
                Err(CollectorError::CaptureThreadExited)
            }
        }
    }

    /// Stop capturing events.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            // The run loop wakes every 100ms and exits once running is false
            let _ = handle.join();
        }
    }

    /// Check if the collector is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the receiver for keyboard events.
    pub fn receiver(&self) -> &Receiver<KeyboardEvent> {
        &self.receiver
    }

    /// Try to receive an event without blocking.
    pub fn try_recv(&self) -> Option<KeyboardEvent> {
        self.receiver.try_recv().ok()
    }

    /// Events dropped because the channel was full.
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for MacOSCollector {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Run the Core Graphics event loop until `running` is cleared.
fn run_event_loop(
    sink: EventSink,
    running: Arc<AtomicBool>,
    ready: &Sender<Result<(), CollectorError>>,
) -> Result<(), CollectorError> {
    let tap = CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![CGEventType::KeyDown, CGEventType::KeyUp],
        move |_proxy, event_type, event| {
            if let Some(keyboard_event) = process_cg_event(event_type, event) {
                sink.push(keyboard_event);
            }
            // Passive observer: the event continues unchanged
            CallbackResult::Keep
        },
    )
    .map_err(|_| CollectorError::TapCreationFailed)?;

    let source = tap
        .mach_port()
        .create_runloop_source(0)
        .map_err(|_| CollectorError::RunLoopSourceFailed)?;

    let run_loop = CFRunLoop::get_current();
    unsafe {
        run_loop.add_source(&source, kCFRunLoopCommonModes);
    }

    tap.enable();
    let _ = ready.send(Ok(()));

    while running.load(Ordering::SeqCst) {
        CFRunLoop::run_in_mode(
            unsafe { kCFRunLoopCommonModes },
            std::time::Duration::from_millis(100),
            false,
        );
    }

    // The tap is automatically disabled when dropped
    Ok(())
}

/// Convert a CGEvent into a keyboard event.
fn process_cg_event(event_type: CGEventType, event: &CGEvent) -> Option<KeyboardEvent> {
    let is_key_down = match event_type {
        CGEventType::KeyDown => true,
        CGEventType::KeyUp => false,
        _ => return None,
    };

    let keycode = event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE) as u16;
    let flags = event.get_flags();
    let modifiers = Modifiers {
        shift: flags.contains(CGEventFlags::CGEventFlagShift),
        caps_lock: flags.contains(CGEventFlags::CGEventFlagAlphaShift),
    };

    Some(KeyboardEvent::new(macos_key(keycode, modifiers), is_key_down))
}

/// Check if the application has Input Monitoring permission.
///
/// macOS has no direct query for this; creating a passive tap fails when
/// permission is missing.
pub fn check_permission() -> bool {
    let result = CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![CGEventType::KeyDown],
        |_proxy, _type, _event| CallbackResult::Keep,
    );

    result.is_ok()
}
