//! Windows implementation of keyboard collection using a low-level hook.
//!
//! The `WH_KEYBOARD_LL` hook is installed on a dedicated thread that pumps
//! messages; hook callbacks run on that same thread.

use crate::collector::keymap::{windows_key, WindowsModifierTracker};
use crate::collector::sink::EventSink;
use crate::collector::types::{CollectorConfig, CollectorError, KeyboardEvent};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use windows::Win32::Foundation::{HINSTANCE, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::Input::KeyboardAndMouse::{GetKeyState, VK_CAPITAL};
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, GetMessageW, PostThreadMessageW, SetWindowsHookExW, UnhookWindowsHookEx,
    HHOOK, KBDLLHOOKSTRUCT, MSG, WH_KEYBOARD_LL, WM_KEYDOWN, WM_KEYUP, WM_QUIT, WM_SYSKEYDOWN,
    WM_SYSKEYUP,
};

/// The Windows keyboard collector using a low-level hook.
pub struct WindowsCollector {
    sender: Sender<KeyboardEvent>,
    receiver: Receiver<KeyboardEvent>,
    running: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
    hook_thread_id: Option<u32>,
    thread_handle: Option<JoinHandle<()>>,
}

impl WindowsCollector {
    /// Create a new Windows collector with the given configuration.
    pub fn new(config: CollectorConfig) -> Self {
        // Use a bounded channel to prevent unbounded memory growth
        let (sender, receiver) = bounded(config.channel_capacity.max(1));

        Self {
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            dropped: Arc::new(AtomicU64::new(0)),
            hook_thread_id: None,
            thread_handle: None,
        }
    }

    /// Start capturing events in a background thread.
    ///
    /// Blocks until the hook is installed so installation failures are
    /// returned to the caller.
    pub fn start(&mut self) -> Result<(), CollectorError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CollectorError::AlreadyRunning);
        }

        self.running.store(true, Ordering::SeqCst);

        let sink = EventSink::new(self.sender.clone(), self.dropped.clone());
        let running = self.running.clone();
        let (ready_tx, ready_rx) = bounded(1);

        let handle = thread::spawn(move || {
            if let Err(e) = run_hook_loop(sink, &ready_tx) {
                tracing::error!("Hook loop error: {e}");
                let _ = ready_tx.send(Err(e));
            }
            running.store(false, Ordering::SeqCst);
        });

        match ready_rx.recv() {
            Ok(Ok(thread_id)) => {
                self.hook_thread_id = Some(thread_id);
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

        // GetMessageW blocks, so wake the hook thread with WM_QUIT
        if let Some(thread_id) = self.hook_thread_id.take() {
            unsafe {
                let _ = PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0));
            }
        }

        if let Some(handle) = self.thread_handle.take() {
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

impl Drop for WindowsCollector {
    fn drop(&mut self) {
        self.stop();
    }
}

// Hook callbacks cannot capture state, so the hook thread keeps it here.
thread_local! {
    static EVENT_SINK: RefCell<Option<EventSink>> = const { RefCell::new(None) };
    static MODIFIERS: Cell<WindowsModifierTracker> =
        const { Cell::new(WindowsModifierTracker::new(false)) };
}

/// Low-level keyboard hook callback.
unsafe extern "system" fn keyboard_hook_proc(
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if n_code >= 0 {
        let kb_struct = &*(l_param.0 as *const KBDLLHOOKSTRUCT);
        let w_param_u32 = w_param.0 as u32;

        if matches!(
            w_param_u32,
            WM_KEYDOWN | WM_KEYUP | WM_SYSKEYDOWN | WM_SYSKEYUP
        ) {
            let is_key_down = matches!(w_param_u32, WM_KEYDOWN | WM_SYSKEYDOWN);
            let vk = kb_struct.vkCode;

            let modifiers = MODIFIERS.with(|cell| {
                let mut tracker = cell.get();
                let modifiers = tracker.observe(vk, is_key_down);
                cell.set(tracker);
                modifiers
            });

            let event = KeyboardEvent::new(windows_key(vk, modifiers), is_key_down);
            EVENT_SINK.with(|sink| {
                if let Some(ref sink) = *sink.borrow() {
                    sink.push(event);
                }
            });
        }
    }

    // Pass the event to the next hook
    CallNextHookEx(HHOOK::default(), n_code, w_param, l_param)
}

/// Install the hook and pump messages until WM_QUIT.
fn run_hook_loop(
    sink: EventSink,
    ready: &Sender<Result<u32, CollectorError>>,
) -> Result<(), CollectorError> {
    EVENT_SINK.with(|s| {
        *s.borrow_mut() = Some(sink);
    });

    // Low bit of the caps lock key state is its toggle
    let caps_lock = unsafe { GetKeyState(i32::from(VK_CAPITAL.0)) } & 1 != 0;
    MODIFIERS.with(|cell| cell.set(WindowsModifierTracker::new(caps_lock)));

    unsafe {
        let hook = SetWindowsHookExW(
            WH_KEYBOARD_LL,
            Some(keyboard_hook_proc),
            HINSTANCE::default(),
            0,
        )
        .map_err(|_| CollectorError::HookInstallationFailed)?;

        let _ = ready.send(Ok(GetCurrentThreadId()));

        let mut msg = MSG::default();
        // GetMessageW returns 0 on WM_QUIT and -1 on error
        while GetMessageW(&mut msg, HWND::default(), 0, 0).0 > 0 {}

        let _ = UnhookWindowsHookEx(hook);
    }

    EVENT_SINK.with(|s| {
        *s.borrow_mut() = None;
    });

    Ok(())
}

/// Check if the application can install a low-level keyboard hook.
pub fn check_permission() -> bool {
    unsafe {
        match SetWindowsHookExW(
            WH_KEYBOARD_LL,
            Some(keyboard_hook_proc),
            HINSTANCE::default(),
            0,
        ) {
            Ok(hook) => {
                let _ = UnhookWindowsHookEx(hook);
                true
            }
            Err(_) => false,
        }
    }
}
