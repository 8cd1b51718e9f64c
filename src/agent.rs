//! Background tracking: the threads between a collector and the controller.
//!
//! ```text
//! capture thread ──(bounded channel)──▶ processing thread ──┐
//!                                                            ├─▶ Mutex<SessionController>
//!                                reporter thread (tick) ────┘
//! ```
//!
//! Both threads watch a shutdown channel. [`Agent::shutdown`] closes it,
//! lets the processing thread drain what is already queued, joins both
//! threads and finalizes the session under the lock.

use crate::collector::KeyboardEvent;
use crate::core::normalize::normalize;
use crate::core::session::{LifecycleError, Report, SessionController};
use crate::core::SessionRecord;
use crate::storage::RecordStore;
use crate::transparency::SharedTransparencyLog;
use chrono::Local;
use crossbeam_channel::{bounded, select, tick, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Errors starting the agent.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("Could not spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// The session finalized at shutdown, if one was open
    pub last_session: Option<SessionRecord>,
    pub sessions_finalized: u64,
    /// Writes still failing after the final retry
    pub pending_writes: usize,
}

type SharedController<S> = Arc<Mutex<SessionController<S>>>;

/// Running processing and reporter threads.
pub struct Agent<S: RecordStore + Send + 'static> {
    controller: SharedController<S>,
    transparency: SharedTransparencyLog,
    shutdown: Option<Sender<()>>,
    workers: Vec<JoinHandle<()>>,
}

impl<S: RecordStore + Send + 'static> Agent<S> {
    /// Start the controller and spawn the worker threads.
    ///
    /// `on_report` is called from the reporter thread every
    /// `report_interval`, after pending writes have been retried.
    pub fn spawn<F>(
        events: Receiver<KeyboardEvent>,
        mut controller: SessionController<S>,
        transparency: SharedTransparencyLog,
        report_interval: Duration,
        on_report: F,
    ) -> Result<Self, AgentError>
    where
        F: FnMut(&Report) + Send + 'static,
    {
        controller.start(Local::now())?;
        let controller = Arc::new(Mutex::new(controller));
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        let mut agent = Self {
            controller: Arc::clone(&controller),
            transparency: Arc::clone(&transparency),
            shutdown: Some(shutdown_tx),
            workers: Vec::with_capacity(2),
        };

        let processor = {
            let controller = Arc::clone(&controller);
            let shutdown = shutdown_rx.clone();
            thread::Builder::new()
                .name("typing-journal-processor".into())
                .spawn(move || process_events(&events, &shutdown, &controller, &transparency))?
        };
        agent.workers.push(processor);

        let reporter = thread::Builder::new()
            .name("typing-journal-reporter".into())
            .spawn(move || report_loop(report_interval, &shutdown_rx, &controller, on_report))?;
        agent.workers.push(reporter);

        Ok(agent)
    }

    /// Current counters, taken under the lock.
    pub fn snapshot(&self) -> Report {
        lock(&self.controller).snapshot(Local::now())
    }

    /// Stop the workers, finalize the open session and retry pending writes.
    pub fn shutdown(mut self) -> Result<RunSummary, LifecycleError> {
        self.halt();

        let mut controller = lock(&self.controller);
        let last_session = controller.stop(Local::now())?;
        let pending_writes = controller.flush_pending();

        if last_session.is_some() {
            self.transparency.record_sessions_finalized(1);
        }
        self.transparency
            .record_save_failures(controller.write_failures());

        if pending_writes > 0 {
            warn!(pending_writes, "Some records could not be saved");
        }

        Ok(RunSummary {
            last_session,
            sessions_finalized: controller.sessions_finalized(),
            pending_writes,
        })
    }

    /// Close the shutdown channel and join the workers.
    fn halt(&mut self) {
        // Dropping the only sender disconnects every receiver
        drop(self.shutdown.take());

        for worker in self.workers.drain(..) {
            let name = worker.thread().name().unwrap_or("worker").to_string();
            if worker.join().is_err() {
                error!("{name} thread panicked");
            }
        }
    }
}

impl<S: RecordStore + Send + 'static> Drop for Agent<S> {
    fn drop(&mut self) {
        self.halt();
    }
}

/// Lock the controller, keeping its state if another thread panicked.
pub fn lock<S: RecordStore>(controller: &Mutex<SessionController<S>>) -> MutexGuard<'_, SessionController<S>> {
    controller.lock().unwrap_or_else(PoisonError::into_inner)
}

fn process_events<S: RecordStore>(
    events: &Receiver<KeyboardEvent>,
    shutdown: &Receiver<()>,
    controller: &Mutex<SessionController<S>>,
    transparency: &SharedTransparencyLog,
) {
    debug!("Processing thread started");
    loop {
        select! {
            recv(events) -> event => match event {
                Ok(event) => apply_event(&event, controller, transparency),
                Err(_) => {
                    info!("Event source disconnected");
                    break;
                }
            },
            recv(shutdown) -> _ => {
                let drained = events
                    .try_iter()
                    .map(|event| apply_event(&event, controller, transparency))
                    .count();
                debug!(drained, "Processing thread stopping");
                break;
            }
        }
    }
}

fn apply_event<S: RecordStore>(
    event: &KeyboardEvent,
    controller: &Mutex<SessionController<S>>,
    transparency: &SharedTransparencyLog,
) {
    if !event.is_key_down {
        return;
    }

    let token = normalize(&event.key);
    match lock(controller).handle_key(&token, event.timestamp) {
        Ok(outcome) => {
            transparency.record_keystroke();
            if outcome.session_closed {
                transparency.record_sessions_finalized(1);
            }
        }
        Err(e) => {
            warn!("{e}");
            transparency.record_event_rejected();
        }
    }
}

fn report_loop<S, F>(
    interval: Duration,
    shutdown: &Receiver<()>,
    controller: &Mutex<SessionController<S>>,
    mut on_report: F,
) where
    S: RecordStore,
    F: FnMut(&Report),
{
    let ticker = tick(interval);
    loop {
        select! {
            recv(ticker) -> _ => {
                let report = {
                    let mut controller = lock(controller);
                    controller.flush_pending();
                    controller.snapshot(Local::now())
                };
                on_report(&report);
            },
            recv(shutdown) -> _ => break,
        }
    }
    debug!("Reporter thread stopped");
}
