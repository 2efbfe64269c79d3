//! Worker/front-end split.
//!
//! The engine runs on a background worker holding a [`BridgeInteraction`].
//! Output travels to the front end as [`FrontendEvent`]s; when the worker
//! needs input it emits `RequestInput` and parks on a condition variable
//! until the front end hands text over through [`InputHandshake::submit`].

use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use tracing::debug;

use crate::engine::error::{ParsagonError, Result};
use crate::interaction::{Tone, UserInteraction};

#[derive(Debug, Clone, PartialEq)]
pub enum FrontendEvent {
    Text { tone: Tone, text: String },
    RequestInput { prompt: String },
    ShowProgress { title: String, total: u64 },
    SetProgress { percent: u8 },
    HideProgress,
}

/// Single-slot mailbox the front end fills and the worker drains.
#[derive(Default)]
pub struct InputHandshake {
    slot: Mutex<Option<String>>,
    ready: Condvar,
}

impl InputHandshake {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Called by the front end once the operator entered text.
    pub fn submit(&self, text: impl Into<String>) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(text.into());
            self.ready.notify_one();
        }
    }

    /// Park until text arrives. Not cancelable.
    pub fn wait(&self) -> Result<String> {
        let guard = self
            .slot
            .lock()
            .map_err(|_| ParsagonError::InputClosed)?;
        let mut guard = self
            .ready
            .wait_while(guard, |slot| slot.is_none())
            .map_err(|_| ParsagonError::InputClosed)?;
        guard.take().ok_or(ParsagonError::InputClosed)
    }
}

struct ProgressState {
    total: u64,
    done: u64,
}

/// Worker-side [`UserInteraction`].
pub struct BridgeInteraction {
    events: Mutex<Sender<FrontendEvent>>,
    handshake: Arc<InputHandshake>,
    progress: Mutex<Option<ProgressState>>,
}

impl BridgeInteraction {
    pub fn new(events: Sender<FrontendEvent>, handshake: Arc<InputHandshake>) -> Self {
        BridgeInteraction {
            events: Mutex::new(events),
            handshake,
            progress: Mutex::new(None),
        }
    }

    fn emit(&self, event: FrontendEvent) {
        if let Ok(sender) = self.events.lock() {
            // A closed front end just drops output
            let _ = sender.send(event);
        }
    }
}

impl UserInteraction for BridgeInteraction {
    fn print(&self, tone: Tone, text: &str) {
        self.emit(FrontendEvent::Text {
            tone,
            text: text.to_string(),
        });
    }

    fn ask(&self, prompt: &str) -> Result<String> {
        self.emit(FrontendEvent::RequestInput {
            prompt: prompt.to_string(),
        });
        let answer = self.handshake.wait()?;
        debug!(chars = answer.len(), "input received from front end");
        Ok(answer)
    }

    fn confirm(&self, prompt: &str) -> Result<bool> {
        let answer = self.ask(&format!("{} (y/n):", prompt))?;
        Ok(answer.trim().eq_ignore_ascii_case("y"))
    }

    fn start_progress(&self, title: &str, total: u64) {
        if let Ok(mut state) = self.progress.lock() {
            *state = Some(ProgressState { total, done: 0 });
        }
        self.emit(FrontendEvent::ShowProgress {
            title: title.to_string(),
            total,
        });
    }

    fn advance_progress(&self) {
        let percent = match self.progress.lock() {
            Ok(mut state) => match state.as_mut() {
                Some(p) => {
                    p.done += 1;
                    (p.done.min(p.total) * 100 / p.total.max(1)) as u8
                }
                None => return,
            },
            Err(_) => return,
        };
        self.emit(FrontendEvent::SetProgress { percent });
    }

    fn finish_progress(&self) {
        if let Ok(mut state) = self.progress.lock() {
            *state = None;
        }
        self.emit(FrontendEvent::HideProgress);
    }
}

/// Handles the front end keeps after starting a worker.
pub struct WorkerHandle<T> {
    pub events: Receiver<FrontendEvent>,
    pub handshake: Arc<InputHandshake>,
    pub join: JoinHandle<T>,
}

/// Run `job` on a background thread wired to a fresh bridge.
pub fn spawn_worker<T, F>(job: F) -> WorkerHandle<T>
where
    T: Send + 'static,
    F: FnOnce(Arc<dyn UserInteraction>) -> T + Send + 'static,
{
    let (sender, events) = channel();
    let handshake = InputHandshake::new();
    let ui: Arc<dyn UserInteraction> =
        Arc::new(BridgeInteraction::new(sender, Arc::clone(&handshake)));
    let join = thread::spawn(move || job(ui));
    WorkerHandle {
        events,
        handshake,
        join,
    }
}
