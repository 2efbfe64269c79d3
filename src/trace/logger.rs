use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use serde_json::{Value, json};
use tracing::warn;

use crate::trace::trace::RunEvent;

/// Run log: every event is kept in memory and, when a path was given,
/// appended to a JSONL file as it happens.
#[derive(Default)]
pub struct TraceLogger {
    file: Option<Mutex<File>>,
    events: Vec<RunEvent>,
    warnings: Vec<Value>,
}

impl TraceLogger {
    /// In-memory only.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(path: &Path) -> Self {
        let file = OpenOptions::new().create(true).append(true).open(path);

        match file {
            Ok(f) => Self {
                file: Some(Mutex::new(f)),
                ..Self::default()
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not open trace file");
                Self::default()
            }
        }
    }

    pub fn log(&mut self, event: RunEvent) {
        if let Some(file_mutex) = &self.file {
            match serde_json::to_string(&event) {
                Ok(json) => match file_mutex.lock() {
                    Ok(mut file) => {
                        if let Err(e) = writeln!(file, "{}", json) {
                            warn!(error = %e, "failed to write trace event");
                        }
                    }
                    Err(e) => warn!(error = %e, "trace logger lock poisoned"),
                },
                Err(e) => warn!(error = %e, "failed to serialize trace event"),
            }
        }
        self.events.push(event);
    }

    /// Note an interaction that gave up after its retries.
    pub fn warn_interaction_failed(&mut self, event: &RunEvent) {
        self.warnings.push(json!({
            "type": "interaction_failed",
            "action": event.action,
            "call_id": event.call_id,
            "detail": event.detail,
        }));
    }

    pub fn events(&self) -> &[RunEvent] {
        &self.events
    }

    pub fn warnings(&self) -> &[Value] {
        &self.warnings
    }

    /// The events as JSONL text, for uploading with a run.
    pub fn to_log(&self) -> String {
        self.events
            .iter()
            .filter_map(|e| serde_json::to_string(e).ok())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
