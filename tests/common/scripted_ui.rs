use std::collections::VecDeque;
use std::sync::Mutex;

use parsagon::engine::error::{ParsagonError, Result};
use parsagon::interaction::{Tone, UserInteraction};

/// Operator stand-in: answers prompts from a queue and records everything.
#[derive(Default)]
pub struct ScriptedUi {
    answers: Mutex<VecDeque<String>>,
    confirms: Mutex<VecDeque<bool>>,
    pub prompts: Mutex<Vec<String>>,
    pub printed: Mutex<Vec<(Tone, String)>>,
    pub progress: Mutex<Vec<String>>,
}

impl ScriptedUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answering(answers: &[&str]) -> Self {
        let ui = Self::new();
        ui.answers
            .lock()
            .unwrap()
            .extend(answers.iter().map(|a| a.to_string()));
        ui
    }

    pub fn confirming(self, confirms: &[bool]) -> Self {
        self.confirms.lock().unwrap().extend(confirms.iter().copied());
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn printed_text(&self) -> String {
        self.printed
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl UserInteraction for ScriptedUi {
    fn print(&self, tone: Tone, text: &str) {
        self.printed.lock().unwrap().push((tone, text.to_string()));
    }

    fn ask(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(ParsagonError::InputClosed)
    }

    fn confirm(&self, prompt: &str) -> Result<bool> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.confirms
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(ParsagonError::InputClosed)
    }

    fn start_progress(&self, title: &str, total: u64) {
        self.progress
            .lock()
            .unwrap()
            .push(format!("start {} {}", title, total));
    }

    fn advance_progress(&self) {
        self.progress.lock().unwrap().push("advance".into());
    }

    fn finish_progress(&self) {
        self.progress.lock().unwrap().push("finish".into());
    }
}
