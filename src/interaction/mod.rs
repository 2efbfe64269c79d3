//! Operator-facing I/O, injected into the engine and the flows.

pub mod bridge;
pub mod terminal;

use crate::engine::error::Result;

/// How a printed line should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Normal,
    Assistant,
    Browser,
    Error,
}

pub trait UserInteraction: Send + Sync {
    fn print(&self, tone: Tone, text: &str);

    /// Block until the operator answers.
    fn ask(&self, prompt: &str) -> Result<String>;

    fn confirm(&self, prompt: &str) -> Result<bool>;

    fn start_progress(&self, title: &str, total: u64);

    fn advance_progress(&self);

    fn finish_progress(&self);
}
