//! Operator-facing flows built on the engine and the pipeline store.

pub mod create;
pub mod manage;
pub mod run;
pub mod update;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::api::backend::{AssistBackend, PipelineStore};
use crate::cli::config::BrowserConfig;
use crate::engine::custom_function::CustomFunction;
use crate::engine::error::Result;
use crate::engine::executor::Executor;
use crate::interaction::{Tone, UserInteraction};
use crate::trace::logger::TraceLogger;

/// How a flow ended, when it did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowOutcome {
    Saved { program_name: String },
    /// The operator rejected the sketch
    Cancelled { feedback: String },
    /// The operator declined to save
    Discarded,
    /// Saving failed; nothing was kept
    Failed(String),
    Output(Value),
    Done,
}

/// Builds a ready executor for one run.
pub trait EngineLauncher: Send + Sync {
    fn launch(&self, headless: bool, infer: bool) -> Result<Executor>;
}

/// Launches the Node.js driver process described by the browser config.
pub struct ProcessLauncher {
    pub browser: BrowserConfig,
    pub assist: Arc<dyn AssistBackend>,
    pub ui: Arc<dyn UserInteraction>,
    pub trace_path: Option<PathBuf>,
}

impl EngineLauncher for ProcessLauncher {
    fn launch(&self, headless: bool, infer: bool) -> Result<Executor> {
        let executor = Executor::launch(
            self.browser.driver_launch(headless),
            self.browser.display_size(headless),
            Arc::clone(&self.assist),
            Arc::clone(&self.ui),
            self.browser.executor_config(infer),
        )?;
        Ok(match &self.trace_path {
            Some(path) => executor.with_trace(TraceLogger::with_file(path)),
            None => executor,
        })
    }
}

/// Everything a flow talks to.
pub struct FlowContext {
    pub assist: Arc<dyn AssistBackend>,
    pub store: Arc<dyn PipelineStore>,
    pub ui: Arc<dyn UserInteraction>,
    pub launcher: Box<dyn EngineLauncher>,
    /// Remote run status polling
    pub poll_interval: Duration,
    pub verbose: bool,
}

impl FlowContext {
    pub(crate) fn say(&self, text: &str) {
        self.ui.print(Tone::Assistant, text);
    }

    /// Progress line shown while a function is uploaded.
    pub(crate) fn announce_save(&self, function: &CustomFunction) {
        let mut line = match function.name.description() {
            Some(description) => format!("  Saving function to {}", description),
            None => "  Saving function".to_string(),
        };
        if self.verbose {
            line.push_str(&format!(" ({})", function.name.as_str()));
        }
        line.push_str("...");
        self.say(&line);
    }
}
