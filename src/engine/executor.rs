use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::api::backend::AssistBackend;
use crate::browser::cleanup::{VirtualDisplay, kill_helper_processes};
use crate::browser::driver::BrowserDriver;
use crate::browser::resolution::{NodeId, WindowHandle};
use crate::browser::session::{BrowserSession, DriverLaunch};
use crate::dom::highlights;
use crate::dom::identifier::{SessionManager, VISIBLE_IDS_SCRIPT};
use crate::dom::sanitize;
use crate::engine::custom_function::{CallId, CustomFunction, ExampleAccumulator};
use crate::engine::env::RunEnvironment;
use crate::engine::error::Result;
use crate::engine::program::Program;
use crate::engine::replay::ReplayAdapter;
use crate::interaction::{Tone, UserInteraction};
use crate::trace::logger::TraceLogger;
use crate::trace::trace::RunEvent;

/// Timing and mode knobs for one engine instance.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Resolve elements through the remote identifier instead of the operator
    pub infer: bool,
    pub retries: u32,
    pub retry_backoff: Duration,
    /// Pause after an interaction before re-stamping
    pub settle: Duration,
    /// Pause after navigation
    pub load_wait: Duration,
    /// Killed by name on teardown
    pub helper_processes: Vec<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        ExecutorConfig {
            infer: false,
            retries: 3,
            retry_backoff: Duration::from_secs(2),
            settle: Duration::from_secs(2),
            load_wait: Duration::from_secs(2),
            helper_processes: vec!["chromedriver".to_string()],
        }
    }
}

impl ExecutorConfig {
    /// No sleeping anywhere. Program-level waits still scale by `seconds`.
    pub fn without_delays(mut self) -> Self {
        self.retry_backoff = Duration::ZERO;
        self.settle = Duration::ZERO;
        self.load_wait = Duration::ZERO;
        self
    }
}

/// Execution engine: runs a [`Program`] against one browser session and
/// accumulates the examples observed at each call site.
///
/// The browser, the virtual display and lingering helper processes are torn
/// down when [`Executor::execute`] returns, whatever the outcome, and again
/// (idempotently) on drop.
pub struct Executor {
    pub(crate) driver: Box<dyn BrowserDriver>,
    display: Option<VirtualDisplay>,
    pub(crate) sessions: SessionManager,
    pub(crate) functions: ExampleAccumulator,
    pub(crate) assist: Arc<dyn AssistBackend>,
    pub(crate) ui: Arc<dyn UserInteraction>,
    pub(crate) replay: Option<ReplayAdapter>,
    pub(crate) trace: TraceLogger,
    pub(crate) config: ExecutorConfig,
    closed: bool,
}

impl Executor {
    pub fn new(
        driver: Box<dyn BrowserDriver>,
        assist: Arc<dyn AssistBackend>,
        ui: Arc<dyn UserInteraction>,
        config: ExecutorConfig,
    ) -> Self {
        Executor {
            driver,
            display: None,
            sessions: SessionManager::new(),
            functions: ExampleAccumulator::new(),
            assist,
            ui,
            replay: None,
            trace: TraceLogger::new(),
            config,
            closed: false,
        }
    }

    /// Start the driver process, behind a virtual display when one is given.
    pub fn launch(
        mut launch: DriverLaunch,
        display_size: Option<(u32, u32)>,
        assist: Arc<dyn AssistBackend>,
        ui: Arc<dyn UserInteraction>,
        config: ExecutorConfig,
    ) -> Result<Self> {
        let display = match display_size {
            Some((width, height)) => Some(VirtualDisplay::start(width, height)?),
            None => None,
        };
        if let Some(d) = &display {
            launch.display = Some(d.display().to_string());
        }
        let session = BrowserSession::launch(&launch)?;
        let mut executor = Executor::new(Box::new(session), assist, ui, config);
        executor.display = display;
        Ok(executor)
    }

    pub fn with_replay(mut self, replay: ReplayAdapter) -> Self {
        self.replay = Some(replay);
        self
    }

    pub fn with_trace(mut self, trace: TraceLogger) -> Self {
        self.trace = trace;
        self
    }

    /// Run `program` with `variables` in scope and return its output value.
    pub fn execute(&mut self, program: &Program, variables: Map<String, Value>) -> Result<Value> {
        info!(steps = program.steps.len(), infer = self.config.infer, "executing program");
        let mut env = RunEnvironment::new(variables);
        let result = self.run_steps(&program.steps, &mut env);
        self.shutdown();

        let steps_run = env.steps_run;
        match result {
            Ok(()) => {
                let output = env.into_output(&program.output);
                let rendered =
                    serde_json::to_string_pretty(&output).unwrap_or_else(|_| output.to_string());
                self.ui.print(
                    Tone::Browser,
                    &format!("Program finished and returned a value of:\n{}\n", rendered),
                );
                Ok(output)
            }
            Err(e) => {
                warn!(steps_run, error = %e, "program failed");
                Err(e)
            }
        }
    }

    /// Quit the browser, stop the display and kill helper processes.
    pub fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.driver.quit() {
            warn!(error = %e, "browser quit failed");
        }
        if let Some(mut display) = self.display.take() {
            display.stop();
        }
        let killed = kill_helper_processes(&self.config.helper_processes);
        debug!(killed, "teardown complete");
    }

    pub fn custom_functions(&self) -> &ExampleAccumulator {
        &self.functions
    }

    pub fn into_custom_functions(mut self) -> ExampleAccumulator {
        std::mem::take(&mut self.functions)
    }

    pub fn trace(&self) -> &TraceLogger {
        &self.trace
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub(crate) fn focus(&mut self, window: &WindowHandle) -> Result<()> {
        if &self.driver.current_window()? != window {
            self.driver.switch_to_window(window)?;
        }
        Ok(())
    }

    pub(crate) fn stamp(&mut self) -> Result<u64> {
        self.sessions.stamp(self.driver.as_mut())
    }

    /// Stamp the page and (re)inject the highlighter. The script guards
    /// against double installation, so injecting on an unchanged page is a no-op.
    pub(crate) fn stamp_and_inject(&mut self) -> Result<()> {
        self.stamp()?;
        highlights::inject(self.driver.as_mut())
    }

    pub(crate) fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }

    /// Run a browser operation up to `retries` times with a fixed backoff.
    /// Returns whether any attempt succeeded.
    pub(crate) fn with_retries<F>(&mut self, label: &str, mut op: F) -> bool
    where
        F: FnMut(&mut dyn BrowserDriver) -> Result<()>,
    {
        let attempts = self.config.retries.max(1);
        for attempt in 1..=attempts {
            match op(self.driver.as_mut()) {
                Ok(()) => return true,
                Err(e) => {
                    warn!(action = label, attempt, error = %e, "browser interaction failed");
                    if attempt < attempts {
                        self.pause(self.config.retry_backoff);
                    }
                }
            }
        }
        false
    }

    /// Cleaned page for example storage.
    pub fn get_scrape_html(&mut self) -> Result<String> {
        let source = self.driver.page_source()?;
        let url = self.driver.current_url()?;
        Ok(sanitize::scrape_html(&source, &url))
    }

    /// Cleaned page restricted to rendered elements, for the remote identifier.
    pub fn get_visible_html(&mut self) -> Result<String> {
        let visible: HashSet<NodeId> = self.visible_node_ids()?.into_iter().collect();
        let source = self.driver.page_source()?;
        let url = self.driver.current_url()?;
        sanitize::visible_html(&source, &url, &visible)
    }

    pub(crate) fn visible_node_ids(&mut self) -> Result<Vec<NodeId>> {
        let raw = self.driver.execute_script(VISIBLE_IDS_SCRIPT, &[])?;
        Ok(highlights::node_ids_from(&raw))
    }

    /// Fold a new observation into the accumulator, flagging re-recorded
    /// call sites so their old examples get replaced.
    pub(crate) fn record(&mut self, call_id: CallId, mut function: CustomFunction) {
        if self
            .replay
            .as_ref()
            .is_some_and(|r| r.is_rerecorded(call_id))
        {
            function.replace_examples = true;
        }
        debug!(%call_id, action = function.name.as_str(), "recorded example");
        self.functions.add_example(call_id, function);
    }

    pub(crate) fn log_event(&mut self, event: RunEvent) {
        if event.success == Some(false) {
            self.trace.warn_interaction_failed(&event);
        }
        self.trace.log(event);
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
