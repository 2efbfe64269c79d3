use std::io::{BufRead, BufReader, Write};
use std::process::{Child, Command, Stdio};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::browser::driver::BrowserDriver;
use crate::browser::resolution::{Locator, NodeId, WindowHandle};
use crate::engine::error::{ParsagonError, Result};

/// Request sent to browser_server.js over stdin (one JSON line).
#[derive(Debug, Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum BrowserRequest {
    WindowHandles,
    CurrentWindow,
    SwitchWindow { handle: WindowHandle },
    NewTab,
    CloseWindow,
    Navigate { url: String },
    CurrentUrl,
    PageSource,
    ExecuteScript { script: String, args: Vec<Value> },
    Click { node: NodeId },
    TypeText { node: NodeId, text: String, enter: bool },
    SelectOption { node: NodeId, label: String },
    PressKey { key: String },
    ElementText { node: NodeId },
    FindNodeIds { locator: Locator },
    Quit,
}

impl BrowserRequest {
    pub fn name(&self) -> &'static str {
        match self {
            BrowserRequest::WindowHandles => "window_handles",
            BrowserRequest::CurrentWindow => "current_window",
            BrowserRequest::SwitchWindow { .. } => "switch_window",
            BrowserRequest::NewTab => "new_tab",
            BrowserRequest::CloseWindow => "close_window",
            BrowserRequest::Navigate { .. } => "navigate",
            BrowserRequest::CurrentUrl => "current_url",
            BrowserRequest::PageSource => "page_source",
            BrowserRequest::ExecuteScript { .. } => "execute_script",
            BrowserRequest::Click { .. } => "click",
            BrowserRequest::TypeText { .. } => "type_text",
            BrowserRequest::SelectOption { .. } => "select_option",
            BrowserRequest::PressKey { .. } => "press_key",
            BrowserRequest::ElementText { .. } => "element_text",
            BrowserRequest::FindNodeIds { .. } => "find_node_ids",
            BrowserRequest::Quit => "quit",
        }
    }
}

/// Response received from browser_server.js over stdout (one JSON line).
#[derive(Debug, Deserialize)]
pub struct BrowserResponse {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub ready: Option<bool>,
}

/// How to start the driver process.
#[derive(Debug, Clone)]
pub struct DriverLaunch {
    pub command: String,
    pub script: String,
    pub headless: bool,
    /// X display for the browser, set when a virtual display is running.
    pub display: Option<String>,
}

/// A persistent browser session backed by browser_server.js.
///
/// Launches a long-lived Node.js process that keeps a Chrome session open.
/// Commands are sent as NDJSON over stdin, responses read from stdout.
pub struct BrowserSession {
    child: Child,
    stdin: std::process::ChildStdin,
    reader: BufReader<std::process::ChildStdout>,
    closed: bool,
}

impl BrowserSession {
    /// Spawn the driver process and wait for its ready line.
    pub fn launch(launch: &DriverLaunch) -> Result<Self> {
        let mut command = Command::new(&launch.command);
        command
            .arg(&launch.script)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        if launch.headless {
            command.env("PSGN_HEADLESS", "1");
        }
        if let Some(display) = &launch.display {
            command.env("DISPLAY", display);
        }

        let mut child = command.spawn().map_err(|e| ParsagonError::SubprocessSpawn {
            script: launch.script.clone(),
            source: e,
        })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            ParsagonError::SessionIO("Failed to capture stdin of browser_server.js".into())
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            ParsagonError::SessionIO("Failed to capture stdout of browser_server.js".into())
        })?;
        let mut reader = BufReader::new(stdout);

        let mut line = String::new();
        reader
            .read_line(&mut line)
            .map_err(|e| ParsagonError::SessionIO(format!("Failed to read ready signal: {}", e)))?;

        let response: BrowserResponse =
            serde_json::from_str(line.trim()).map_err(|e| ParsagonError::JsonParse {
                context: "browser_server.js ready signal".into(),
                source: e,
            })?;

        if !response.ok || response.ready != Some(true) {
            return Err(ParsagonError::SessionProtocol {
                command: "launch".into(),
                error: response
                    .error
                    .unwrap_or_else(|| "Did not receive ready signal from browser_server.js".into()),
            });
        }

        debug!(script = %launch.script, headless = launch.headless, "browser session ready");
        Ok(BrowserSession {
            child,
            stdin,
            reader,
            closed: false,
        })
    }

    /// Send a request and read the response.
    fn send(&mut self, request: &BrowserRequest) -> Result<BrowserResponse> {
        let json = serde_json::to_string(request).map_err(|e| ParsagonError::JsonSerialize {
            context: "BrowserRequest".into(),
            source: e,
        })?;

        writeln!(self.stdin, "{}", json).map_err(|e| {
            ParsagonError::SessionIO(format!("Failed to write to browser_server.js stdin: {}", e))
        })?;
        self.stdin.flush().map_err(|e| {
            ParsagonError::SessionIO(format!("Failed to flush browser_server.js stdin: {}", e))
        })?;

        let mut line = String::new();
        self.reader.read_line(&mut line).map_err(|e| {
            ParsagonError::SessionIO(format!("Failed to read from browser_server.js stdout: {}", e))
        })?;

        if line.trim().is_empty() {
            return Err(ParsagonError::SessionIO(
                "Empty response from browser_server.js (process may have died)".into(),
            ));
        }

        serde_json::from_str(line.trim()).map_err(|e| ParsagonError::JsonParse {
            context: "browser_server.js response".into(),
            source: e,
        })
    }

    /// Send a request and return its payload, failing on `ok: false`.
    fn call(&mut self, request: BrowserRequest) -> Result<Value> {
        let response = self.send(&request)?;
        if !response.ok {
            return Err(ParsagonError::SessionProtocol {
                command: request.name().into(),
                error: response.error.unwrap_or_else(|| "Unknown error".into()),
            });
        }
        Ok(response.data.unwrap_or(Value::Null))
    }

    fn call_as<T: serde::de::DeserializeOwned>(&mut self, request: BrowserRequest) -> Result<T> {
        let name = request.name();
        let data = self.call(request)?;
        serde_json::from_value(data).map_err(|e| ParsagonError::JsonParse {
            context: format!("{} response", name),
            source: e,
        })
    }
}

impl BrowserDriver for BrowserSession {
    fn window_handles(&mut self) -> Result<Vec<WindowHandle>> {
        self.call_as(BrowserRequest::WindowHandles)
    }

    fn current_window(&mut self) -> Result<WindowHandle> {
        self.call_as(BrowserRequest::CurrentWindow)
    }

    fn switch_to_window(&mut self, handle: &WindowHandle) -> Result<()> {
        self.call(BrowserRequest::SwitchWindow {
            handle: handle.clone(),
        })?;
        Ok(())
    }

    fn new_tab(&mut self) -> Result<WindowHandle> {
        self.call_as(BrowserRequest::NewTab)
    }

    fn close_current_window(&mut self) -> Result<()> {
        self.call(BrowserRequest::CloseWindow)?;
        Ok(())
    }

    fn navigate(&mut self, url: &str) -> Result<()> {
        self.call(BrowserRequest::Navigate {
            url: url.to_string(),
        })?;
        Ok(())
    }

    fn current_url(&mut self) -> Result<String> {
        self.call_as(BrowserRequest::CurrentUrl)
    }

    fn page_source(&mut self) -> Result<String> {
        self.call_as(BrowserRequest::PageSource)
    }

    fn execute_script(&mut self, script: &str, args: &[Value]) -> Result<Value> {
        self.call(BrowserRequest::ExecuteScript {
            script: script.to_string(),
            args: args.to_vec(),
        })
    }

    fn click(&mut self, node: NodeId) -> Result<()> {
        self.call(BrowserRequest::Click { node })?;
        Ok(())
    }

    fn type_text(&mut self, node: NodeId, text: &str, enter: bool) -> Result<()> {
        self.call(BrowserRequest::TypeText {
            node,
            text: text.to_string(),
            enter,
        })?;
        Ok(())
    }

    fn select_option(&mut self, node: NodeId, label: &str) -> Result<()> {
        self.call(BrowserRequest::SelectOption {
            node,
            label: label.to_string(),
        })?;
        Ok(())
    }

    fn press_key(&mut self, key: &str) -> Result<()> {
        self.call(BrowserRequest::PressKey {
            key: key.to_string(),
        })?;
        Ok(())
    }

    fn element_text(&mut self, node: NodeId) -> Result<String> {
        self.call_as(BrowserRequest::ElementText { node })
    }

    fn find_node_ids(&mut self, locator: &Locator) -> Result<Vec<NodeId>> {
        let raw: Vec<Value> = self.call_as(BrowserRequest::FindNodeIds {
            locator: locator.clone(),
        })?;
        Ok(raw.iter().filter_map(NodeId::from_json).collect())
    }

    fn quit(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        // Best-effort quit, the process may already be gone
        if let Err(e) = self.send(&BrowserRequest::Quit) {
            warn!(error = %e, "browser_server.js did not acknowledge quit");
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
        Ok(())
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        let _ = self.quit();
    }
}
