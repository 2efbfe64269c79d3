use std::path::Path;
use std::process::{Child, Command, Stdio};

use sysinfo::{ProcessesToUpdate, System};
use tracing::{debug, warn};

use crate::engine::error::{ParsagonError, Result};

/// Kill every process whose name matches one of `names`.
///
/// Browser automation helpers tend to outlive the session that spawned them.
/// Returns how many processes were signalled.
pub fn kill_helper_processes(names: &[String]) -> usize {
    if names.is_empty() {
        return 0;
    }
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::All, true);

    let mut killed = 0;
    for (pid, process) in sys.processes() {
        let name = process.name().to_string_lossy();
        if names.iter().any(|n| name == n.as_str()) && process.kill() {
            debug!(%pid, %name, "killed helper process");
            killed += 1;
        }
    }
    killed
}

/// Xvfb server the browser renders into when running headless.
pub struct VirtualDisplay {
    child: Child,
    display: String,
}

impl VirtualDisplay {
    /// Start Xvfb on the first free display number at or above :99.
    pub fn start(width: u32, height: u32) -> Result<Self> {
        let number = (99..200)
            .find(|n| !Path::new(&format!("/tmp/.X{}-lock", n)).exists())
            .ok_or_else(|| ParsagonError::Config("No free X display number".into()))?;
        let display = format!(":{}", number);

        let child = Command::new("Xvfb")
            .arg(&display)
            .arg("-screen")
            .arg("0")
            .arg(format!("{}x{}x24", width, height))
            .arg("-nolisten")
            .arg("tcp")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ParsagonError::SubprocessSpawn {
                script: "Xvfb".into(),
                source: e,
            })?;

        let display_name = display.as_str();
        debug!(display = %display_name, width, height, "virtual display started");
        Ok(VirtualDisplay { child, display })
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn stop(&mut self) {
        if let Ok(Some(_)) = self.child.try_wait() {
            return;
        }
        if let Err(e) = self.child.kill() {
            warn!(display = %self.display, error = %e, "failed to stop virtual display");
        }
        let _ = self.child.wait();
    }
}

impl Drop for VirtualDisplay {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Parse a `WIDTHxHEIGHT` size string.
pub fn parse_display_size(raw: &str) -> Option<(u32, u32)> {
    let (w, h) = raw.trim().split_once(['x', 'X'])?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}
