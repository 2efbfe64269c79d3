use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::browser::cleanup::parse_display_size;
use crate::browser::session::DriverLaunch;
use crate::engine::error::{ParsagonError, Result};
use crate::engine::executor::ExecutorConfig;

// ============================================================================
// CLI Argument Parsing (clap derive)
// ============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "parsagon",
    version,
    about = "Turn a web task into a replayable scraping program"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config file (default: parsagon.yaml in current dir)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Append one JSON line per executed action to this file
    #[arg(long, global = true)]
    pub trace: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a program from a task description
    Create {
        /// What the program should do
        task: String,

        /// Run the browser without a visible window
        #[arg(long)]
        headless: bool,

        /// Let the assistant find elements instead of asking you
        #[arg(long)]
        infer: bool,
    },

    /// Change an existing program
    Update {
        /// Name of the program
        program: String,

        /// How the program should change
        task: String,

        /// JSON object of variables for the program
        #[arg(long)]
        variables: Option<String>,

        #[arg(long)]
        headless: bool,

        #[arg(long)]
        infer: bool,
    },

    /// Run a saved program
    Run {
        /// Name of the program
        program: String,

        /// JSON object of variables for the program
        #[arg(long)]
        variables: Option<String>,

        #[arg(long)]
        headless: bool,

        /// Run on the Parsagon servers instead of this machine
        #[arg(long)]
        remote: bool,

        /// Return status, log and warnings along with the output
        #[arg(long)]
        output_log: bool,
    },

    /// Delete a program
    Delete {
        program: String,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Show one program, or list all of them
    Detail { program: Option<String> },

    /// Store your API key
    Setup,
}

// ============================================================================
// Config File Model (optional YAML)
// ============================================================================

/// Optional YAML config file: `parsagon.yaml`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_base")]
    pub base: String,

    pub key: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base: default_api_base(),
            key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_driver_command")]
    pub driver_command: String,

    #[serde(default = "default_driver_script")]
    pub driver_script: String,

    #[serde(default = "default_retries")]
    pub retries: u32,

    #[serde(default = "default_two_seconds")]
    pub retry_backoff_ms: u64,

    #[serde(default = "default_two_seconds")]
    pub settle_ms: u64,

    #[serde(default = "default_two_seconds")]
    pub load_wait_ms: u64,

    /// Render headless runs into an Xvfb display
    #[serde(default = "default_true")]
    pub virtual_display: bool,

    #[serde(default = "default_display_size")]
    pub display_size: String,

    #[serde(default = "default_helper_processes")]
    pub helper_processes: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            driver_command: default_driver_command(),
            driver_script: default_driver_script(),
            retries: default_retries(),
            retry_backoff_ms: default_two_seconds(),
            settle_ms: default_two_seconds(),
            load_wait_ms: default_two_seconds(),
            virtual_display: true,
            display_size: default_display_size(),
            helper_processes: default_helper_processes(),
        }
    }
}

impl BrowserConfig {
    pub fn executor_config(&self, infer: bool) -> ExecutorConfig {
        ExecutorConfig {
            infer,
            retries: self.retries,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            settle: Duration::from_millis(self.settle_ms),
            load_wait: Duration::from_millis(self.load_wait_ms),
            helper_processes: self.helper_processes.clone(),
        }
    }

    pub fn driver_launch(&self, headless: bool) -> DriverLaunch {
        DriverLaunch {
            command: self.driver_command.clone(),
            script: self.driver_script.clone(),
            headless,
            display: None,
        }
    }

    /// Size of the virtual display to start, if one is wanted.
    pub fn display_size(&self, headless: bool) -> Option<(u32, u32)> {
        if !(headless && self.virtual_display && cfg!(target_os = "linux")) {
            return None;
        }
        parse_display_size(&self.display_size)
    }
}

// Serde default helpers
fn default_api_base() -> String { "https://parsagon.io".to_string() }
fn default_driver_command() -> String { "node".to_string() }
fn default_driver_script() -> String { "driver/browser_server.js".to_string() }
fn default_retries() -> u32 { 3 }
fn default_two_seconds() -> u64 { 2000 }
fn default_true() -> bool { true }
fn default_display_size() -> String { "1280x1050".to_string() }
fn default_helper_processes() -> Vec<String> { vec!["chromedriver".to_string()] }

// ============================================================================
// Config File Loading
// ============================================================================

/// Load config from a YAML file. Returns defaults if file is missing or malformed.
pub fn load_config(path: Option<&str>) -> AppConfig {
    let config_path = path.unwrap_or("parsagon.yaml");
    match std::fs::read_to_string(config_path) {
        Ok(content) => serde_yaml::from_str(&content).unwrap_or_default(),
        Err(_) => AppConfig::default(),
    }
}

/// Apply `API_BASE` and `PARSAGON_API_KEY` on top of the file config.
pub fn apply_env_overrides(
    mut config: AppConfig,
    api_base: Option<String>,
    api_key: Option<String>,
) -> AppConfig {
    if let Some(base) = api_base.filter(|b| !b.trim().is_empty()) {
        config.api.base = base;
    }
    if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
        config.api.key = Some(key);
    }
    config
}

// ============================================================================
// Stored Credentials
// ============================================================================

/// Written by `parsagon setup`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    pub api_key: Option<String>,
}

/// `<config dir>/parsagon/settings.yaml`
pub fn settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("parsagon").join("settings.yaml"))
}

pub fn load_settings(path: &Path) -> Settings {
    match std::fs::read_to_string(path) {
        Ok(content) => serde_yaml::from_str(&content).unwrap_or_default(),
        Err(_) => Settings::default(),
    }
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let yaml = serde_yaml::to_string(settings)
        .map_err(|e| ParsagonError::Config(format!("Could not encode settings: {}", e)))?;
    std::fs::write(path, yaml)?;
    Ok(())
}

/// Environment and config file come first, then the stored settings.
pub fn resolve_api_key(config: &AppConfig, settings: &Settings) -> Result<String> {
    config
        .api
        .key
        .clone()
        .or_else(|| settings.api_key.clone())
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| {
            ParsagonError::Config(
                "No API key found. Run `parsagon setup` or set PARSAGON_API_KEY.".into(),
            )
        })
}

/// Parse `--variables` into a JSON object.
pub fn parse_variables(raw: Option<&str>) -> Result<Map<String, Value>> {
    let Some(raw) = raw else {
        return Ok(Map::new());
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ParsagonError::InvalidArguments(
            "Variables must be a JSON object".into(),
        )),
        Err(e) => Err(ParsagonError::InvalidArguments(format!(
            "Variables are not valid JSON: {}",
            e
        ))),
    }
}
