use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::api::client::HttpBackend;
use crate::cli::config::{
    AppConfig, Cli, Commands, load_settings, parse_variables, resolve_api_key, settings_path,
};
use crate::engine::error::{ParsagonError, Result};
use crate::flows::create::create_program;
use crate::flows::manage::{delete_program, detail_program, setup};
use crate::flows::run::{RunOptions, run_program};
use crate::flows::update::{UpdateOptions, update_program};
use crate::flows::{FlowContext, FlowOutcome, ProcessLauncher};
use crate::interaction::UserInteraction;
use crate::interaction::terminal::TerminalInteraction;

const REMOTE_POLL_INTERVAL: Duration = Duration::from_secs(5);

// ============================================================================
// Context construction
// ============================================================================

/// Wire the HTTP backend, the terminal and the driver launcher together.
pub fn build_context(
    config: &AppConfig,
    ui: Arc<dyn UserInteraction>,
    verbose: u8,
    trace: Option<&str>,
) -> Result<FlowContext> {
    let settings = settings_path()
        .map(|path| load_settings(&path))
        .unwrap_or_default();
    let api_key = resolve_api_key(config, &settings)?;
    let backend = Arc::new(HttpBackend::new(&config.api.base, &api_key)?);
    debug!(base = %config.api.base, "using backend");

    let launcher = ProcessLauncher {
        browser: config.browser.clone(),
        assist: backend.clone(),
        ui: Arc::clone(&ui),
        trace_path: trace.map(PathBuf::from),
    };

    Ok(FlowContext {
        assist: backend.clone(),
        store: backend,
        ui,
        launcher: Box::new(launcher),
        poll_interval: REMOTE_POLL_INTERVAL,
        verbose: verbose > 0,
    })
}

// ============================================================================
// Dispatch
// ============================================================================

/// Run one subcommand. `Some(value)` is program output for stdout.
pub fn dispatch(cli: Cli, config: &AppConfig) -> Result<Option<Value>> {
    let ui: Arc<dyn UserInteraction> = Arc::new(TerminalInteraction::new());

    if let Commands::Setup = cli.command {
        let path = settings_path().ok_or_else(|| {
            ParsagonError::Config("Could not locate a configuration directory".into())
        })?;
        setup(ui.as_ref(), &path)?;
        return Ok(None);
    }

    let ctx = build_context(config, ui, cli.verbose, cli.trace.as_deref())?;
    let outcome = match cli.command {
        Commands::Create {
            task,
            headless,
            infer,
        } => create_program(&ctx, &task, headless, infer)?,
        Commands::Update {
            program,
            task,
            variables,
            headless,
            infer,
        } => update_program(
            &ctx,
            &program,
            &task,
            UpdateOptions {
                variables: parse_variables(variables.as_deref())?,
                headless,
                infer,
            },
        )?,
        Commands::Run {
            program,
            variables,
            headless,
            remote,
            output_log,
        } => run_program(
            &ctx,
            &program,
            RunOptions {
                variables: parse_variables(variables.as_deref())?,
                headless,
                remote,
                output_log,
            },
        )?,
        Commands::Delete { program, yes } => delete_program(&ctx, &program, yes)?,
        Commands::Detail { program } => detail_program(&ctx, program.as_deref())?,
        Commands::Setup => FlowOutcome::Done,
    };

    Ok(match outcome {
        FlowOutcome::Output(value) => Some(value),
        FlowOutcome::Failed(message) => return Err(ParsagonError::RunFailed(message)),
        _ => None,
    })
}
