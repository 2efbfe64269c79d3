use std::thread;

use serde_json::{Map, Value, json};
use tracing::{info, warn};

use crate::api::models::{PipelineRun, RunStatus, RunUpdate};
use crate::engine::error::{ParsagonError, Result};
use crate::engine::replay::{ReplayAdapter, ReplayPolicy};
use crate::flows::{FlowContext, FlowOutcome};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub variables: Map<String, Value>,
    pub headless: bool,
    pub remote: bool,
    /// Return status, log, warnings and error along with the output
    pub output_log: bool,
}

/// Run a saved program locally or on the backend.
pub fn run_program(
    ctx: &FlowContext,
    program_name: &str,
    options: RunOptions,
) -> Result<FlowOutcome> {
    if options.headless && options.remote {
        return Err(ParsagonError::InvalidArguments(
            "Cannot run a program remotely in headless mode".into(),
        ));
    }

    info!(program = program_name, remote = options.remote, "preparing to run program");
    let pipeline = ctx.store.get_pipeline(program_name)?;
    let variables = Value::Object(options.variables.clone());

    if options.remote {
        let run = ctx.store.create_pipeline_run(pipeline.id, &variables, false)?;
        return poll_remote_run(ctx, run.id, options.output_log);
    }

    let run = ctx.store.create_pipeline_run(pipeline.id, &variables, true)?;
    let code = ctx
        .store
        .get_pipeline_code(program_name, &variables, options.headless)?;
    let start_time = chrono::Utc::now().to_rfc3339();

    ctx.say("Running program...");
    let replay = ReplayAdapter::from_saved_functions(ReplayPolicy::Always, &code.custom_functions);
    let mut executor = ctx.launcher.launch(options.headless, true)?.with_replay(replay);
    let result = executor.execute(&code.program, options.variables);

    let update = RunUpdate {
        start_time,
        end_time: Some(chrono::Utc::now().to_rfc3339()),
        status: Some(if result.is_ok() {
            RunStatus::Finished
        } else {
            RunStatus::Error
        }),
        log: Some(executor.trace().to_log()),
        error: result.as_ref().err().map(|e| e.to_user_string(true)),
        warnings: executor.trace().warnings().to_vec(),
    };
    drop(executor);
    if let Err(e) = ctx.store.update_pipeline_run(run.id, &update) {
        warn!(run = run.id, error = %e, "could not record run result");
    }

    if options.output_log {
        return Ok(FlowOutcome::Output(json!({
            "output": result.as_ref().ok(),
            "status": update.status,
            "log": update.log,
            "warnings": update.warnings,
            "error": update.error,
        })));
    }
    let output = result?;
    ctx.say("Done.");
    Ok(FlowOutcome::Output(output))
}

fn poll_remote_run(ctx: &FlowContext, run_id: u64, output_log: bool) -> Result<FlowOutcome> {
    ctx.say("Program running remotely...");
    loop {
        let run = ctx.store.get_run(run_id)?;
        let status = run.status;

        if output_log && matches!(status, Some(RunStatus::Finished | RunStatus::Error)) {
            return Ok(FlowOutcome::Output(run_summary(&run)));
        }
        match status {
            Some(RunStatus::Finished) => {
                if let Some(log) = &run.log {
                    info!(run = run_id, "{}", log);
                }
                for warning in &run.warnings {
                    warn!(run = run_id, %warning, "run warning");
                }
                ctx.say("Program finished running.");
                return Ok(FlowOutcome::Output(run.output));
            }
            Some(RunStatus::Error) => {
                return Err(ParsagonError::RunFailed(format!(
                    "Program failed to run: {}",
                    run.error.unwrap_or_default()
                )));
            }
            Some(RunStatus::Canceled) => {
                return Err(ParsagonError::RunFailed(
                    "Program execution was canceled".into(),
                ));
            }
            _ => thread::sleep(ctx.poll_interval),
        }
    }
}

fn run_summary(run: &PipelineRun) -> Value {
    json!({
        "output": run.output,
        "status": run.status,
        "log": run.log,
        "warnings": run.warnings,
        "error": run.error,
    })
}
