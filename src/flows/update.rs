use std::collections::HashSet;

use serde_json::{Map, Value, json};
use tracing::warn;

use crate::api::models::ProgramSketches;
use crate::engine::custom_function::{CallId, ExampleAccumulator};
use crate::engine::error::Result;
use crate::engine::replay::{ReplayAdapter, ReplayPolicy};
use crate::flows::{FlowContext, FlowOutcome};

/// Options of an update run.
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    pub variables: Map<String, Value>,
    pub headless: bool,
    pub infer: bool,
}

/// Edit the saved program `program_name` according to `task`.
///
/// Call sites with a saved implementation replay unless the operator chooses
/// to re-record them.
pub fn update_program(
    ctx: &FlowContext,
    program_name: &str,
    task: &str,
    options: UpdateOptions,
) -> Result<FlowOutcome> {
    let pipeline = ctx.store.get_pipeline(program_name)?;
    let parts = ctx.store.get_pipeline_code_parts(pipeline.id)?;
    let sketches = ctx.assist.edit_program_sketch(&parts.program_sketch, task)?;
    ctx.say(&format!(
        "Edited the program to do the following:\n\n{}\n",
        sketches.pseudocode
    ));
    if !ctx.ui.confirm("Confirm the program does what you want")? {
        let feedback = ctx.ui.ask("What do you want the program to do differently?")?;
        return Ok(FlowOutcome::Cancelled { feedback });
    }

    ctx.say("Now executing the program to identify web elements to be scraped:");
    let saved: HashSet<CallId> = parts.custom_functions.iter().map(|f| f.call_id).collect();
    let replay = ReplayAdapter::from_saved_functions(ReplayPolicy::Ask, &parts.custom_functions);
    let mut executor = ctx
        .launcher
        .launch(options.headless, options.infer)?
        .with_replay(replay);
    executor.execute(&sketches.abridged, options.variables)?;
    let functions = executor.into_custom_functions();

    loop {
        let typed = ctx.ui.ask(&format!(
            "Type \"{}\" to update this program, or press enter without typing a name to CANCEL:",
            program_name
        ))?;
        let typed = typed.trim();
        if typed.is_empty() {
            ctx.say("Discarded edits.");
            return Ok(FlowOutcome::Discarded);
        }
        if typed == program_name {
            break;
        }
    }

    let pushed = push_functions(ctx, pipeline.id, &functions, &saved, &sketches);

    match pushed {
        Ok(()) => {
            ctx.say("Saved.");
            Ok(FlowOutcome::Saved {
                program_name: program_name.to_string(),
            })
        }
        Err(e) => {
            warn!(pipeline = pipeline.id, error = %e, "updating program failed");
            let message =
                "An error occurred while saving the program. The program was not updated.";
            ctx.say(message);
            Ok(FlowOutcome::Failed(message.to_string()))
        }
    }
}

/// Add examples to call sites the pipeline already has, create the rest,
/// then store the edited sketch.
fn push_functions(
    ctx: &FlowContext,
    pipeline_id: u64,
    functions: &ExampleAccumulator,
    saved: &HashSet<CallId>,
    sketches: &ProgramSketches,
) -> Result<()> {
    for (call_id, function) in functions.iter() {
        ctx.announce_save(function);
        if saved.contains(call_id) {
            ctx.store.add_examples_to_custom_function(
                pipeline_id,
                *call_id,
                function,
                function.replace_examples,
            )?;
        } else {
            ctx.store
                .create_custom_function(pipeline_id, *call_id, function)?;
        }
    }
    ctx.say("Finalizing program...");
    ctx.store.update_pipeline(
        pipeline_id,
        &json!({
            "program_sketch": sketches.full,
            "abridged_sketch": sketches.abridged,
            "pseudocode": sketches.pseudocode,
        }),
    )
}
