use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::api::models::{NewPipeline, Pipeline};
use crate::engine::custom_function::ExampleAccumulator;
use crate::engine::error::{ParsagonError, Result};
use crate::flows::{FlowContext, FlowOutcome};
use crate::secrets::extract_secrets;

/// Turn `task` into a program, demonstrate it, and save it under a name.
pub fn create_program(
    ctx: &FlowContext,
    task: &str,
    headless: bool,
    infer: bool,
) -> Result<FlowOutcome> {
    ctx.say("Creating a program based on your specifications...");
    let (task, secrets) = extract_secrets(task);
    let sketches = ctx.assist.get_program_sketches(&task)?;
    ctx.say(&format!(
        "Here's what the program does:\n\nSummary: {}\n\nSteps:\n\n{}\n",
        task, sketches.pseudocode
    ));

    loop {
        let approval = ctx.ui.ask("Confirm the program does what you want (Y/n):")?;
        match approval.trim() {
            "Y" | "y" | "" => break,
            "n" | "N" => {
                let feedback = ctx.ui.ask("What do you want the program to do differently?")?;
                return Ok(FlowOutcome::Cancelled { feedback });
            }
            _ => continue,
        }
    }

    ctx.say("Now executing the program to identify web elements to be scraped:");
    let variables: Map<String, Value> = secrets
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    let mut executor = ctx.launcher.launch(headless, infer)?;
    executor.execute(&sketches.abridged, variables)?;
    let functions = executor.into_custom_functions();

    loop {
        let name = ctx.ui.ask(
            "Name this program to save, or press enter without typing a name to DISCARD:",
        )?;
        let name = name.trim();
        if name.is_empty() {
            ctx.say("Discarded program.");
            return Ok(FlowOutcome::Discarded);
        }

        ctx.say(&format!("Saving program as {}", name));
        let pipeline = match ctx.store.create_pipeline(&NewPipeline {
            name,
            description: &task,
            program_sketch: &sketches.full,
            pseudocode: &sketches.pseudocode,
            secrets: &secrets,
        }) {
            Ok(pipeline) => pipeline,
            Err(ParsagonError::PipelineNameTaken(_)) => {
                ctx.say("A program with this name already exists. Please choose another name.");
                continue;
            }
            Err(e) => return Err(e),
        };

        return Ok(save_functions(ctx, &pipeline, &functions));
    }
}

/// Upload every accumulated function; on failure drop the new pipeline.
fn save_functions(
    ctx: &FlowContext,
    pipeline: &Pipeline,
    functions: &ExampleAccumulator,
) -> FlowOutcome {
    ctx.ui.start_progress("Saving functions", functions.len() as u64);
    let mut saved = Ok(());
    for (call_id, function) in functions.iter() {
        ctx.announce_save(function);
        if let Err(e) = ctx.store.create_custom_function(pipeline.id, *call_id, function) {
            saved = Err(e);
            break;
        }
        ctx.ui.advance_progress();
    }
    ctx.ui.finish_progress();

    match saved {
        Ok(()) => {
            info!(pipeline = pipeline.id, functions = functions.len(), "program saved");
            ctx.say("Saved.");
            ctx.say("Done.");
            FlowOutcome::Saved {
                program_name: pipeline.name.clone(),
            }
        }
        Err(e) => {
            warn!(pipeline = pipeline.id, error = %e, "saving functions failed");
            if let Err(delete_err) = ctx.store.delete_pipeline(pipeline.id) {
                warn!(pipeline = pipeline.id, error = %delete_err, "could not delete pipeline");
            }
            let message =
                "An error occurred while saving the program. The program has been discarded.";
            ctx.say(message);
            FlowOutcome::Failed(message.to_string())
        }
    }
}
