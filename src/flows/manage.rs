use std::path::Path;

use crate::cli::config::{load_settings, save_settings};
use crate::engine::error::{ParsagonError, Result};
use crate::flows::{FlowContext, FlowOutcome};
use crate::interaction::{Tone, UserInteraction};

pub fn delete_program(ctx: &FlowContext, program_name: &str, yes: bool) -> Result<FlowOutcome> {
    if !yes
        && !ctx.ui.confirm(&format!(
            "Are you sure you want to delete program with name {}?",
            program_name
        ))?
    {
        ctx.say("Cancelled operation.");
        return Ok(FlowOutcome::Cancelled {
            feedback: String::new(),
        });
    }
    let pipeline = ctx.store.get_pipeline(program_name)?;
    ctx.store.delete_pipeline(pipeline.id)?;
    ctx.say(&format!("Deleted program {}.", program_name));
    Ok(FlowOutcome::Done)
}

/// Show one program, or list all of them.
pub fn detail_program(ctx: &FlowContext, program_name: Option<&str>) -> Result<FlowOutcome> {
    let pipelines = match program_name {
        Some(name) => vec![ctx.store.get_pipeline(name)?],
        None => ctx.store.get_pipelines()?,
    };
    if pipelines.is_empty() {
        ctx.say("No programs found.");
    }
    for pipeline in pipelines {
        let mut text = format!("Program: {}", pipeline.name);
        if let Some(description) = pipeline.description.as_deref().filter(|d| !d.is_empty()) {
            text.push_str(&format!("\nDescription: {}", description));
        }
        if let Some(pseudocode) = pipeline.pseudocode.as_deref().filter(|p| !p.is_empty()) {
            text.push_str(&format!("\nSteps:\n{}", pseudocode));
        }
        ctx.ui.print(Tone::Normal, &format!("{}\n", text));
    }
    Ok(FlowOutcome::Done)
}

/// Ask for an API key and store it in the settings file.
pub fn setup(ui: &dyn UserInteraction, settings_path: &Path) -> Result<FlowOutcome> {
    let key = ui.ask("Please enter your API key:")?;
    let key = key.trim();
    if key.is_empty() {
        return Err(ParsagonError::InvalidArguments("No API key entered".into()));
    }
    let mut settings = load_settings(settings_path);
    settings.api_key = Some(key.to_string());
    save_settings(settings_path, &settings)?;
    ui.print(
        Tone::Assistant,
        &format!("Saved API key to {}", settings_path.display()),
    );
    Ok(FlowOutcome::Done)
}
