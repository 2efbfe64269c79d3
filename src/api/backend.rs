use serde_json::{Map, Value};

use crate::api::models::{
    CleanedData, ElementKind, NewPipeline, Pipeline, PipelineCode, PipelineCodeParts,
    PipelineRun, ProgramSketches, QuestionKind, RunUpdate, ScrapeResult,
};
use crate::browser::resolution::NodeId;
use crate::engine::custom_function::{CallId, CustomFunction};
use crate::engine::error::Result;
use crate::engine::program::Program;

/// Remote calls the execution engine makes while a program runs.
pub trait AssistBackend: Send + Sync {
    fn get_program_sketches(&self, description: &str) -> Result<ProgramSketches>;

    fn edit_program_sketch(&self, sketch: &Program, description: &str) -> Result<ProgramSketches>;

    /// Id of the element in `visible_html` best matching `description`.
    fn get_interaction_element_id(
        &self,
        visible_html: &str,
        kind: ElementKind,
        description: &str,
    ) -> Result<Option<NodeId>>;

    /// Field name to field type. Nested schemas map to non-string values.
    fn get_schema_fields(&self, schema: &Value) -> Result<Map<String, Value>>;

    fn get_cleaned_data(&self, html: &str, schema: &Value, nodes: &Value) -> Result<CleanedData>;

    fn scrape_page(&self, html: &str, schema: &Value, relevant: &[NodeId]) -> Result<ScrapeResult>;

    fn ask_about_data(&self, kind: QuestionKind, data: &Value, question: &str) -> Result<Value>;
}

/// Pipeline persistence and run bookkeeping.
pub trait PipelineStore: Send + Sync {
    fn create_pipeline(&self, pipeline: &NewPipeline<'_>) -> Result<Pipeline>;

    fn delete_pipeline(&self, pipeline_id: u64) -> Result<()>;

    fn update_pipeline(&self, pipeline_id: u64, patch: &Value) -> Result<()>;

    fn create_custom_function(
        &self,
        pipeline_id: u64,
        call_id: CallId,
        function: &CustomFunction,
    ) -> Result<()>;

    fn add_examples_to_custom_function(
        &self,
        pipeline_id: u64,
        call_id: CallId,
        function: &CustomFunction,
        remove_old_examples: bool,
    ) -> Result<()>;

    /// Fails with `ProgramNotFound` when no pipeline has this name.
    fn get_pipeline(&self, name: &str) -> Result<Pipeline>;

    fn get_pipelines(&self) -> Result<Vec<Pipeline>>;

    fn get_pipeline_code(&self, name: &str, variables: &Value, headless: bool)
    -> Result<PipelineCode>;

    fn get_pipeline_code_parts(&self, pipeline_id: u64) -> Result<PipelineCodeParts>;

    fn create_pipeline_run(
        &self,
        pipeline_id: u64,
        variables: &Value,
        is_local: bool,
    ) -> Result<PipelineRun>;

    fn update_pipeline_run(&self, run_id: u64, update: &RunUpdate) -> Result<PipelineRun>;

    fn get_run(&self, run_id: u64) -> Result<PipelineRun>;
}
