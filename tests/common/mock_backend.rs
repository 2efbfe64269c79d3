use std::collections::VecDeque;
use std::sync::Mutex;

use serde_json::{Map, Value, json};

use parsagon::api::backend::{AssistBackend, PipelineStore};
use parsagon::api::models::{
    CleanedData, ElementKind, NewPipeline, Pipeline, PipelineCode, PipelineCodeParts,
    PipelineRun, ProgramSketches, QuestionKind, RunUpdate, ScrapeResult,
};
use parsagon::browser::resolution::NodeId;
use parsagon::engine::custom_function::{CallId, CustomFunction};
use parsagon::engine::error::{ParsagonError, Result};
use parsagon::engine::program::Program;

// ============================================================================
// Assist backend
// ============================================================================

/// Canned answers for the remote assistant, plus a log of what was asked.
#[derive(Default)]
pub struct MockAssist {
    pub sketches: Mutex<Option<ProgramSketches>>,
    pub element_ids: Mutex<VecDeque<Option<u64>>>,
    pub schema_fields: Mutex<Map<String, Value>>,
    pub cleaned: Mutex<Value>,
    pub scrape: Mutex<Option<(Value, Value)>>,
    pub answer: Mutex<Value>,
    pub calls: Mutex<Vec<String>>,
    /// Visible HTML sent with each element lookup
    pub visible_html: Mutex<Vec<String>>,
    /// Relevant ids sent with each inferred scrape
    pub relevant: Mutex<Vec<Vec<NodeId>>>,
    /// Nodes sent with each cleaned-data request
    pub cleaned_nodes: Mutex<Vec<Value>>,
}

impl MockAssist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sketches(self, sketches: ProgramSketches) -> Self {
        *self.sketches.lock().unwrap() = Some(sketches);
        self
    }

    pub fn with_element(self, id: Option<u64>) -> Self {
        self.element_ids.lock().unwrap().push_back(id);
        self
    }

    pub fn with_fields(self, fields: Value) -> Self {
        if let Value::Object(map) = fields {
            *self.schema_fields.lock().unwrap() = map;
        }
        self
    }

    pub fn with_cleaned(self, data: Value) -> Self {
        *self.cleaned.lock().unwrap() = data;
        self
    }

    pub fn with_scrape(self, data: Value, nodes: Value) -> Self {
        *self.scrape.lock().unwrap() = Some((data, nodes));
        self
    }

    pub fn with_answer(self, answer: Value) -> Self {
        *self.answer.lock().unwrap() = answer;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn note(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }
}

impl AssistBackend for MockAssist {
    fn get_program_sketches(&self, description: &str) -> Result<ProgramSketches> {
        self.note(&format!("get_program_sketches {}", description));
        self.sketches
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ParsagonError::Api {
                status: 400,
                message: "no sketch".into(),
            })
    }

    fn edit_program_sketch(&self, _sketch: &Program, description: &str) -> Result<ProgramSketches> {
        self.note(&format!("edit_program_sketch {}", description));
        self.sketches
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ParsagonError::Api {
                status: 400,
                message: "no sketch".into(),
            })
    }

    fn get_interaction_element_id(
        &self,
        visible_html: &str,
        kind: ElementKind,
        description: &str,
    ) -> Result<Option<NodeId>> {
        self.note(&format!("get_interaction_element_id {} {}", kind.as_str(), description));
        self.visible_html.lock().unwrap().push(visible_html.to_string());
        Ok(self
            .element_ids
            .lock()
            .unwrap()
            .pop_front()
            .flatten()
            .map(NodeId))
    }

    fn get_schema_fields(&self, _schema: &Value) -> Result<Map<String, Value>> {
        self.note("get_schema_fields");
        Ok(self.schema_fields.lock().unwrap().clone())
    }

    fn get_cleaned_data(&self, _html: &str, _schema: &Value, nodes: &Value) -> Result<CleanedData> {
        self.note("get_cleaned_data");
        self.cleaned_nodes.lock().unwrap().push(nodes.clone());
        Ok(CleanedData {
            data: self.cleaned.lock().unwrap().clone(),
        })
    }

    fn scrape_page(&self, _html: &str, _schema: &Value, relevant: &[NodeId]) -> Result<ScrapeResult> {
        self.note("scrape_page");
        self.relevant.lock().unwrap().push(relevant.to_vec());
        let (data, nodes) = self
            .scrape
            .lock()
            .unwrap()
            .clone()
            .unwrap_or((Value::Null, Value::Null));
        Ok(ScrapeResult { data, nodes })
    }

    fn ask_about_data(&self, kind: QuestionKind, _data: &Value, question: &str) -> Result<Value> {
        self.note(&format!("{} {}", kind.endpoint(), question));
        Ok(self.answer.lock().unwrap().clone())
    }
}

// ============================================================================
// Pipeline store
// ============================================================================

/// In-memory pipeline store.
#[derive(Default)]
pub struct MockStore {
    pub pipelines: Mutex<Vec<Pipeline>>,
    pub taken_names: Mutex<Vec<String>>,
    pub code: Mutex<Option<PipelineCode>>,
    pub code_parts: Mutex<Option<PipelineCodeParts>>,
    /// Statuses handed out by successive `get_run` calls
    pub run_polls: Mutex<VecDeque<PipelineRun>>,
    pub fail_uploads: Mutex<bool>,
    pub created_functions: Mutex<Vec<(u64, CallId, CustomFunction)>>,
    /// (pipeline, call id, remove old examples)
    pub added_examples: Mutex<Vec<(u64, CallId, bool)>>,
    pub deleted: Mutex<Vec<u64>>,
    pub patches: Mutex<Vec<(u64, Value)>>,
    pub runs_created: Mutex<Vec<(u64, Value, bool)>>,
    pub run_updates: Mutex<Vec<(u64, RunUpdate)>>,
    pub new_pipelines: Mutex<Vec<Value>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pipeline(self, id: u64, name: &str) -> Self {
        self.pipelines.lock().unwrap().push(Pipeline {
            id,
            name: name.to_string(),
            description: Some(format!("{} description", name)),
            pseudocode: Some("1. Go to the page".into()),
        });
        self
    }

    pub fn with_taken_name(self, name: &str) -> Self {
        self.taken_names.lock().unwrap().push(name.to_string());
        self
    }

    pub fn with_code(self, code: PipelineCode) -> Self {
        *self.code.lock().unwrap() = Some(code);
        self
    }

    pub fn with_code_parts(self, parts: PipelineCodeParts) -> Self {
        *self.code_parts.lock().unwrap() = Some(parts);
        self
    }

    pub fn with_run_polls(self, polls: Vec<PipelineRun>) -> Self {
        *self.run_polls.lock().unwrap() = polls.into();
        self
    }

    pub fn failing_uploads(self) -> Self {
        *self.fail_uploads.lock().unwrap() = true;
        self
    }

    fn upload_failure(&self) -> Result<()> {
        if *self.fail_uploads.lock().unwrap() {
            return Err(ParsagonError::Api {
                status: 400,
                message: "bad function".into(),
            });
        }
        Ok(())
    }
}

impl PipelineStore for MockStore {
    fn create_pipeline(&self, pipeline: &NewPipeline<'_>) -> Result<Pipeline> {
        if self.taken_names.lock().unwrap().iter().any(|n| n == pipeline.name) {
            return Err(ParsagonError::PipelineNameTaken(pipeline.name.to_string()));
        }
        self.new_pipelines
            .lock()
            .unwrap()
            .push(serde_json::to_value(pipeline).unwrap());
        let mut pipelines = self.pipelines.lock().unwrap();
        let created = Pipeline {
            id: pipelines.len() as u64 + 100,
            name: pipeline.name.to_string(),
            description: Some(pipeline.description.to_string()),
            pseudocode: Some(pipeline.pseudocode.to_string()),
        };
        pipelines.push(created.clone());
        Ok(created)
    }

    fn delete_pipeline(&self, pipeline_id: u64) -> Result<()> {
        self.deleted.lock().unwrap().push(pipeline_id);
        self.pipelines.lock().unwrap().retain(|p| p.id != pipeline_id);
        Ok(())
    }

    fn update_pipeline(&self, pipeline_id: u64, patch: &Value) -> Result<()> {
        self.patches.lock().unwrap().push((pipeline_id, patch.clone()));
        Ok(())
    }

    fn create_custom_function(
        &self,
        pipeline_id: u64,
        call_id: CallId,
        function: &CustomFunction,
    ) -> Result<()> {
        self.upload_failure()?;
        self.created_functions
            .lock()
            .unwrap()
            .push((pipeline_id, call_id, function.clone()));
        Ok(())
    }

    fn add_examples_to_custom_function(
        &self,
        pipeline_id: u64,
        call_id: CallId,
        _function: &CustomFunction,
        remove_old_examples: bool,
    ) -> Result<()> {
        self.upload_failure()?;
        self.added_examples
            .lock()
            .unwrap()
            .push((pipeline_id, call_id, remove_old_examples));
        Ok(())
    }

    fn get_pipeline(&self, name: &str) -> Result<Pipeline> {
        self.pipelines
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.name == name)
            .cloned()
            .ok_or_else(|| ParsagonError::ProgramNotFound(name.to_string()))
    }

    fn get_pipelines(&self) -> Result<Vec<Pipeline>> {
        Ok(self.pipelines.lock().unwrap().clone())
    }

    fn get_pipeline_code(
        &self,
        name: &str,
        _variables: &Value,
        _headless: bool,
    ) -> Result<PipelineCode> {
        self.code
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ParsagonError::ProgramNotFound(name.to_string()))
    }

    fn get_pipeline_code_parts(&self, _pipeline_id: u64) -> Result<PipelineCodeParts> {
        self.code_parts
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ParsagonError::ProgramNotFound("parts".into()))
    }

    fn create_pipeline_run(
        &self,
        pipeline_id: u64,
        variables: &Value,
        is_local: bool,
    ) -> Result<PipelineRun> {
        self.runs_created
            .lock()
            .unwrap()
            .push((pipeline_id, variables.clone(), is_local));
        Ok(run(7, None))
    }

    fn update_pipeline_run(&self, run_id: u64, update: &RunUpdate) -> Result<PipelineRun> {
        self.run_updates.lock().unwrap().push((run_id, update.clone()));
        Ok(run(run_id, update.status))
    }

    fn get_run(&self, run_id: u64) -> Result<PipelineRun> {
        self.run_polls
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ParsagonError::Api {
                status: 404,
                message: format!("run {} polled too often", run_id),
            })
    }
}

pub fn run(id: u64, status: Option<parsagon::api::models::RunStatus>) -> PipelineRun {
    PipelineRun {
        id,
        status,
        output: json!(null),
        log: None,
        warnings: vec![],
        error: None,
    }
}
