use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::custom_function::{CallId, CustomFunction};
use crate::engine::program::Program;
use crate::engine::replay::SavedImplementation;

/// Output of the task-to-program service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramSketches {
    pub full: Program,
    pub abridged: Program,
    pub pseudocode: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CleanedData {
    pub data: Value,
}

/// Answer of the inferred page scrape: values plus the nodes they came from.
#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeResult {
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub nodes: Value,
}

/// Element class sent to the remote identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ElementKind {
    Button,
    Input,
    Select,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Button => "BUTTON",
            ElementKind::Input => "INPUT",
            ElementKind::Select => "SELECT",
        }
    }
}

/// Shape of a free-form question about scraped data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Str,
    Bool,
    Json,
}

impl QuestionKind {
    pub fn endpoint(&self) -> &'static str {
        match self {
            QuestionKind::Str => "get-str-about-data",
            QuestionKind::Bool => "get-bool-about-data",
            QuestionKind::Json => "get-json-about-data",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pipeline {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub pseudocode: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewPipeline<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub program_sketch: &'a Program,
    pub pseudocode: &'a str,
    pub secrets: &'a BTreeMap<String, String>,
}

/// Body of the custom-function endpoints.
#[derive(Debug, Serialize)]
pub struct CustomFunctionUpload<'a> {
    pub pipeline: u64,
    pub call_id: CallId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remove_old_examples: Option<bool>,
    #[serde(flatten)]
    pub function: &'a CustomFunction,
}

/// Saved implementation of one call site.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SavedFunction {
    pub call_id: CallId,
    pub code: SavedImplementation,
}

/// Everything needed to replay a pipeline locally.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineCode {
    pub program: Program,
    #[serde(default)]
    pub custom_functions: Vec<SavedFunction>,
}

/// Sketch and saved call sites of an existing pipeline, for editing.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineCodeParts {
    pub program_sketch: Program,
    #[serde(default)]
    pub custom_functions: Vec<SavedFunction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Queued,
    Running,
    Finished,
    Error,
    Canceled,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineRun {
    pub id: u64,
    #[serde(default)]
    pub status: Option<RunStatus>,
    #[serde(default)]
    pub output: Value,
    #[serde(default)]
    pub log: Option<String>,
    #[serde(default)]
    pub warnings: Vec<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Fields patched onto a run once a local execution ends.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunUpdate {
    pub start_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RunStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub warnings: Vec<Value>,
}
