use std::time::Duration;

use reqwest::Method;
use reqwest::blocking::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::debug;
use url::Url;

use crate::api::backend::{AssistBackend, PipelineStore};
use crate::api::models::{
    CleanedData, CustomFunctionUpload, ElementKind, NewPipeline, Pipeline, PipelineCode,
    PipelineCodeParts, PipelineRun, ProgramSketches, QuestionKind, RunUpdate, ScrapeResult,
};
use crate::browser::resolution::NodeId;
use crate::engine::custom_function::{CallId, CustomFunction};
use crate::engine::error::{ParsagonError, Result};
use crate::engine::program::Program;

const NAME_TAKEN: &str = "Pipeline with name already exists";

/// Token-authenticated JSON client for the Parsagon backend.
///
/// Requests never time out; the remote calls can legitimately take minutes.
pub struct HttpBackend {
    client: Client,
    base: String,
    api_key: String,
}

impl HttpBackend {
    pub fn new(base: &str, api_key: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(None::<Duration>)
            .build()
            .map_err(|e| ParsagonError::Transport {
                endpoint: base.to_string(),
                source: e,
            })?;
        Ok(HttpBackend {
            client,
            base: base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// `<base>/api/<segments>/`, each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base)
            .map_err(|e| ParsagonError::Config(format!("Invalid API base {}: {}", self.base, e)))?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ParsagonError::Config(format!("Invalid API base {}", self.base)))?;
            path.pop_if_empty().push("api");
            path.extend(segments);
            path.push("");
        }
        Ok(url)
    }

    fn send(&self, method: Method, segments: &[&str], body: Option<Value>) -> Result<String> {
        let url = self.endpoint(segments)?;
        debug!(%method, %url, "api call");

        let mut request = self
            .client
            .request(method, url.clone())
            .header("Authorization", format!("Token {}", self.api_key));
        if let Some(body) = body {
            request = request.json(&body);
        }

        let transport = |e| ParsagonError::Transport {
            endpoint: url.to_string(),
            source: e,
        };
        let response = request.send().map_err(transport)?;
        let status = response.status();
        let text = response.text().map_err(transport)?;

        if !status.is_success() {
            return Err(error_from_response(status.as_u16(), &text));
        }
        Ok(text)
    }

    fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<Value>,
    ) -> Result<T> {
        let endpoint = segments.join("/");
        let text = self.send(method, segments, body)?;
        serde_json::from_str(&text).map_err(|e| ParsagonError::JsonParse {
            context: endpoint,
            source: e,
        })
    }

    fn call_empty(&self, method: Method, segments: &[&str], body: Option<Value>) -> Result<()> {
        self.send(method, segments, body)?;
        Ok(())
    }
}

fn to_body<T: Serialize>(value: &T, context: &str) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| ParsagonError::JsonSerialize {
        context: context.to_string(),
        source: e,
    })
}

/// Map a non-2xx response onto the error taxonomy.
pub fn error_from_response(status: u16, body: &str) -> ParsagonError {
    let message = match status {
        500 => "A server error occurred. Please notify Parsagon.".to_string(),
        502..=504 => "Lost connection to server.".to_string(),
        _ => match serde_json::from_str::<Value>(body) {
            Ok(errors) => match errors.get("non_field_errors") {
                Some(non_field) => render_errors(non_field),
                None => render_errors(&errors),
            },
            Err(_) => "Could not parse response.".to_string(),
        },
    };
    ParsagonError::Api { status, message }
}

fn render_errors(errors: &Value) -> String {
    match errors {
        Value::String(s) => s.clone(),
        Value::Array(items) if items.iter().all(Value::is_string) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

/// Translate a 404 on a by-name lookup into `ProgramNotFound`.
pub fn program_not_found(name: &str, error: ParsagonError) -> ParsagonError {
    match error.status_code() {
        Some(404) => ParsagonError::ProgramNotFound(name.to_string()),
        _ => error,
    }
}

impl AssistBackend for HttpBackend {
    fn get_program_sketches(&self, description: &str) -> Result<ProgramSketches> {
        self.call(
            Method::POST,
            &["transformers", "get-program-sketch"],
            Some(json!({ "description": description })),
        )
    }

    fn edit_program_sketch(&self, sketch: &Program, description: &str) -> Result<ProgramSketches> {
        self.call(
            Method::POST,
            &["transformers", "edit-program-sketch"],
            Some(json!({
                "program_sketch": to_body(sketch, "program sketch")?,
                "description": description,
            })),
        )
    }

    fn get_interaction_element_id(
        &self,
        visible_html: &str,
        kind: ElementKind,
        description: &str,
    ) -> Result<Option<NodeId>> {
        let result: Value = self.call(
            Method::POST,
            &["transformers", "get-nav-elem"],
            Some(json!({
                "html": visible_html,
                "elem_type": kind.as_str(),
                "description": description,
            })),
        )?;
        Ok(result.get("id").and_then(NodeId::from_json))
    }

    fn get_schema_fields(&self, schema: &Value) -> Result<Map<String, Value>> {
        self.call(
            Method::POST,
            &["transformers", "get-schema-fields"],
            Some(json!({ "schema": schema })),
        )
    }

    fn get_cleaned_data(&self, html: &str, schema: &Value, nodes: &Value) -> Result<CleanedData> {
        self.call(
            Method::POST,
            &["transformers", "get-cleaned-data"],
            Some(json!({ "html": html, "schema": schema, "nodes": nodes })),
        )
    }

    fn scrape_page(&self, html: &str, schema: &Value, relevant: &[NodeId]) -> Result<ScrapeResult> {
        self.call(
            Method::POST,
            &["transformers", "get-custom-data"],
            Some(json!({ "html": html, "schema": schema, "relevant_elem_ids": relevant })),
        )
    }

    fn ask_about_data(&self, kind: QuestionKind, data: &Value, question: &str) -> Result<Value> {
        let result: Value = self.call(
            Method::POST,
            &["transformers", kind.endpoint()],
            Some(json!({ "data": data, "question": question })),
        )?;
        Ok(result.get("result").cloned().unwrap_or(Value::Null))
    }
}

impl PipelineStore for HttpBackend {
    fn create_pipeline(&self, pipeline: &NewPipeline<'_>) -> Result<Pipeline> {
        let body = to_body(pipeline, "new pipeline")?;
        self.call(Method::POST, &["pipelines"], Some(body))
            .map_err(|e| match e {
                ParsagonError::Api { ref message, .. } if message.contains(NAME_TAKEN) => {
                    ParsagonError::PipelineNameTaken(pipeline.name.to_string())
                }
                other => other,
            })
    }

    fn delete_pipeline(&self, pipeline_id: u64) -> Result<()> {
        self.call_empty(Method::DELETE, &["pipelines", &pipeline_id.to_string()], None)
    }

    fn update_pipeline(&self, pipeline_id: u64, patch: &Value) -> Result<()> {
        self.call_empty(
            Method::PATCH,
            &["pipelines", &pipeline_id.to_string()],
            Some(patch.clone()),
        )
    }

    fn create_custom_function(
        &self,
        pipeline_id: u64,
        call_id: CallId,
        function: &CustomFunction,
    ) -> Result<()> {
        let upload = CustomFunctionUpload {
            pipeline: pipeline_id,
            call_id,
            remove_old_examples: None,
            function,
        };
        self.call_empty(
            Method::POST,
            &["transformers", "custom-function"],
            Some(to_body(&upload, "custom function")?),
        )
    }

    fn add_examples_to_custom_function(
        &self,
        pipeline_id: u64,
        call_id: CallId,
        function: &CustomFunction,
        remove_old_examples: bool,
    ) -> Result<()> {
        let upload = CustomFunctionUpload {
            pipeline: pipeline_id,
            call_id,
            remove_old_examples: Some(remove_old_examples),
            function,
        };
        self.call_empty(
            Method::POST,
            &["transformers", "custom-function", "add-examples"],
            Some(to_body(&upload, "custom function examples")?),
        )
    }

    fn get_pipeline(&self, name: &str) -> Result<Pipeline> {
        self.call(Method::GET, &["pipelines", "name", name], None)
            .map_err(|e| program_not_found(name, e))
    }

    fn get_pipelines(&self) -> Result<Vec<Pipeline>> {
        self.call(Method::GET, &["pipelines"], None)
    }

    fn get_pipeline_code(
        &self,
        name: &str,
        variables: &Value,
        headless: bool,
    ) -> Result<PipelineCode> {
        self.call(
            Method::POST,
            &["pipelines", "name", name, "code"],
            Some(json!({ "variables": variables, "headless": headless })),
        )
        .map_err(|e| program_not_found(name, e))
    }

    fn get_pipeline_code_parts(&self, pipeline_id: u64) -> Result<PipelineCodeParts> {
        self.call(
            Method::GET,
            &["pipelines", &pipeline_id.to_string(), "code-parts"],
            None,
        )
    }

    fn create_pipeline_run(
        &self,
        pipeline_id: u64,
        variables: &Value,
        is_local: bool,
    ) -> Result<PipelineRun> {
        self.call(
            Method::POST,
            &["pipelines", &pipeline_id.to_string(), "runs"],
            Some(json!({ "variables": variables, "is_local": is_local })),
        )
    }

    fn update_pipeline_run(&self, run_id: u64, update: &RunUpdate) -> Result<PipelineRun> {
        self.call(
            Method::PATCH,
            &["pipelines", "runs", &run_id.to_string()],
            Some(to_body(update, "run update")?),
        )
    }

    fn get_run(&self, run_id: u64) -> Result<PipelineRun> {
        self.call(Method::GET, &["pipelines", "runs", &run_id.to_string()], None)
    }
}
