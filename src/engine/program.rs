use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::models::QuestionKind;
use crate::engine::custom_function::CallId;

fn default_output() -> String {
    "output".to_string()
}

fn default_next_page_wait() -> f64 {
    1.0
}

/// Program produced from a natural-language task.
///
/// Runs against a fresh [`RunEnvironment`](crate::engine::env::RunEnvironment)
/// seeded with the caller's variables; the value bound to `output` when the
/// last step finishes is the program result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Program {
    pub steps: Vec<Step>,

    /// Variable holding the result
    #[serde(default = "default_output")]
    pub output: String,
}

/// A value taken literally or read from a variable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Expr {
    Var { var: String },
    Literal(Value),
}

impl Expr {
    pub fn var(name: &str) -> Self {
        Expr::Var {
            var: name.to_string(),
        }
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }
}

/// A single step of a program.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Navigate, reusing `window` when it is still open
    Goto {
        url: Expr,
        #[serde(default)]
        window: Option<Expr>,
        #[serde(default)]
        bind: Option<String>,
    },

    CloseWindow {
        window: Expr,
    },

    /// Click the element matching `description`
    Click {
        call_id: CallId,
        description: String,
        window: Expr,
        #[serde(default)]
        bind: Option<String>,
    },

    /// Click a pagination control; binds whether the page changed
    ClickNextPage {
        call_id: CallId,
        description: String,
        window: Expr,
        #[serde(default = "default_next_page_wait")]
        wait: f64,
        #[serde(default)]
        bind: Option<String>,
    },

    Fill {
        call_id: CallId,
        description: String,
        text: Expr,
        #[serde(default)]
        enter: bool,
        window: Expr,
        #[serde(default)]
        bind: Option<String>,
    },

    Select {
        call_id: CallId,
        description: String,
        option: Expr,
        window: Expr,
        #[serde(default)]
        bind: Option<String>,
    },

    /// Scroll to a fraction of the page size, 0.0 to 1.0
    Scroll {
        x: f64,
        y: f64,
        window: Expr,
    },

    PressKey {
        key: String,
        window: Expr,
    },

    Wait {
        seconds: f64,
    },

    GetInnerText {
        window: Expr,
        bind: String,
    },

    /// Extract data shaped like `schema`
    Scrape {
        call_id: CallId,
        schema: Value,
        window: Expr,
        #[serde(default)]
        bind: Option<String>,
    },

    Assert {
        value: Expr,
        #[serde(default)]
        message: Option<String>,
    },

    /// Ask the data service a question about a value
    Ask {
        kind: QuestionKind,
        data: Expr,
        question: String,
        bind: String,
    },

    Set {
        var: String,
        value: Expr,
    },

    /// Push onto a list variable, creating it if unset
    Append {
        list: String,
        value: Expr,
    },

    /// Join strings with blank lines
    JoinText {
        items: Expr,
        bind: String,
    },

    If {
        condition: Expr,
        then: Vec<Step>,
        #[serde(default, rename = "else")]
        otherwise: Vec<Step>,
    },

    /// Run `body` at most `max_iterations` times, stopping early once the
    /// variable named by `until` is falsy after an iteration
    Repeat {
        #[serde(default)]
        max_iterations: Option<u32>,
        #[serde(default)]
        until: Option<String>,
        body: Vec<Step>,
    },
}

impl Step {
    pub fn op(&self) -> &'static str {
        match self {
            Step::Goto { .. } => "goto",
            Step::CloseWindow { .. } => "close_window",
            Step::Click { .. } => "click",
            Step::ClickNextPage { .. } => "click_next_page",
            Step::Fill { .. } => "fill",
            Step::Select { .. } => "select",
            Step::Scroll { .. } => "scroll",
            Step::PressKey { .. } => "press_key",
            Step::Wait { .. } => "wait",
            Step::GetInnerText { .. } => "get_inner_text",
            Step::Scrape { .. } => "scrape",
            Step::Assert { .. } => "assert",
            Step::Ask { .. } => "ask",
            Step::Set { .. } => "set",
            Step::Append { .. } => "append",
            Step::JoinText { .. } => "join_text",
            Step::If { .. } => "if",
            Step::Repeat { .. } => "repeat",
        }
    }
}

/// Python-style truthiness over JSON values.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
