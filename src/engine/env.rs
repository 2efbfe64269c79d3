use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::browser::resolution::WindowHandle;
use crate::engine::error::{ParsagonError, Result};
use crate::engine::program::Expr;

/// Variable bindings and progress of one program run.
#[derive(Debug, Clone, Default)]
pub struct RunEnvironment {
    vars: HashMap<String, Value>,

    /// Steps executed so far, nested steps included
    pub steps_run: usize,
}

impl RunEnvironment {
    pub fn new(variables: Map<String, Value>) -> Self {
        RunEnvironment {
            vars: variables.into_iter().collect(),
            steps_run: 0,
        }
    }

    pub fn get(&self, name: &str) -> Result<&Value> {
        self.vars
            .get(name)
            .ok_or_else(|| ParsagonError::InvalidProgram(format!("unknown variable `{}`", name)))
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.vars.insert(name.to_string(), value);
    }

    /// Push onto the list `name`, creating it when unset.
    pub fn append(&mut self, name: &str, value: Value) -> Result<()> {
        match self.vars.entry(name.to_string()).or_insert_with(|| Value::Array(vec![])) {
            Value::Array(items) => {
                items.push(value);
                Ok(())
            }
            _ => Err(ParsagonError::InvalidProgram(format!(
                "variable `{}` is not a list",
                name
            ))),
        }
    }

    pub fn eval(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Var { var } => self.get(var).cloned(),
            Expr::Literal(value) => Ok(value.clone()),
        }
    }

    /// Evaluate to a string; numbers and booleans are rendered.
    pub fn eval_str(&self, expr: &Expr) -> Result<String> {
        match self.eval(expr)? {
            Value::String(s) => Ok(s),
            v @ (Value::Number(_) | Value::Bool(_)) => Ok(v.to_string()),
            other => Err(ParsagonError::InvalidProgram(format!(
                "expected text, got {}",
                other
            ))),
        }
    }

    pub fn eval_window(&self, expr: &Expr) -> Result<WindowHandle> {
        match self.eval(expr)? {
            Value::String(s) => Ok(WindowHandle(s)),
            other => Err(ParsagonError::InvalidProgram(format!(
                "expected a window handle, got {}",
                other
            ))),
        }
    }

    /// Consume the environment, returning the value bound to `output`.
    pub fn into_output(mut self, output: &str) -> Value {
        self.vars.remove(output).unwrap_or(Value::Null)
    }

    pub fn advance(&mut self) {
        self.steps_run += 1;
    }
}
