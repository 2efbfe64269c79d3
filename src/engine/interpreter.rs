use serde_json::{Value, json};
use tracing::debug;

use crate::engine::actions::join_text;
use crate::engine::env::RunEnvironment;
use crate::engine::error::{ParsagonError, Result};
use crate::engine::executor::Executor;
use crate::engine::program::{Step, truthy};

fn bind(env: &mut RunEnvironment, name: &Option<String>, value: Value) {
    if let Some(name) = name {
        env.set(name, value);
    }
}

impl Executor {
    /// Execute `steps` in order. Nested blocks share the environment.
    pub(crate) fn run_steps(&mut self, steps: &[Step], env: &mut RunEnvironment) -> Result<()> {
        for step in steps {
            debug!(op = step.op(), step = env.steps_run, "running step");
            env.advance();
            self.run_step(step, env)?;
        }
        Ok(())
    }

    fn run_step(&mut self, step: &Step, env: &mut RunEnvironment) -> Result<()> {
        match step {
            Step::Goto { url, window, bind: name } => {
                let url = env.eval_str(url)?;
                let window = window.as_ref().map(|w| env.eval_window(w)).transpose()?;
                let handle = self.goto(&url, window.as_ref())?;
                bind(env, name, json!(handle.as_str()));
            }

            Step::CloseWindow { window } => {
                let window = env.eval_window(window)?;
                self.close_window(&window)?;
            }

            Step::Click {
                call_id,
                description,
                window,
                bind: name,
            } => {
                let window = env.eval_window(window)?;
                let clicked = self.click_elem(description, &window, *call_id)?;
                bind(env, name, json!(clicked));
            }

            Step::ClickNextPage {
                call_id,
                description,
                window,
                wait,
                bind: name,
            } => {
                let window = env.eval_window(window)?;
                let advanced = self.click_next_page(description, &window, *call_id, *wait)?;
                bind(env, name, json!(advanced));
            }

            Step::Fill {
                call_id,
                description,
                text,
                enter,
                window,
                bind: name,
            } => {
                let text = env.eval_str(text)?;
                let window = env.eval_window(window)?;
                let filled = self.fill_input(description, &text, *enter, &window, *call_id)?;
                bind(env, name, json!(filled));
            }

            Step::Select {
                call_id,
                description,
                option,
                window,
                bind: name,
            } => {
                let option = env.eval_str(option)?;
                let window = env.eval_window(window)?;
                let selected = self.select_option(description, &option, &window, *call_id)?;
                bind(env, name, json!(selected));
            }

            Step::Scroll { x, y, window } => {
                let window = env.eval_window(window)?;
                self.scroll(*x, *y, &window)?;
            }

            Step::PressKey { key, window } => {
                let window = env.eval_window(window)?;
                self.press_key(key, &window)?;
            }

            Step::Wait { seconds } => self.wait(*seconds)?,

            Step::GetInnerText { window, bind: name } => {
                let window = env.eval_window(window)?;
                let text = self.get_inner_text(&window)?;
                env.set(name, json!(text));
            }

            Step::Scrape {
                call_id,
                schema,
                window,
                bind: name,
            } => {
                let window = env.eval_window(window)?;
                let data = self.scrape_data(schema, &window, *call_id)?;
                bind(env, name, data);
            }

            Step::Assert { value, message } => {
                let value = env.eval(value)?;
                self.custom_assert(&value, message.as_deref())?;
            }

            Step::Ask {
                kind,
                data,
                question,
                bind: name,
            } => {
                let data = env.eval(data)?;
                let answer = self.assist.ask_about_data(*kind, &data, question)?;
                env.set(name, answer);
            }

            Step::Set { var, value } => {
                let value = env.eval(value)?;
                env.set(var, value);
            }

            Step::Append { list, value } => {
                let value = env.eval(value)?;
                env.append(list, value)?;
            }

            Step::JoinText { items, bind: name } => {
                let items = match env.eval(items)? {
                    Value::Array(items) => items
                        .into_iter()
                        .map(|item| match item {
                            Value::String(s) => s,
                            other => other.to_string(),
                        })
                        .collect::<Vec<_>>(),
                    other => {
                        return Err(ParsagonError::InvalidProgram(format!(
                            "join_text expects a list, got {}",
                            other
                        )));
                    }
                };
                env.set(name, json!(join_text(&items)));
            }

            Step::If {
                condition,
                then,
                otherwise,
            } => {
                if truthy(&env.eval(condition)?) {
                    self.run_steps(then, env)?;
                } else {
                    self.run_steps(otherwise, env)?;
                }
            }

            Step::Repeat {
                max_iterations,
                until,
                body,
            } => {
                let max = max_iterations.ok_or_else(|| {
                    ParsagonError::InvalidProgram("repeat without max_iterations".into())
                })?;
                for iteration in 0..max {
                    self.run_steps(body, env)?;
                    if let Some(var) = until {
                        if !truthy(env.get(var)?) {
                            debug!(iteration, %var, "loop condition cleared");
                            break;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
