//! Replay of saved call-site implementations.
//!
//! While editing or running a saved pipeline, a call site that already has an
//! implementation is executed straight from its captured resolution, bypassing
//! the resolver. In [`ReplayPolicy::Ask`] the operator may choose to re-record
//! the step instead, in which case its new examples replace the old ones.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{info, warn};

use crate::api::models::SavedFunction;
use crate::browser::resolution::{ElementResolution, NodeId};
use crate::engine::actions::{seconds, text_fingerprint};
use crate::engine::custom_function::{ActionName, CallId, CustomFunction, ExampleTarget};
use crate::engine::error::Result;
use crate::engine::executor::Executor;
use crate::interaction::{Tone, UserInteraction};
use crate::trace::trace::RunEvent;

/// Deterministic implementation of one call site.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SavedImplementation {
    pub name: ActionName,

    /// Element to act on, for clicks, fills and selects
    #[serde(default)]
    pub target: ElementResolution,

    /// Scrapes: where each schema field's values live
    #[serde(default)]
    pub fields: BTreeMap<String, Vec<ElementResolution>>,
}

impl SavedImplementation {
    /// Build an implementation from the most recent example of `function`.
    pub fn from_function(function: &CustomFunction) -> Option<Self> {
        let example = function.examples.last()?;
        let mut saved = SavedImplementation {
            name: function.name,
            target: ElementResolution::NotFound,
            fields: BTreeMap::new(),
        };
        match &example.target {
            ExampleTarget::Element { .. } => saved.target = example.resolution(),
            ExampleTarget::Scrape {
                nodes,
                css_selectors,
                xpath_selectors,
                ..
            } => {
                let fields = nodes.as_object()?;
                for (field, groups) in fields {
                    let resolutions = if let Some(selector) = css_selectors.get(field) {
                        vec![ElementResolution::CssSelector {
                            selector: selector.clone(),
                            matched: None,
                        }]
                    } else if let Some(selector) = xpath_selectors.get(field) {
                        vec![ElementResolution::XpathSelector {
                            selector: selector.clone(),
                            matched: None,
                        }]
                    } else {
                        groups
                            .as_array()
                            .map(|groups| {
                                groups
                                    .iter()
                                    .flat_map(|g| g.as_array().cloned().unwrap_or_default())
                                    .filter_map(|id| NodeId::from_json(&id))
                                    .map(|id| ElementResolution::NodeId { id })
                                    .collect()
                            })
                            .unwrap_or_default()
                    };
                    saved.fields.insert(field.clone(), resolutions);
                }
            }
        }
        Some(saved)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayPolicy {
    /// Ask once per call site whether to re-record it
    Ask,
    /// Never ask; saved call sites always replay
    Always,
}

pub struct ReplayAdapter {
    policy: ReplayPolicy,
    saved: HashMap<CallId, SavedImplementation>,
    /// Operator's answer per call site: true to replay
    decisions: HashMap<CallId, bool>,
}

impl ReplayAdapter {
    pub fn new(
        policy: ReplayPolicy,
        saved: impl IntoIterator<Item = (CallId, SavedImplementation)>,
    ) -> Self {
        ReplayAdapter {
            policy,
            saved: saved.into_iter().collect(),
            decisions: HashMap::new(),
        }
    }

    pub fn from_saved_functions(policy: ReplayPolicy, functions: &[SavedFunction]) -> Self {
        Self::new(
            policy,
            functions.iter().map(|f| (f.call_id, f.code.clone())),
        )
    }

    pub fn has_saved(&self, call_id: CallId) -> bool {
        self.saved.contains_key(&call_id)
    }

    /// True once the operator chose to re-record a saved call site.
    pub fn is_rerecorded(&self, call_id: CallId) -> bool {
        self.decisions.get(&call_id) == Some(&false)
    }

    /// The implementation to replay, or `None` when the call site should be
    /// resolved and recorded normally.
    pub fn decide(
        &mut self,
        call_id: CallId,
        description: &str,
        ui: &dyn UserInteraction,
    ) -> Result<Option<SavedImplementation>> {
        let Some(saved) = self.saved.get(&call_id) else {
            return Ok(None);
        };
        let replay = match (self.policy, self.decisions.get(&call_id)) {
            (ReplayPolicy::Always, _) => true,
            (ReplayPolicy::Ask, Some(decided)) => *decided,
            (ReplayPolicy::Ask, None) => {
                let rerecord = ui.confirm(&format!(
                    "The step \"{}\" already has a saved implementation. Re-record it?",
                    description
                ))?;
                self.decisions.insert(call_id, !rerecord);
                !rerecord
            }
        };
        Ok(replay.then(|| saved.clone()))
    }
}

/// Runtime arguments of the call being replayed.
#[derive(Debug, Clone, Copy)]
pub enum ReplayArgs<'a> {
    Click,
    ClickNextPage { wait: f64 },
    Fill { text: &'a str, enter: bool },
    Select { option: &'a str },
    Scrape { schema: &'a Value },
}

impl ReplayArgs<'_> {
    pub fn action(&self) -> ActionName {
        match self {
            ReplayArgs::Click => ActionName::ClickElem,
            ReplayArgs::ClickNextPage { .. } => ActionName::ClickNextPage,
            ReplayArgs::Fill { .. } => ActionName::FillInput,
            ReplayArgs::Select { .. } => ActionName::SelectOption,
            ReplayArgs::Scrape { .. } => ActionName::ScrapeData,
        }
    }
}

impl Executor {
    /// Execute the saved implementation of `call_id` if there is one and the
    /// policy allows it. `None` means: resolve and record as usual.
    pub fn maybe_replay(
        &mut self,
        call_id: CallId,
        description: &str,
        args: ReplayArgs<'_>,
    ) -> Result<Option<Value>> {
        let Some(adapter) = self.replay.as_mut() else {
            return Ok(None);
        };
        let Some(saved) = adapter.decide(call_id, description, self.ui.as_ref())? else {
            return Ok(None);
        };
        if saved.name != args.action() {
            warn!(
                %call_id,
                saved = saved.name.as_str(),
                called = args.action().as_str(),
                "saved implementation is for a different action, recording instead"
            );
            return Ok(None);
        }

        info!(%call_id, action = saved.name.as_str(), "replaying saved implementation");
        self.stamp()?;
        let result = match args {
            ReplayArgs::Click => {
                let node = self.reapply(&saved.target)?;
                Value::Bool(self.perform("click_elem", node, |d, n| d.click(n))?)
            }
            ReplayArgs::ClickNextPage { wait } => {
                let node = self.reapply(&saved.target)?;
                let before = text_fingerprint(&self.driver.page_source()?);
                let clicked = self.perform("click_next_page", node, |d, n| d.click(n))?;
                let changed = clicked && {
                    self.pause(seconds(wait));
                    text_fingerprint(&self.driver.page_source()?) != before
                };
                Value::Bool(changed)
            }
            ReplayArgs::Fill { text, enter } => {
                let node = self.reapply(&saved.target)?;
                Value::Bool(self.perform("fill_input", node, |d, n| d.type_text(n, text, enter))?)
            }
            ReplayArgs::Select { option } => {
                let node = self.reapply(&saved.target)?;
                Value::Bool(self.perform("select_option", node, |d, n| d.select_option(n, option))?)
            }
            ReplayArgs::Scrape { schema } => self.replay_scrape(&saved, schema)?,
        };

        let window = self.driver.current_window()?;
        let mut event = RunEvent::now(saved.name.as_str())
            .with_call_id(call_id)
            .with_window(&window)
            .replayed();
        if let Value::Bool(success) = result {
            event = event.with_success(success);
        }
        self.log_event(event);
        Ok(Some(result))
    }

    /// Locate a captured resolution on the live page. Selectors are evaluated
    /// again; node ids are taken as they are.
    pub fn reapply(&mut self, resolution: &ElementResolution) -> Result<Option<NodeId>> {
        match resolution {
            ElementResolution::NodeId { id } => Ok(Some(*id)),
            ElementResolution::NotFound => Ok(None),
            other => match other.locator() {
                Some(locator) => Ok(self.driver.find_node_ids(&locator)?.first().copied()),
                None => Ok(None),
            },
        }
    }

    fn replay_scrape(&mut self, saved: &SavedImplementation, schema: &Value) -> Result<Value> {
        let mut nodes = Map::new();
        for (field, resolutions) in &saved.fields {
            let mut groups = Vec::new();
            for resolution in resolutions {
                let ids = match resolution.locator() {
                    Some(locator) => self.driver.find_node_ids(&locator)?,
                    None => resolution.node_id().into_iter().collect(),
                };
                groups.extend(ids.into_iter().map(|id| json!([id])));
            }
            nodes.insert(field.clone(), Value::Array(groups));
        }

        let html = self.get_scrape_html()?;
        let cleaned = self
            .assist
            .get_cleaned_data(&html, schema, &Value::Object(nodes))?;
        self.ui.print(
            Tone::Browser,
            &format!(
                "Scraped data:\n{}",
                serde_json::to_string_pretty(&cleaned.data).unwrap_or_default()
            ),
        );
        Ok(cleaned.data)
    }
}
