use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::browser::resolution::{ElementResolution, NodeId};

/// Call-site key assigned by the program sketch.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CallId(pub u64);

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Action kinds that produce examples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionName {
    Goto,
    ClickElem,
    ClickNextPage,
    FillInput,
    SelectOption,
    ScrapeData,
}

impl ActionName {
    /// Phrase shown to the operator while the function is being saved.
    pub fn description(&self) -> Option<&'static str> {
        match self {
            ActionName::ScrapeData => Some("scrape data from the page"),
            ActionName::Goto => Some("go to a page"),
            ActionName::ClickElem => Some("click an element"),
            ActionName::FillInput => Some("fill an input"),
            ActionName::SelectOption => Some("select an option"),
            ActionName::ClickNextPage => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionName::Goto => "goto",
            ActionName::ClickElem => "click_elem",
            ActionName::ClickNextPage => "click_next_page",
            ActionName::FillInput => "fill_input",
            ActionName::SelectOption => "select_option",
            ActionName::ScrapeData => "scrape_data",
        }
    }
}

/// Where an example's target was found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExampleTarget {
    /// Scrape: nodes per schema field and the cleaned result.
    Scrape {
        nodes: Value,
        #[serde(default)]
        css_selectors: BTreeMap<String, String>,
        #[serde(default)]
        xpath_selectors: BTreeMap<String, String>,
        scraped_data: Value,
    },
    /// Click, fill or select: the single resolved element.
    Element {
        elem_id: Option<NodeId>,
        css_selector: Option<String>,
        xpath_selector: Option<String>,
    },
}

/// One observed occurrence of a call site.
///
/// `html` is always the page before the action ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleRecord {
    pub html: String,
    pub url: String,
    #[serde(flatten)]
    pub target: ExampleTarget,
}

impl ExampleRecord {
    pub fn element(html: String, url: String, resolution: &ElementResolution) -> Self {
        ExampleRecord {
            html,
            url,
            target: ExampleTarget::Element {
                elem_id: resolution.node_id(),
                css_selector: resolution.css_selector().map(str::to_string),
                xpath_selector: resolution.xpath_selector().map(str::to_string),
            },
        }
    }

    pub fn scrape(
        html: String,
        url: String,
        nodes: Value,
        css_selectors: BTreeMap<String, String>,
        xpath_selectors: BTreeMap<String, String>,
        scraped_data: Value,
    ) -> Self {
        ExampleRecord {
            html,
            url,
            target: ExampleTarget::Scrape {
                nodes,
                css_selectors,
                xpath_selectors,
                scraped_data,
            },
        }
    }

    /// Rebuild the resolution an element example was captured with.
    pub fn resolution(&self) -> ElementResolution {
        match &self.target {
            ExampleTarget::Element {
                elem_id,
                css_selector: Some(selector),
                ..
            } => ElementResolution::CssSelector {
                selector: selector.clone(),
                matched: *elem_id,
            },
            ExampleTarget::Element {
                elem_id,
                xpath_selector: Some(selector),
                ..
            } => ElementResolution::XpathSelector {
                selector: selector.clone(),
                matched: *elem_id,
            },
            ExampleTarget::Element {
                elem_id: Some(id), ..
            } => ElementResolution::NodeId { id: *id },
            _ => ElementResolution::NotFound,
        }
    }
}

/// Everything observed at one call site during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFunction {
    pub name: ActionName,
    pub arguments: Map<String, Value>,
    pub examples: Vec<ExampleRecord>,
    /// Sent alongside the function by the upload, not inside it.
    #[serde(skip)]
    pub call_id: CallId,
    /// Set when the operator chose to re-record a saved call site.
    #[serde(skip)]
    pub replace_examples: bool,
}

impl CustomFunction {
    pub fn new(
        name: ActionName,
        call_id: CallId,
        arguments: Map<String, Value>,
        example: ExampleRecord,
    ) -> Self {
        CustomFunction {
            name,
            arguments,
            examples: vec![example],
            call_id,
            replace_examples: false,
        }
    }
}

/// Merges examples per call site across repeated executions.
#[derive(Debug, Default)]
pub struct ExampleAccumulator {
    functions: BTreeMap<CallId, CustomFunction>,
}

impl ExampleAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold `function` into the entry for `call_id`.
    ///
    /// An existing entry keeps its arguments and gains the new examples.
    pub fn add_example(&mut self, call_id: CallId, mut function: CustomFunction) {
        function.call_id = call_id;
        match self.functions.get_mut(&call_id) {
            Some(existing) => {
                existing.examples.append(&mut function.examples);
                existing.replace_examples |= function.replace_examples;
            }
            None => {
                self.functions.insert(call_id, function);
            }
        }
    }

    pub fn get(&self, call_id: CallId) -> Option<&CustomFunction> {
        self.functions.get(&call_id)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CallId, &CustomFunction)> {
        self.functions.iter()
    }

    pub fn into_functions(self) -> BTreeMap<CallId, CustomFunction> {
        self.functions
    }
}
