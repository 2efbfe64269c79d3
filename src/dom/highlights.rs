use serde_json::{Value, json};

use crate::browser::driver::BrowserDriver;
use crate::browser::resolution::NodeId;
use crate::engine::error::Result;

/// Page-side selection helper, injected after every navigation or mutation.
pub const HIGHLIGHTS_SCRIPT: &str = include_str!("highlights.js");

/// Class the highlighter puts on elements the operator selected.
pub const STORED_CLASS: &str = "psgn-example-stored";

pub const SETUP_SCRIPT: &str =
    "window.currentFieldType = arguments[0]; window.maxExamples = arguments[1];";

pub const CLEANUP_SCRIPT: &str = "window.currentFieldType = null; window.maxExamples = null; \
     if (window.clearCSS) { window.clearCSS(); }";

pub const SELECTED_IDS_SCRIPT: &str = "return Array.from(document.getElementsByClassName('psgn-example-stored'))\
     .map((elem) => elem.getAttribute('data-psgn-id'));";

pub const SELECTED_WITH_DESCENDANTS_SCRIPT: &str = "return Array.from(document.getElementsByClassName('psgn-example-stored'))\
     .map((elem) => [elem, ...elem.querySelectorAll('*')]).flat()\
     .map((elem) => elem.getAttribute('data-psgn-id'));";

/// What kind of element a click selects while highlighting is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightTarget {
    Text,
    Url,
    Image,
    Html,
    Action,
}

impl HighlightTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            HighlightTarget::Text => "TEXT",
            HighlightTarget::Url => "URL",
            HighlightTarget::Image => "IMAGE",
            HighlightTarget::Html => "HTML",
            HighlightTarget::Action => "ACTION",
        }
    }
}

pub fn inject(driver: &mut dyn BrowserDriver) -> Result<()> {
    driver.execute_script(HIGHLIGHTS_SCRIPT, &[])?;
    Ok(())
}

pub fn setup(
    driver: &mut dyn BrowserDriver,
    target: HighlightTarget,
    max_examples: Option<u32>,
) -> Result<()> {
    let max = max_examples.map(Value::from).unwrap_or(Value::Null);
    driver.execute_script(SETUP_SCRIPT, &[json!(target.as_str()), max])?;
    Ok(())
}

pub fn cleanup(driver: &mut dyn BrowserDriver) -> Result<()> {
    driver.execute_script(CLEANUP_SCRIPT, &[])?;
    Ok(())
}

/// Ids of the elements the operator clicked.
pub fn selected_node_ids(driver: &mut dyn BrowserDriver) -> Result<Vec<NodeId>> {
    let raw = driver.execute_script(SELECTED_IDS_SCRIPT, &[])?;
    Ok(node_ids_from(&raw))
}

/// Ids of the selected elements and everything under them.
pub fn selected_subtree_ids(driver: &mut dyn BrowserDriver) -> Result<Vec<NodeId>> {
    let raw = driver.execute_script(SELECTED_WITH_DESCENDANTS_SCRIPT, &[])?;
    Ok(node_ids_from(&raw))
}

pub fn node_ids_from(raw: &Value) -> Vec<NodeId> {
    raw.as_array()
        .map(|items| items.iter().filter_map(NodeId::from_json).collect())
        .unwrap_or_default()
}
