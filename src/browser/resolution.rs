use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// DOM attribute carrying the stamped node id.
pub const NODE_ID_ATTR: &str = "data-psgn-id";

/// Stable per-window integer stamped onto a DOM node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl NodeId {
    pub fn parse(raw: &str) -> Option<Self> {
        raw.trim().parse::<u64>().ok().map(NodeId)
    }

    /// Accepts both numeric and string ids, the DOM hands out strings.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_u64().map(NodeId),
            Value::String(s) => NodeId::parse(s),
            _ => None,
        }
    }

    /// XPath locating this node in a stamped page.
    pub fn xpath(&self) -> String {
        format!("//*[@{}=\"{}\"]", NODE_ID_ATTR, self.0)
    }

    pub fn css(&self) -> String {
        format!("[{}=\"{}\"]", NODE_ID_ATTR, self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque browser tab/window identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowHandle(pub String);

impl WindowHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WindowHandle {
    fn from(s: &str) -> Self {
        WindowHandle(s.to_string())
    }
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Selector-based lookup understood by the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "by", content = "selector", rename_all = "snake_case")]
pub enum Locator {
    Css(String),
    Xpath(String),
}

/// Outcome of locating an element, persisted inside examples for replay.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElementResolution {
    NodeId {
        id: NodeId,
    },
    CssSelector {
        selector: String,
        #[serde(default)]
        matched: Option<NodeId>,
    },
    XpathSelector {
        selector: String,
        #[serde(default)]
        matched: Option<NodeId>,
    },
    #[default]
    NotFound,
}

impl ElementResolution {
    /// The concrete node this resolution points at on the page it was made on.
    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            ElementResolution::NodeId { id } => Some(*id),
            ElementResolution::CssSelector { matched, .. }
            | ElementResolution::XpathSelector { matched, .. } => *matched,
            ElementResolution::NotFound => None,
        }
    }

    pub fn css_selector(&self) -> Option<&str> {
        match self {
            ElementResolution::CssSelector { selector, .. } => Some(selector),
            _ => None,
        }
    }

    pub fn xpath_selector(&self) -> Option<&str> {
        match self {
            ElementResolution::XpathSelector { selector, .. } => Some(selector),
            _ => None,
        }
    }

    pub fn locator(&self) -> Option<Locator> {
        match self {
            ElementResolution::CssSelector { selector, .. } => Some(Locator::Css(selector.clone())),
            ElementResolution::XpathSelector { selector, .. } => {
                Some(Locator::Xpath(selector.clone()))
            }
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        self.node_id().is_some()
    }

    /// Same resolution with the match replaced, used when re-applying a
    /// selector to a page that may have changed.
    pub fn with_match(&self, node: Option<NodeId>) -> Self {
        match self {
            ElementResolution::CssSelector { selector, .. } => ElementResolution::CssSelector {
                selector: selector.clone(),
                matched: node,
            },
            ElementResolution::XpathSelector { selector, .. } => {
                ElementResolution::XpathSelector {
                    selector: selector.clone(),
                    matched: node,
                }
            }
            other => other.clone(),
        }
    }
}
