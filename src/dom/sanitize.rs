//! Two cleaned serializations of a page.
//!
//! The scrape view keeps every node so stored examples can still reach
//! hidden data. The visible view additionally drops `<head>` and anything
//! the browser did not render, and is only ever sent to the remote element
//! identifier.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Node};
use url::Url;

use crate::browser::resolution::{NODE_ID_ATTR, NodeId};
use crate::engine::error::{ParsagonError, Result};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose contents are blanked.
const BLANKED_ELEMENTS: &[&str] = &["script", "noscript", "style"];

/// Attributes holding a single URL.
const LINK_ATTRS: &[&str] = &[
    "href",
    "src",
    "action",
    "formaction",
    "poster",
    "background",
    "cite",
    "longdesc",
    "usemap",
];

/// Cleaned markup with every node kept.
pub fn scrape_html(source: &str, base_url: &str) -> String {
    let document = parse(source);
    let mut writer = Writer::new(base_url, None);
    writer.write_document(&document);
    writer.out
}

/// Cleaned markup restricted to what the browser renders.
///
/// `visible` holds the ids that passed the visibility predicate. A stamped
/// element outside that set is dropped with its subtree, unless one of its
/// descendants is visible, in which case it stays as layout context.
pub fn visible_html(source: &str, base_url: &str, visible: &HashSet<NodeId>) -> Result<String> {
    if !source.contains(NODE_ID_ATTR) {
        return Err(ParsagonError::NotStamped);
    }
    let document = parse(source);

    let mut dropped = HashSet::new();
    collect_dropped(document.root_element(), visible, &mut dropped);

    let mut writer = Writer::new(base_url, Some(dropped));
    writer.write_document(&document);
    Ok(writer.out)
}

fn parse(source: &str) -> Html {
    Html::parse_document(&source.replace("&nbsp;", " "))
}

fn stamped_id(el: ElementRef<'_>) -> Option<NodeId> {
    el.value().attr(NODE_ID_ATTR).and_then(NodeId::parse)
}

/// Post-order pass. Returns whether `el` survives.
fn collect_dropped(
    el: ElementRef<'_>,
    visible: &HashSet<NodeId>,
    dropped: &mut HashSet<NodeId>,
) -> bool {
    let mut keeps_descendant = false;
    for child in el.children().filter_map(ElementRef::wrap) {
        if collect_dropped(child, visible, dropped) {
            keeps_descendant = true;
        }
    }
    match stamped_id(el) {
        Some(id) if !visible.contains(&id) && !keeps_descendant => {
            dropped.insert(id);
            false
        }
        _ => true,
    }
}

struct Writer {
    base: Option<Url>,
    /// `Some` in visible mode.
    dropped: Option<HashSet<NodeId>>,
    out: String,
}

impl Writer {
    fn new(base_url: &str, dropped: Option<HashSet<NodeId>>) -> Self {
        Writer {
            base: Url::parse(base_url).ok(),
            dropped,
            out: String::new(),
        }
    }

    fn write_document(&mut self, document: &Html) {
        self.write_element(document.root_element());
    }

    fn skips(&self, el: ElementRef<'_>) -> bool {
        let Some(dropped) = &self.dropped else {
            return false;
        };
        if el.value().name() == "head" {
            return true;
        }
        stamped_id(el).is_some_and(|id| dropped.contains(&id))
    }

    fn write_element(&mut self, el: ElementRef<'_>) {
        let name = el.value().name();
        self.out.push('<');
        self.out.push_str(name);
        for (attr, value) in el.value().attrs() {
            let value = if LINK_ATTRS.contains(&attr) {
                self.absolutize(value)
            } else if attr == "srcset" {
                self.absolutize_srcset(value)
            } else {
                value.to_string()
            };
            self.out.push(' ');
            self.out.push_str(attr);
            self.out.push_str("=\"");
            self.out.push_str(&escape_attr(&value));
            self.out.push('"');
        }
        self.out.push('>');

        if VOID_ELEMENTS.contains(&name) {
            return;
        }

        if !BLANKED_ELEMENTS.contains(&name) {
            for child in el.children() {
                match child.value() {
                    Node::Element(_) => {
                        if let Some(child_el) = ElementRef::wrap(child) {
                            if !self.skips(child_el) {
                                self.write_element(child_el);
                            }
                        }
                    }
                    Node::Text(text) => self.out.push_str(&escape_text(text)),
                    // comments, processing instructions, doctype
                    _ => {}
                }
            }
        }

        self.out.push_str("</");
        self.out.push_str(name);
        self.out.push('>');
    }

    fn absolutize(&self, value: &str) -> String {
        match &self.base {
            Some(base) => base
                .join(value.trim())
                .map(|u| u.to_string())
                .unwrap_or_else(|_| value.to_string()),
            None => value.to_string(),
        }
    }

    fn absolutize_srcset(&self, value: &str) -> String {
        value
            .split(',')
            .filter_map(|candidate| {
                let mut parts = candidate.split_whitespace();
                let url = parts.next()?;
                let mut rewritten = self.absolutize(url);
                for descriptor in parts {
                    rewritten.push(' ');
                    rewritten.push_str(descriptor);
                }
                Some(rewritten)
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}
