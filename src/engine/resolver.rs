use tracing::debug;

use crate::api::models::ElementKind;
use crate::browser::resolution::{ElementResolution, Locator};
use crate::dom::highlights::{self, HighlightTarget};
use crate::engine::error::{ParsagonError, Result};
use crate::engine::executor::Executor;
use crate::interaction::Tone;

/// What the operator typed at a selection prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    /// Plain ENTER (or any other text): use the clicked elements
    Confirm,
    NotApplicable,
    Infer,
    Css(String),
    Xpath(String),
}

pub fn parse_operator_input(raw: &str) -> OperatorCommand {
    let text = raw.trim();
    if text.eq_ignore_ascii_case("N/A") {
        OperatorCommand::NotApplicable
    } else if text.eq_ignore_ascii_case("INFER") {
        OperatorCommand::Infer
    } else if let Some(selector) = strip_prefix_ci(text, "CSS:") {
        OperatorCommand::Css(selector.trim().to_string())
    } else if let Some(selector) = strip_prefix_ci(text, "XPATH:") {
        OperatorCommand::Xpath(selector.trim().to_string())
    } else {
        OperatorCommand::Confirm
    }
}

fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &text[prefix.len()..])
}

impl OperatorCommand {
    fn bypasses_selection(&self) -> bool {
        !matches!(self, OperatorCommand::Confirm | OperatorCommand::Infer)
    }
}

impl Executor {
    /// Resolve `description` to a concrete element on the focused page.
    pub fn get_elem(&mut self, description: &str, kind: ElementKind) -> Result<ElementResolution> {
        let resolution = if self.config.infer {
            self.get_elem_by_description(description, kind)?
        } else {
            self.get_elem_interactively(description)?
        };
        debug!(description, ?resolution, "resolved element");
        Ok(resolution)
    }

    fn get_elem_interactively(&mut self, description: &str) -> Result<ElementResolution> {
        self.stamp_and_inject()?;
        highlights::setup(self.driver.as_mut(), HighlightTarget::Action, Some(1))?;

        let mut command = parse_operator_input(&self.ui.ask(&format!(
            "Click the element referred to by \"{}\". Hit ENTER to confirm your selection, or type \"N/A\" if the element does not exist:",
            description
        ))?);
        self.stamp()?;
        let mut selected = highlights::selected_node_ids(self.driver.as_mut())?;
        while !command.bypasses_selection() && selected.is_empty() {
            command =
                parse_operator_input(&self.ui.ask("Please click an element or type \"N/A\":")?);
            self.stamp()?;
            selected = highlights::selected_node_ids(self.driver.as_mut())?;
        }
        highlights::cleanup(self.driver.as_mut())?;

        let resolution = match command {
            OperatorCommand::NotApplicable => ElementResolution::NotFound,
            OperatorCommand::Css(selector) => {
                let matched = self
                    .driver
                    .find_node_ids(&Locator::Css(selector.clone()))?
                    .first()
                    .copied();
                ElementResolution::CssSelector { selector, matched }
            }
            OperatorCommand::Xpath(selector) => {
                let matched = self
                    .driver
                    .find_node_ids(&Locator::Xpath(selector.clone()))?
                    .first()
                    .copied();
                ElementResolution::XpathSelector { selector, matched }
            }
            OperatorCommand::Confirm | OperatorCommand::Infer => match selected.first() {
                Some(id) => ElementResolution::NodeId { id: *id },
                None => ElementResolution::NotFound,
            },
        };
        Ok(resolution)
    }

    fn get_elem_by_description(
        &mut self,
        description: &str,
        kind: ElementKind,
    ) -> Result<ElementResolution> {
        self.ui.print(
            Tone::Browser,
            &format!(
                "Looking for {}: \"{}\"",
                kind.as_str().to_lowercase(),
                description
            ),
        );
        self.stamp()?;
        let visible_html = self.get_visible_html()?;
        let id = self
            .assist
            .get_interaction_element_id(&visible_html, kind, description)?
            .ok_or_else(|| ParsagonError::ElementNotFound {
                description: description.to_string(),
            })?;

        if self.driver.find_node_ids(&Locator::Css(id.css()))?.is_empty() {
            debug!(node = %id, "suggested element is not on the page");
            return Err(ParsagonError::ElementNotFound {
                description: description.to_string(),
            });
        }

        let text = self.driver.element_text(id)?;
        let text = text.trim();
        let found = if text.is_empty() {
            "Found element".to_string()
        } else {
            format!("Found element with text \"{}\"", text)
        };
        self.ui.print(Tone::Browser, &found);
        Ok(ElementResolution::NodeId { id })
    }
}

