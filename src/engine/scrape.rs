use std::collections::BTreeMap;

use serde_json::{Map, Value, json};
use tracing::{debug, info};

use crate::api::models::ScrapeResult;
use crate::browser::resolution::{Locator, NodeId, WindowHandle};
use crate::dom::highlights::{self, HighlightTarget};
use crate::engine::custom_function::{ActionName, CallId, CustomFunction, ExampleRecord};
use crate::engine::error::{ParsagonError, Result};
use crate::engine::executor::Executor;
use crate::engine::program::truthy;
use crate::engine::replay::ReplayArgs;
use crate::engine::resolver::{OperatorCommand, parse_operator_input};
use crate::engine::schema::{FieldType, field_label};
use crate::interaction::Tone;
use crate::trace::trace::RunEvent;

/// How the scrape for one call finds its nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScrapeMode {
    /// The operator clicks the nodes of every field
    Manual,
    /// The remote scraper picks nodes among `relevant` ones
    Inferred,
}

/// Nodes the operator marked, per field, plus any selector overrides.
#[derive(Debug, Default)]
struct FieldSelection {
    nodes: BTreeMap<String, Vec<Vec<NodeId>>>,
    css_selectors: BTreeMap<String, String>,
    xpath_selectors: BTreeMap<String, String>,
}

/// Reject inferred scrape results nothing can be built from.
pub fn check_scrape_result(schema: &Value, result: &ScrapeResult) -> Result<()> {
    let no_nodes = !truthy(&result.nodes);
    if no_nodes && !truthy(&result.data) {
        return Err(ParsagonError::NoDataFound {
            schema: schema.clone(),
        });
    }
    if no_nodes {
        return Err(ParsagonError::ImplausibleProgram {
            schema: schema.clone(),
            data: result.data.clone(),
        });
    }
    Ok(())
}

impl Executor {
    /// Extract data shaped like `schema` from the page in `window`.
    pub fn scrape_data(
        &mut self,
        schema: &Value,
        window: &WindowHandle,
        call_id: CallId,
    ) -> Result<Value> {
        self.focus(window)?;
        let description = schema.to_string();
        if let Some(data) = self.maybe_replay(call_id, &description, ReplayArgs::Scrape { schema })? {
            return Ok(data);
        }

        let mode = self.choose_scrape_mode(schema)?;
        self.stamp_and_inject()?;
        let html = self.get_scrape_html()?;
        let url = self.driver.current_url()?;

        let (data, nodes, selection) = match mode {
            ScrapeMode::Manual => {
                let selection = self.select_field_nodes(schema)?;
                self.ui.print(Tone::Browser, "Scraping data...");
                let nodes = json!(selection.nodes);
                let cleaned = self.assist.get_cleaned_data(&html, schema, &nodes)?;
                (cleaned.data, nodes, selection)
            }
            ScrapeMode::Inferred => {
                let relevant = self.relevant_node_ids()?;
                self.ui.print(Tone::Browser, "Scraping data...");
                let result = self.assist.scrape_page(&html, schema, &relevant)?;
                check_scrape_result(schema, &result)?;
                (result.data, result.nodes, FieldSelection::default())
            }
        };

        self.ui.print(
            Tone::Browser,
            &format!(
                "Scraped data:\n{}",
                serde_json::to_string_pretty(&data).unwrap_or_else(|_| data.to_string())
            ),
        );

        let mut arguments = Map::new();
        arguments.insert("schema".into(), schema.clone());
        let example = ExampleRecord::scrape(
            html,
            url,
            nodes,
            selection.css_selectors,
            selection.xpath_selectors,
            data.clone(),
        );
        self.record(
            call_id,
            CustomFunction::new(ActionName::ScrapeData, call_id, arguments, example),
        );
        self.log_event(
            RunEvent::now(ActionName::ScrapeData.as_str())
                .with_call_id(call_id)
                .with_window(window)
                .with_detail(if mode == ScrapeMode::Manual { "manual" } else { "inferred" }),
        );
        info!(%call_id, ?mode, "scraped data");
        Ok(data)
    }

    /// Inferred mode never asks. Otherwise the operator picks: ENTER to click
    /// fields by hand, INFER to let the scraper find them.
    fn choose_scrape_mode(&mut self, schema: &Value) -> Result<ScrapeMode> {
        if self.config.infer {
            return Ok(ScrapeMode::Inferred);
        }
        let mut answer = self.ui.ask(&format!(
            "Now determining what elements to scrape to collect data in the format {}. Hit ENTER to continue by clicking on the elements to scrape, or type a valid command:",
            schema
        ))?;
        loop {
            match parse_operator_input(&answer) {
                OperatorCommand::Infer => return Ok(ScrapeMode::Inferred),
                _ if answer.trim().is_empty() => return Ok(ScrapeMode::Manual),
                _ => answer = self.ui.ask("Hit ENTER or type \"INFER\":")?,
            }
        }
    }

    /// Nodes the remote scraper may draw from.
    fn relevant_node_ids(&mut self) -> Result<Vec<NodeId>> {
        if self.config.infer {
            return self.visible_node_ids();
        }
        highlights::setup(self.driver.as_mut(), HighlightTarget::Action, None)?;
        self.ui.ask(
            "Click on the element(s) from which data should be inferred. Hit ENTER when done:",
        )?;
        self.stamp()?;
        let ids = highlights::selected_subtree_ids(self.driver.as_mut())?;
        highlights::cleanup(self.driver.as_mut())?;
        if ids.is_empty() {
            return self.visible_node_ids();
        }
        Ok(ids)
    }

    /// Highlight and collect the nodes of each schema field in turn.
    fn select_field_nodes(&mut self, schema: &Value) -> Result<FieldSelection> {
        let fields = self.assist.get_schema_fields(schema)?;
        let mut selection = FieldSelection::default();

        for (field, raw_type) in fields {
            let Some(field_type) = raw_type.as_str().and_then(FieldType::parse) else {
                debug!(%field, %raw_type, "skipping field without a selectable type");
                continue;
            };
            highlights::setup(self.driver.as_mut(), field_type.highlight_target(), None)?;
            let answer = self.ui.ask(&format!(
                "Click elements containing data for the field `{}`. Hit DELETE/BACKSPACE to clear selections. Hit ENTER when done:",
                field_label(&field)
            ))?;
            self.stamp()?;

            let ids = match parse_operator_input(&answer) {
                OperatorCommand::Css(selector) => {
                    let ids = self.driver.find_node_ids(&Locator::Css(selector.clone()))?;
                    selection.css_selectors.insert(field.clone(), selector);
                    ids
                }
                OperatorCommand::Xpath(selector) => {
                    let ids = self.driver.find_node_ids(&Locator::Xpath(selector.clone()))?;
                    selection.xpath_selectors.insert(field.clone(), selector);
                    ids
                }
                _ => highlights::selected_node_ids(self.driver.as_mut())?,
            };
            highlights::cleanup(self.driver.as_mut())?;

            debug!(%field, count = ids.len(), "field nodes selected");
            selection
                .nodes
                .insert(field, ids.into_iter().map(|id| vec![id]).collect());
        }
        Ok(selection)
    }
}
