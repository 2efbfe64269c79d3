use std::time::Duration;

use serde_json::{Map, Value, json};
use sha1::{Digest, Sha1};
use tracing::{debug, info};

use crate::api::models::ElementKind;
use crate::browser::driver::BrowserDriver;
use crate::browser::resolution::{ElementResolution, NodeId, WindowHandle};
use crate::engine::custom_function::{ActionName, CallId, CustomFunction, ExampleRecord};
use crate::engine::error::{ParsagonError, Result};
use crate::engine::executor::Executor;
use crate::engine::program::truthy;
use crate::engine::replay::ReplayArgs;
use crate::interaction::Tone;
use crate::trace::trace::RunEvent;

pub const INNER_TEXT_SCRIPT: &str = "return document.body.innerText;";

/// Scroll to `arguments[0]` of the page width and `arguments[1]` of its height, both fractions.
pub const SCROLL_SCRIPT: &str = "window.scrollTo({\
     left: arguments[0] * document.documentElement.scrollWidth, \
     top: arguments[1] * document.documentElement.scrollHeight, \
     behavior: 'smooth'});";

pub const DEFAULT_ASSERT_MESSAGE: &str = "Web page interaction failed.";

/// Stable fingerprint of a page source.
pub fn text_fingerprint(text: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Static description of one resolver-driven interaction.
struct Interaction<'a> {
    name: ActionName,
    call_id: CallId,
    description: &'a str,
    kind: ElementKind,
    arguments: Map<String, Value>,
}

/// A resolved element and the page it was resolved on.
struct Target {
    resolution: ElementResolution,
    html: String,
    url: String,
}

impl Executor {
    /// Navigate `window` (or a new tab when it is gone) and return the
    /// handle the page ended up in.
    pub fn goto(&mut self, url: &str, window: Option<&WindowHandle>) -> Result<WindowHandle> {
        let handles = self.driver.window_handles()?;
        let handle = match window {
            Some(w) if handles.contains(w) => {
                self.driver.switch_to_window(w)?;
                w.clone()
            }
            _ => {
                let handle = self.driver.new_tab()?;
                self.sessions.open(handle.clone());
                handle
            }
        };

        self.ui.print(Tone::Browser, &format!("Going to {}", url));
        self.driver.navigate(url)?;
        self.pause(self.config.load_wait);
        self.stamp_and_inject()?;

        info!(%url, window = %handle, "navigated");
        self.log_event(
            RunEvent::now(ActionName::Goto.as_str())
                .with_window(&handle)
                .with_detail(url),
        );
        Ok(handle)
    }

    pub fn close_window(&mut self, window: &WindowHandle) -> Result<()> {
        self.focus(window)?;
        self.driver.close_current_window()?;
        self.sessions.close(window);
        if let Some(last) = self.driver.window_handles()?.last() {
            self.driver.switch_to_window(last)?;
        }
        self.log_event(RunEvent::now("close_window").with_window(window));
        Ok(())
    }

    pub fn click_elem(
        &mut self,
        description: &str,
        window: &WindowHandle,
        call_id: CallId,
    ) -> Result<bool> {
        self.focus(window)?;
        if let Some(result) = self.maybe_replay(call_id, description, ReplayArgs::Click)? {
            return Ok(truthy(&result));
        }
        self.interact(
            Interaction {
                name: ActionName::ClickElem,
                call_id,
                description,
                kind: ElementKind::Button,
                arguments: Map::new(),
            },
            |driver, node| driver.click(node),
        )
    }

    /// Click a pagination control. False when the click failed or the page
    /// source did not change.
    pub fn click_next_page(
        &mut self,
        description: &str,
        window: &WindowHandle,
        call_id: CallId,
        wait: f64,
    ) -> Result<bool> {
        self.focus(window)?;
        if let Some(result) =
            self.maybe_replay(call_id, description, ReplayArgs::ClickNextPage { wait })?
        {
            return Ok(truthy(&result));
        }

        let target = self.resolve_target(description, ElementKind::Button)?;
        let before = text_fingerprint(&self.driver.page_source()?);
        let clicked = self.perform(
            ActionName::ClickNextPage.as_str(),
            target.resolution.node_id(),
            |driver, node| driver.click(node),
        )?;
        self.finish_interaction(
            Interaction {
                name: ActionName::ClickNextPage,
                call_id,
                description,
                kind: ElementKind::Button,
                arguments: Map::new(),
            },
            target,
            clicked,
        )?;
        if !clicked {
            return Ok(false);
        }
        self.pause(seconds(wait));
        let after = text_fingerprint(&self.driver.page_source()?);
        debug!(%before, %after, "page fingerprints around next-page click");
        Ok(before != after)
    }

    pub fn fill_input(
        &mut self,
        description: &str,
        text: &str,
        enter: bool,
        window: &WindowHandle,
        call_id: CallId,
    ) -> Result<bool> {
        self.focus(window)?;
        if let Some(result) =
            self.maybe_replay(call_id, description, ReplayArgs::Fill { text, enter })?
        {
            return Ok(truthy(&result));
        }

        let mut arguments = Map::new();
        arguments.insert("text".into(), json!(text));
        arguments.insert("enter".into(), json!(enter));
        self.interact(
            Interaction {
                name: ActionName::FillInput,
                call_id,
                description,
                kind: ElementKind::Input,
                arguments,
            },
            |driver, node| driver.type_text(node, text, enter),
        )
    }

    pub fn select_option(
        &mut self,
        description: &str,
        option: &str,
        window: &WindowHandle,
        call_id: CallId,
    ) -> Result<bool> {
        self.focus(window)?;
        if let Some(result) =
            self.maybe_replay(call_id, description, ReplayArgs::Select { option })?
        {
            return Ok(truthy(&result));
        }

        let mut arguments = Map::new();
        arguments.insert("option".into(), json!(option));
        self.interact(
            Interaction {
                name: ActionName::SelectOption,
                call_id,
                description,
                kind: ElementKind::Select,
                arguments,
            },
            |driver, node| driver.select_option(node, option),
        )
    }

    /// Scroll to a percentage of the page size.
    pub fn scroll(&mut self, x: f64, y: f64, window: &WindowHandle) -> Result<()> {
        self.focus(window)?;
        self.ui.print(
            Tone::Browser,
            &format!(
                "Scrolling {}% to the left and {}% down",
                x * 100.0,
                y * 100.0
            ),
        );
        self.driver.execute_script(SCROLL_SCRIPT, &[json!(x), json!(y)])?;
        self.pause(self.config.settle / 2);
        self.stamp()?;
        self.log_event(
            RunEvent::now("scroll")
                .with_window(window)
                .with_detail(format!("{},{}", x, y)),
        );
        Ok(())
    }

    pub fn press_key(&mut self, key: &str, window: &WindowHandle) -> Result<()> {
        self.focus(window)?;
        self.ui.print(Tone::Browser, &format!("Pressing {}", key));
        self.driver.press_key(key)?;
        self.pause(self.config.settle / 2);
        self.log_event(RunEvent::now("press_key").with_window(window).with_detail(key));
        Ok(())
    }

    pub fn wait(&mut self, secs: f64) -> Result<()> {
        self.ui
            .print(Tone::Browser, &format!("Waiting {} seconds", secs));
        self.pause(seconds(secs));
        self.stamp_and_inject()?;
        self.log_event(RunEvent::now("wait").with_detail(secs));
        Ok(())
    }

    pub fn get_inner_text(&mut self, window: &WindowHandle) -> Result<String> {
        self.focus(window)?;
        let text = self.driver.execute_script(INNER_TEXT_SCRIPT, &[])?;
        Ok(text.as_str().unwrap_or_default().to_string())
    }

    pub fn custom_assert(&self, value: &Value, message: Option<&str>) -> Result<()> {
        if truthy(value) {
            return Ok(());
        }
        let message = message.unwrap_or(DEFAULT_ASSERT_MESSAGE);
        self.ui.print(Tone::Error, message);
        Err(ParsagonError::AssertionFailed(message.to_string()))
    }

    /// Resolve, snapshot, act, re-stamp, record.
    fn interact<F>(&mut self, interaction: Interaction<'_>, op: F) -> Result<bool>
    where
        F: FnMut(&mut dyn BrowserDriver, NodeId) -> Result<()>,
    {
        let target = self.resolve_target(interaction.description, interaction.kind)?;
        let success = self.perform(interaction.name.as_str(), target.resolution.node_id(), op)?;
        self.finish_interaction(interaction, target, success)?;
        Ok(success)
    }

    /// Resolve the element and capture the page as it is before acting.
    fn resolve_target(&mut self, description: &str, kind: ElementKind) -> Result<Target> {
        let resolution = self.get_elem(description, kind)?;
        let html = self.get_scrape_html()?;
        let url = self.driver.current_url()?;
        Ok(Target {
            resolution,
            html,
            url,
        })
    }

    fn finish_interaction(
        &mut self,
        interaction: Interaction<'_>,
        target: Target,
        success: bool,
    ) -> Result<()> {
        let Interaction {
            name,
            call_id,
            description,
            arguments,
            ..
        } = interaction;
        let example = ExampleRecord::element(target.html, target.url, &target.resolution);
        self.record(
            call_id,
            CustomFunction::new(name, call_id, arguments, example),
        );
        let window = self.driver.current_window()?;
        self.log_event(
            RunEvent::now(name.as_str())
                .with_call_id(call_id)
                .with_window(&window)
                .with_success(success)
                .with_detail(description),
        );
        Ok(())
    }

    /// Run `op` on `node` with retries; on success let the page settle and
    /// stamp whatever appeared.
    pub(crate) fn perform<F>(&mut self, label: &str, node: Option<NodeId>, mut op: F) -> Result<bool>
    where
        F: FnMut(&mut dyn BrowserDriver, NodeId) -> Result<()>,
    {
        let Some(node) = node else {
            self.ui.print(Tone::Error, "No element to interact with");
            return Ok(false);
        };
        let success = self.with_retries(label, |driver| op(driver, node));
        if success {
            self.pause(self.config.settle);
            self.stamp_and_inject()?;
        } else {
            self.ui
                .print(Tone::Error, &format!("Failed to {} on element {}", label, node));
        }
        Ok(success)
    }
}

/// Join text fragments with a blank line between them.
pub fn join_text(items: &[String]) -> String {
    items.join("\n\n")
}

pub(crate) fn seconds(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::ZERO)
}
