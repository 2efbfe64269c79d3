use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use regex::{Captures, Regex};
use scraper::{ElementRef, Html, Selector};
use serde_json::{Value, json};

use parsagon::browser::driver::BrowserDriver;
use parsagon::browser::resolution::{Locator, NODE_ID_ATTR, NodeId, WindowHandle};
use parsagon::dom::highlights::{
    CLEANUP_SCRIPT, HIGHLIGHTS_SCRIPT, SELECTED_IDS_SCRIPT, SELECTED_WITH_DESCENDANTS_SCRIPT,
    SETUP_SCRIPT,
};
use parsagon::dom::identifier::{STAMP_SCRIPT, VISIBLE_IDS_SCRIPT};
use parsagon::engine::actions::{INNER_TEXT_SCRIPT, SCROLL_SCRIPT};
use parsagon::engine::error::{ParsagonError, Result};

pub const BLANK_PAGE: &str = "<html><head></head><body></body></html>";

pub struct FakeWindow {
    pub handle: WindowHandle,
    pub url: String,
    pub source: String,
}

/// Everything the fake browser knows, shared with the test through an Arc.
#[derive(Default)]
pub struct BrowserState {
    pub windows: Vec<FakeWindow>,
    pub current: usize,
    /// Served on navigation, keyed by URL
    pub pages: HashMap<String, String>,
    /// Clicking the node loads the URL into the current window
    pub click_targets: HashMap<u64, String>,
    /// Next operator selections, one per highlighter setup
    pub selections: VecDeque<Vec<u64>>,
    pub selected: Vec<u64>,
    pub fail_interactions: bool,
    pub actions: Vec<String>,
    pub injections: usize,
    pub setups: Vec<Value>,
    pub quits: usize,
    tabs_opened: usize,
}

impl BrowserState {
    fn window(&self) -> Result<&FakeWindow> {
        self.windows
            .get(self.current)
            .ok_or_else(|| ParsagonError::SessionIO("no current window".into()))
    }

    fn window_mut(&mut self) -> Result<&mut FakeWindow> {
        self.windows
            .get_mut(self.current)
            .ok_or_else(|| ParsagonError::SessionIO("no current window".into()))
    }

    fn load(&mut self, url: &str) -> Result<()> {
        let source = self
            .pages
            .get(url)
            .cloned()
            .unwrap_or_else(|| BLANK_PAGE.to_string());
        let window = self.window_mut()?;
        window.url = url.to_string();
        window.source = source;
        Ok(())
    }
}

#[derive(Clone)]
pub struct FakeBrowser {
    pub state: Arc<Mutex<BrowserState>>,
}

impl FakeBrowser {
    /// One blank window called `main`.
    pub fn new() -> Self {
        let state = BrowserState {
            windows: vec![FakeWindow {
                handle: WindowHandle::from("main"),
                url: "about:blank".into(),
                source: BLANK_PAGE.into(),
            }],
            ..BrowserState::default()
        };
        FakeBrowser {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn with_page(self, url: &str, html: &str) -> Self {
        self.state().pages.insert(url.to_string(), html.to_string());
        self
    }

    pub fn state(&self) -> MutexGuard<'_, BrowserState> {
        self.state.lock().unwrap()
    }

    /// Queue the nodes the operator "clicks" at the next selection prompt.
    pub fn queue_selection(&self, ids: &[u64]) {
        self.state().selections.push_back(ids.to_vec());
    }

    pub fn current_source(&self) -> String {
        let state = self.state();
        state.windows[state.current].source.clone()
    }

    pub fn boxed(&self) -> Box<dyn BrowserDriver> {
        Box::new(self.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, BrowserState>> {
        self.state
            .lock()
            .map_err(|_| ParsagonError::SessionIO("fake browser poisoned".into()))
    }
}

/// Give every unstamped start tag the next id. Returns the new counter.
pub fn stamp_source(source: &str, start: u64) -> (String, u64) {
    let tag = Regex::new(r"<([a-zA-Z][a-zA-Z0-9-]*)([^>]*)>").unwrap();
    let mut next = start;
    let stamped = tag.replace_all(source, |caps: &Captures| {
        if caps[2].contains(NODE_ID_ATTR) {
            return caps[0].to_string();
        }
        let out = format!("<{} {}=\"{}\"{}>", &caps[1], NODE_ID_ATTR, next, &caps[2]);
        next += 1;
        out
    });
    (stamped.into_owned(), next)
}

fn ids_matching(source: &str, selector: &str) -> Vec<u64> {
    let Ok(selector) = Selector::parse(selector) else {
        return vec![];
    };
    Html::parse_document(source)
        .select(&selector)
        .filter_map(|el| el.value().attr(NODE_ID_ATTR))
        .filter_map(|raw| raw.parse().ok())
        .collect()
}

fn hidden(el: ElementRef<'_>) -> bool {
    std::iter::once(el)
        .chain(el.ancestors().filter_map(ElementRef::wrap))
        .any(|e| e.value().classes().any(|c| c == "invisible"))
}

fn as_strings(ids: &[u64]) -> Value {
    json!(ids.iter().map(|id| id.to_string()).collect::<Vec<_>>())
}

impl BrowserDriver for FakeBrowser {
    fn window_handles(&mut self) -> Result<Vec<WindowHandle>> {
        Ok(self.lock()?.windows.iter().map(|w| w.handle.clone()).collect())
    }

    fn current_window(&mut self) -> Result<WindowHandle> {
        Ok(self.lock()?.window()?.handle.clone())
    }

    fn switch_to_window(&mut self, handle: &WindowHandle) -> Result<()> {
        let mut state = self.lock()?;
        let index = state
            .windows
            .iter()
            .position(|w| &w.handle == handle)
            .ok_or_else(|| ParsagonError::SessionProtocol {
                command: "switch_window".into(),
                error: format!("no such window {}", handle),
            })?;
        state.current = index;
        Ok(())
    }

    fn new_tab(&mut self) -> Result<WindowHandle> {
        let mut state = self.lock()?;
        state.tabs_opened += 1;
        let handle = WindowHandle(format!("tab-{}", state.tabs_opened));
        state.windows.push(FakeWindow {
            handle: handle.clone(),
            url: "about:blank".into(),
            source: BLANK_PAGE.into(),
        });
        state.current = state.windows.len() - 1;
        Ok(handle)
    }

    fn close_current_window(&mut self) -> Result<()> {
        let mut state = self.lock()?;
        let current = state.current;
        state.windows.remove(current);
        state.current = state.windows.len().saturating_sub(1);
        Ok(())
    }

    fn navigate(&mut self, url: &str) -> Result<()> {
        let mut state = self.lock()?;
        state.actions.push(format!("navigate {}", url));
        state.load(url)
    }

    fn current_url(&mut self) -> Result<String> {
        Ok(self.lock()?.window()?.url.clone())
    }

    fn page_source(&mut self) -> Result<String> {
        Ok(self.lock()?.window()?.source.clone())
    }

    fn execute_script(&mut self, script: &str, args: &[Value]) -> Result<Value> {
        let mut state = self.lock()?;
        if script == STAMP_SCRIPT {
            let start = args.first().and_then(Value::as_u64).unwrap_or(0);
            let (stamped, next) = stamp_source(&state.window()?.source, start);
            state.window_mut()?.source = stamped;
            return Ok(json!(next));
        }
        if script == VISIBLE_IDS_SCRIPT {
            let html = Html::parse_document(&state.window()?.source);
            let selector = Selector::parse(&format!("[{}]", NODE_ID_ATTR)).unwrap();
            let ids: Vec<Value> = html
                .select(&selector)
                .filter(|el| !hidden(*el))
                .filter_map(|el| el.value().attr(NODE_ID_ATTR))
                .map(|raw| json!(raw))
                .collect();
            return Ok(Value::Array(ids));
        }
        if script == HIGHLIGHTS_SCRIPT {
            state.injections += 1;
            return Ok(Value::Null);
        }
        if script == SETUP_SCRIPT {
            state.setups.push(json!(args));
            state.selected = state.selections.pop_front().unwrap_or_default();
            return Ok(Value::Null);
        }
        if script == CLEANUP_SCRIPT {
            state.selected.clear();
            return Ok(Value::Null);
        }
        if script == SELECTED_IDS_SCRIPT {
            return Ok(as_strings(&state.selected));
        }
        if script == SELECTED_WITH_DESCENDANTS_SCRIPT {
            let source = state.window()?.source.clone();
            let mut ids = Vec::new();
            for id in &state.selected {
                ids.push(*id);
                let under = format!("[{}=\"{}\"] *", NODE_ID_ATTR, id);
                ids.extend(ids_matching(&source, &under));
            }
            return Ok(as_strings(&ids));
        }
        if script == INNER_TEXT_SCRIPT {
            let html = Html::parse_document(&state.window()?.source);
            let body = Selector::parse("body").unwrap();
            let text = html
                .select(&body)
                .next()
                .map(|b| b.text().collect::<String>())
                .unwrap_or_default();
            return Ok(json!(text.trim()));
        }
        if script == SCROLL_SCRIPT {
            state.actions.push(format!("scroll {} {}", args[0], args[1]));
            return Ok(Value::Null);
        }
        Ok(Value::Null)
    }

    fn click(&mut self, node: NodeId) -> Result<()> {
        let mut state = self.lock()?;
        if state.fail_interactions {
            return Err(ParsagonError::SessionProtocol {
                command: "click".into(),
                error: "element not interactable".into(),
            });
        }
        state.actions.push(format!("click {}", node));
        if let Some(url) = state.click_targets.get(&node.0).cloned() {
            state.load(&url)?;
        }
        Ok(())
    }

    fn type_text(&mut self, node: NodeId, text: &str, enter: bool) -> Result<()> {
        let mut state = self.lock()?;
        if state.fail_interactions {
            return Err(ParsagonError::SessionProtocol {
                command: "type_text".into(),
                error: "element not interactable".into(),
            });
        }
        state.actions.push(format!("type {} {} {}", node, text, enter));
        Ok(())
    }

    fn select_option(&mut self, node: NodeId, label: &str) -> Result<()> {
        self.lock()?.actions.push(format!("select {} {}", node, label));
        Ok(())
    }

    fn press_key(&mut self, key: &str) -> Result<()> {
        self.lock()?.actions.push(format!("key {}", key));
        Ok(())
    }

    fn element_text(&mut self, node: NodeId) -> Result<String> {
        let state = self.lock()?;
        let html = Html::parse_document(&state.window()?.source);
        let selector = Selector::parse(&format!("[{}=\"{}\"]", NODE_ID_ATTR, node)).unwrap();
        Ok(html
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<String>())
            .unwrap_or_default())
    }

    fn find_node_ids(&mut self, locator: &Locator) -> Result<Vec<NodeId>> {
        let state = self.lock()?;
        match locator {
            Locator::Css(selector) => Ok(ids_matching(&state.window()?.source, selector)
                .into_iter()
                .map(NodeId)
                .collect()),
            Locator::Xpath(_) => Ok(vec![]),
        }
    }

    fn quit(&mut self) -> Result<()> {
        self.lock()?.quits += 1;
        Ok(())
    }
}
