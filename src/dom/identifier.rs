use std::collections::HashMap;

use serde_json::json;
use tracing::debug;

use crate::browser::driver::BrowserDriver;
use crate::browser::resolution::WindowHandle;
use crate::engine::error::{ParsagonError, Result};

/// Stamps every unstamped node with the next id, continuing from
/// `arguments[0]`, and returns the new counter. Images also get their
/// container size for the scraping heuristics.
pub const STAMP_SCRIPT: &str = r#"
let elemIdx = arguments[0];
for (const node of document.all) {
    if (node.hasAttribute('data-psgn-id')) { continue; }
    node.setAttribute('data-psgn-id', elemIdx);
    elemIdx++;
}
for (const image of document.images) {
    const parent = image.parentElement;
    image.setAttribute('data-psgn-width', parent ? parent.offsetWidth : -1);
    image.setAttribute('data-psgn-height', parent ? parent.offsetHeight : -1);
}
return elemIdx;
"#;

/// Ids of stamped elements that pass the visibility predicate.
pub const VISIBLE_IDS_SCRIPT: &str = r#"
return Array.from(document.querySelectorAll('[data-psgn-id]')).filter((elem) => {
    const style = getComputedStyle(elem);
    return style.opacity > 0.1
        && style.display !== 'none'
        && style.visibility === 'visible'
        && elem.offsetWidth && elem.offsetHeight
        && elem.getClientRects().length;
}).map((elem) => elem.getAttribute('data-psgn-id'));
"#;

/// Per-window id counter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowSession {
    /// Next id to hand out; every id below it has been assigned.
    next_id: u64,
}

impl WindowSession {
    pub fn next_id(&self) -> u64 {
        self.next_id
    }
}

/// Owns one [`WindowSession`] per open browser window.
#[derive(Debug, Default)]
pub struct SessionManager {
    sessions: HashMap<WindowHandle, WindowSession>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly opened window.
    pub fn open(&mut self, handle: WindowHandle) -> &mut WindowSession {
        self.sessions.entry(handle).or_default()
    }

    /// Forget a closed window.
    pub fn close(&mut self, handle: &WindowHandle) -> Option<WindowSession> {
        self.sessions.remove(handle)
    }

    pub fn get(&self, handle: &WindowHandle) -> Option<&WindowSession> {
        self.sessions.get(handle)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Stamp the focused window and return its new counter.
    ///
    /// Windows the manager has not seen (the browser's initial tab) are
    /// registered on first stamp. The counter never decreases.
    pub fn stamp(&mut self, driver: &mut dyn BrowserDriver) -> Result<u64> {
        let handle = driver.current_window()?;
        let start = self.sessions.get(&handle).map(|s| s.next_id).unwrap_or(0);

        let result = driver.execute_script(STAMP_SCRIPT, &[json!(start)])?;
        let stamped = result.as_u64().ok_or_else(|| ParsagonError::SessionProtocol {
            command: "stamp".into(),
            error: format!("expected an integer counter, got {}", result),
        })?;

        let session = self.open(handle.clone());
        session.next_id = session.next_id.max(stamped);
        debug!(window = %handle, from = start, to = session.next_id, "stamped node ids");
        Ok(session.next_id)
    }
}
