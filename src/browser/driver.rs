use serde_json::Value;

use crate::browser::resolution::{Locator, NodeId, WindowHandle};
use crate::engine::error::Result;

/// Browser automation capability the engine is written against.
///
/// Element-level operations address nodes by their stamped [`NodeId`], so
/// the implementation only needs to find `[data-psgn-id="N"]`.
pub trait BrowserDriver: Send {
    fn window_handles(&mut self) -> Result<Vec<WindowHandle>>;

    fn current_window(&mut self) -> Result<WindowHandle>;

    fn switch_to_window(&mut self, handle: &WindowHandle) -> Result<()>;

    /// Open a new tab, focus it, and return its handle.
    fn new_tab(&mut self) -> Result<WindowHandle>;

    /// Close the focused window. Focus is left undefined.
    fn close_current_window(&mut self) -> Result<()>;

    fn navigate(&mut self, url: &str) -> Result<()>;

    fn current_url(&mut self) -> Result<String>;

    fn page_source(&mut self) -> Result<String>;

    fn execute_script(&mut self, script: &str, args: &[Value]) -> Result<Value>;

    fn click(&mut self, node: NodeId) -> Result<()>;

    /// Clear the field, type `text`, optionally finish with Enter.
    fn type_text(&mut self, node: NodeId, text: &str, enter: bool) -> Result<()>;

    /// Choose an option of a `<select>` by its visible label.
    fn select_option(&mut self, node: NodeId, label: &str) -> Result<()>;

    /// Send a named key (`ENTER`, `PAGE_DOWN`, ...) to the focused element.
    fn press_key(&mut self, key: &str) -> Result<()>;

    fn element_text(&mut self, node: NodeId) -> Result<String>;

    fn find_node_ids(&mut self, locator: &Locator) -> Result<Vec<NodeId>>;

    fn quit(&mut self) -> Result<()>;
}
