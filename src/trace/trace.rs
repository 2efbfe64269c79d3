use serde::{Deserialize, Serialize};

use crate::browser::resolution::WindowHandle;
use crate::engine::custom_function::CallId;

/// One executed action, as written to the run log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunEvent {
    pub timestamp_ms: i64,
    pub action: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<CallId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<String>,

    /// `None` for actions that cannot fail softly
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replayed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl RunEvent {
    pub fn now(action: &str) -> Self {
        Self {
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            action: action.to_string(),
            call_id: None,
            window: None,
            success: None,
            replayed: None,
            detail: None,
        }
    }

    pub fn with_call_id(mut self, call_id: CallId) -> Self {
        self.call_id = Some(call_id);
        self
    }

    pub fn with_window(mut self, window: &WindowHandle) -> Self {
        self.window = Some(window.to_string());
        self
    }

    pub fn with_success(mut self, success: bool) -> Self {
        self.success = Some(success);
        self
    }

    pub fn replayed(mut self) -> Self {
        self.replayed = Some(true);
        self
    }

    pub fn with_detail(mut self, detail: impl ToString) -> Self {
        self.detail = Some(detail.to_string());
        self
    }
}
