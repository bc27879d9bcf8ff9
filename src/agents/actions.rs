//! Agent actions and per-event outcome reporting

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What an agent decided to do in reaction to one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentActionKind {
    SendChatMessage,
    SendEmail,
    ReadEmail,
    CheckCalendar,
    JoinMeeting,
    LeaveMeeting,
    Think,
    Wait,
}

/// A single decided action. Produced once per tick by the protocol layer,
/// consumed by the host, never mutated by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentAction {
    pub kind: AgentActionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_entity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl AgentAction {
    /// The conservative default: do nothing.
    pub fn wait() -> Self {
        Self {
            kind: AgentActionKind::Wait,
            target_entity: None,
            content: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_content(kind: AgentActionKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            target_entity: None,
            content: Some(content.into()),
            metadata: HashMap::new(),
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target_entity = Some(target.into());
        self
    }

    pub fn with_metadata<K: Into<String>, V: Into<serde_json::Value>>(
        mut self,
        key: K,
        value: V,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// The scheduler's sole output artifact per processed event. Always
/// produced; failure is encoded in the value, never thrown past the tick
/// boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub action: AgentAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thought: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl ActionResult {
    /// Create a successful result
    pub fn completed(
        action: AgentAction,
        thought: Option<String>,
        response: Option<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            success: true,
            action,
            thought,
            response,
            error: None,
            duration_ms,
        }
    }

    /// Create a failed result; the agent waits.
    pub fn failure(error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            success: false,
            action: AgentAction::wait(),
            thought: None,
            response: None,
            error: Some(error.into()),
            duration_ms,
        }
    }
}
