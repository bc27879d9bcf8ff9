//! Reply parsing and action classification
//! The backend's output format is not contractually guaranteed, so parsing
//! is lenient and classification defaults to doing nothing.

use serde_json::json;

use crate::ai::{ToolInvocation, ToolSpec};
use crate::core::utils::clean_model_reply;

use super::actions::{AgentAction, AgentActionKind};
use super::events::ScheduledEvent;

const CLARIFY_FALLBACK: &str = "Could you clarify what you need from me?";

/// The three labeled fields extracted from a raw model reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReactReply {
    pub thought: String,
    pub action: String,
    pub response: String,
}

/// Lenient extraction: a missing field yields an empty string, never an
/// error.
pub fn parse_react_reply(raw: &str) -> ReactReply {
    let cleaned = clean_model_reply(raw);
    ReactReply {
        thought: extract_field(cleaned, "thought:"),
        action: extract_field(cleaned, "action:"),
        response: extract_field(cleaned, "response:"),
    }
}

const FIELD_LABELS: [&str; 3] = ["thought:", "action:", "response:"];

fn extract_field(text: &str, label: &str) -> String {
    let mut collected: Vec<&str> = Vec::new();
    let mut capturing = false;
    for line in text.lines() {
        let trimmed = line.trim();
        let lower = trimmed.to_ascii_lowercase();
        if let Some(matched) = FIELD_LABELS.iter().find(|l| lower.starts_with(*l)) {
            if capturing {
                break;
            }
            if *matched == label {
                capturing = true;
                collected.push(trimmed[matched.len()..].trim_start());
            }
            continue;
        }
        if capturing {
            collected.push(trimmed);
        }
    }
    collected.join("\n").trim().to_string()
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn chat_target(event: &ScheduledEvent) -> Option<String> {
    event
        .payload
        .get("channel_name")
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

fn sender_target(event: &ScheduledEvent) -> Option<String> {
    event
        .payload
        .get("sender_name")
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

/// Ordered keyword matching over the free-text `Action:` field. The order
/// and the `wait` default are deliberate: when uncertain, the agent does
/// nothing rather than acting incorrectly.
pub fn classify_action(reply: &ReactReply, event: &ScheduledEvent) -> AgentAction {
    let action_text = reply.action.to_ascii_lowercase();
    let response = non_empty(&reply.response);

    if action_text.contains("respond") {
        AgentAction {
            kind: AgentActionKind::SendChatMessage,
            target_entity: chat_target(event),
            content: response,
            metadata: Default::default(),
        }
    } else if action_text.contains("email") {
        AgentAction {
            kind: AgentActionKind::SendEmail,
            target_entity: sender_target(event),
            content: response,
            metadata: Default::default(),
        }
    } else if action_text.contains("ignore") {
        AgentAction::wait()
    } else if action_text.contains("delegate") {
        AgentAction::wait()
            .with_metadata("delegated", true)
            .with_metadata("note", reply.action.clone())
    } else if action_text.contains("clarify") {
        AgentAction {
            kind: AgentActionKind::SendChatMessage,
            target_entity: chat_target(event),
            content: Some(response.unwrap_or_else(|| CLARIFY_FALLBACK.to_string())),
            metadata: Default::default(),
        }
    } else {
        AgentAction::wait()
    }
}

/// The fixed tool set offered on the structured protocol path.
pub fn reaction_tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec::function(
            "send_chat_message",
            "Send a chat message in the channel the event came from",
            json!({
                "type": "object",
                "properties": {
                    "content": {"type": "string", "description": "The message text"}
                },
                "required": ["content"]
            }),
        ),
        ToolSpec::function(
            "send_email",
            "Send an email reply",
            json!({
                "type": "object",
                "properties": {
                    "to": {"type": "string", "description": "Recipient name or address"},
                    "subject": {"type": "string", "description": "Email subject line"},
                    "content": {"type": "string", "description": "Email body"}
                },
                "required": ["content"]
            }),
        ),
        ToolSpec::function(
            "check_calendar",
            "Look at your upcoming calendar before deciding anything else",
            json!({"type": "object", "properties": {}}),
        ),
        ToolSpec::function(
            "wait",
            "Do nothing for now",
            json!({"type": "object", "properties": {}}),
        ),
        ToolSpec::function(
            "request_clarification",
            "Ask the sender to clarify what they need",
            json!({
                "type": "object",
                "properties": {
                    "question": {"type": "string", "description": "The clarifying question"}
                }
            }),
        ),
    ]
}

/// The first recognized tool invocation determines the action; no
/// invocation means `wait`, same conservative default as the free-text
/// path.
pub fn action_from_tool_calls(calls: &[ToolInvocation], event: &ScheduledEvent) -> AgentAction {
    for call in calls {
        let arg = |key: &str| {
            call.arguments
                .get(key)
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        match call.name.as_str() {
            "send_chat_message" => {
                return AgentAction {
                    kind: AgentActionKind::SendChatMessage,
                    target_entity: chat_target(event),
                    content: arg("content"),
                    metadata: Default::default(),
                }
            }
            "send_email" => {
                let mut action = AgentAction {
                    kind: AgentActionKind::SendEmail,
                    target_entity: arg("to").or_else(|| sender_target(event)),
                    content: arg("content"),
                    metadata: Default::default(),
                };
                if let Some(subject) = arg("subject") {
                    action = action.with_metadata("subject", subject);
                }
                return action;
            }
            "check_calendar" => {
                return AgentAction {
                    kind: AgentActionKind::CheckCalendar,
                    target_entity: None,
                    content: None,
                    metadata: Default::default(),
                }
            }
            "wait" => return AgentAction::wait(),
            "request_clarification" => {
                return AgentAction {
                    kind: AgentActionKind::SendChatMessage,
                    target_entity: chat_target(event),
                    content: Some(arg("question").unwrap_or_else(|| CLARIFY_FALLBACK.to_string())),
                    metadata: Default::default(),
                }
            }
            _ => continue,
        }
    }
    AgentAction::wait()
}
