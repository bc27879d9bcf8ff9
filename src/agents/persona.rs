//! Persona construction and event observations
//! Turns personnel records into system prompts and scheduled events into
//! the natural-language observations fed to the reasoning backend.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::events::{AgentEventType, ScheduledEvent};

/// Lightweight personnel record supplied by the host's directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonnelProfile {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

/// Collaborator boundary for personnel lookup. A `None` result never crashes
/// a tick; the scheduler substitutes a placeholder persona.
pub trait PersonnelDirectory: Send + Sync {
    fn lookup(&self, personnel_id: &str) -> Option<PersonnelProfile>;
}

/// In-memory directory for hosts and tests.
pub struct StaticDirectory {
    profiles: HashMap<String, PersonnelProfile>,
}

impl StaticDirectory {
    pub fn new(profiles: impl IntoIterator<Item = PersonnelProfile>) -> Self {
        Self {
            profiles: profiles
                .into_iter()
                .map(|p| (p.id.clone(), p))
                .collect(),
        }
    }
}

impl PersonnelDirectory for StaticDirectory {
    fn lookup(&self, personnel_id: &str) -> Option<PersonnelProfile> {
        self.profiles.get(personnel_id).cloned()
    }
}

/// Generic stand-in when the directory has no record for an agent.
pub fn placeholder_profile(personnel_id: &str) -> PersonnelProfile {
    PersonnelProfile {
        id: personnel_id.to_string(),
        name: "A colleague".to_string(),
        title: None,
        department: None,
        bio: None,
    }
}

/// Persona system prompt. The scheduler caches the result per agent.
pub fn build_persona_prompt(profile: &PersonnelProfile) -> String {
    let mut prompt = format!("You are {}", profile.name);
    if let Some(title) = profile.title.as_deref().filter(|t| !t.is_empty()) {
        prompt.push_str(&format!(", {}", title));
    }
    if let Some(department) = profile.department.as_deref().filter(|d| !d.is_empty()) {
        prompt.push_str(&format!(" in the {} department", department));
    }
    prompt.push('.');
    if let Some(bio) = profile.bio.as_deref().filter(|b| !b.is_empty()) {
        prompt.push(' ');
        prompt.push_str(bio.trim_end());
        if !prompt.ends_with('.') {
            prompt.push('.');
        }
    }
    prompt.push_str(
        " You work inside a company workspace and communicate through chat, \
         email, and meetings. Stay in character and keep replies short and businesslike.",
    );
    prompt
}

fn payload_str<'a>(event: &'a ScheduledEvent, key: &str, fallback: &'a str) -> &'a str {
    event
        .payload
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(fallback)
}

/// Natural-language rendering of one event, fed to the backend as context.
pub fn build_observation(event: &ScheduledEvent) -> String {
    match &event.event_type {
        AgentEventType::ChatMessage => format!(
            "New chat message in {} from {}: \"{}\"",
            payload_str(event, "channel_name", "a channel"),
            payload_str(event, "sender_name", "someone"),
            payload_str(event, "content", ""),
        ),
        AgentEventType::EmailReceived => format!(
            "New email from {} with subject \"{}\": {}",
            payload_str(event, "sender_name", "someone"),
            payload_str(event, "subject", "(no subject)"),
            payload_str(event, "content", ""),
        ),
        AgentEventType::MeetingStarting => format!(
            "The meeting \"{}\" is starting now.",
            payload_str(event, "title", "(untitled)"),
        ),
        AgentEventType::CalendarEvent => format!(
            "Upcoming calendar event: \"{}\".",
            payload_str(event, "title", "(untitled)"),
        ),
        AgentEventType::IdleCheck => {
            "Nothing is demanding your attention right now. Decide whether anything is worth doing."
                .to_string()
        }
        AgentEventType::Other(kind) => format!("Something happened in your workspace: {}.", kind),
    }
}

/// ReAct-style reasoning prompt: persona, observation, and the labeled
/// reply format the parser expects.
pub fn build_reasoning_prompt(persona: &str, observation: &str) -> String {
    format!(
        "{persona}\n\n\
         Observation: {observation}\n\n\
         Decide how to react. Reply using exactly this format:\n\
         Thought: <your reasoning about the situation>\n\
         Action: <one of: respond, email, ignore, delegate, clarify>\n\
         Response: <the message you would send, if any>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chat_event() -> ScheduledEvent {
        let mut payload = HashMap::new();
        payload.insert("channel_name".to_string(), json!("#support"));
        payload.insert("sender_name".to_string(), json!("Dana"));
        payload.insert("content".to_string(), json!("is the build green?"));
        ScheduledEvent::new("a1", AgentEventType::ChatMessage, payload, Some(0))
    }

    #[test]
    fn test_persona_prompt_includes_profile_fields() {
        let profile = PersonnelProfile {
            id: "p1".to_string(),
            name: "Iris Chen".to_string(),
            title: Some("Staff Engineer".to_string()),
            department: Some("Platform".to_string()),
            bio: Some("Owns the build system".to_string()),
        };
        let prompt = build_persona_prompt(&profile);
        assert!(prompt.starts_with("You are Iris Chen, Staff Engineer in the Platform department."));
        assert!(prompt.contains("Owns the build system."));
    }

    #[test]
    fn test_persona_prompt_minimal_profile() {
        let prompt = build_persona_prompt(&placeholder_profile("ghost"));
        assert!(prompt.starts_with("You are A colleague."));
    }

    #[test]
    fn test_chat_observation() {
        let obs = build_observation(&chat_event());
        assert_eq!(
            obs,
            "New chat message in #support from Dana: \"is the build green?\""
        );
    }

    #[test]
    fn test_email_observation_defaults() {
        let event = ScheduledEvent::new(
            "a1",
            AgentEventType::EmailReceived,
            HashMap::new(),
            Some(0),
        );
        let obs = build_observation(&event);
        assert!(obs.contains("from someone"));
        assert!(obs.contains("(no subject)"));
    }

    #[test]
    fn test_unknown_event_observation_falls_back() {
        let event = ScheduledEvent::new(
            "a1",
            AgentEventType::Other("desk_moved".to_string()),
            HashMap::new(),
            Some(0),
        );
        assert_eq!(
            build_observation(&event),
            "Something happened in your workspace: desk_moved."
        );
    }

    #[test]
    fn test_directory_lookup_miss() {
        let directory = StaticDirectory::new(vec![placeholder_profile("known")]);
        assert!(directory.lookup("known").is_some());
        assert!(directory.lookup("missing").is_none());
    }

    #[test]
    fn test_reasoning_prompt_layout() {
        let prompt = build_reasoning_prompt("You are X.", "A thing happened.");
        assert!(prompt.contains("Observation: A thing happened."));
        assert!(prompt.contains("Thought:"));
        assert!(prompt.contains("Action:"));
        assert!(prompt.contains("Response:"));
    }
}
