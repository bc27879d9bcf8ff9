//! Event and latency-tier model
//! Defines event shapes, the three reaction tiers, and the pure mapping
//! from event kind to tier to numeric queue priority.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::utils::current_timestamp_ms;

/// Coarse multiplier separating tiers in the composite priority key.
/// Dwarfs any plausible epoch-millisecond timestamp so tier always dominates.
pub const TIER_PRIORITY_SPAN: u64 = 10_000_000_000_000_000;

/// Latency class bounding how quickly an event must be processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionTier {
    /// Someone is waiting on the agent right now (a meeting is starting).
    Sync,
    /// Conversational latency (a chat message).
    NearSync,
    /// Background latency (email, calendar, idle checks).
    Async,
}

impl ReactionTier {
    /// Maximum tolerable latency for the tier.
    pub fn max_latency_ms(self) -> u64 {
        match self {
            ReactionTier::Sync => 2_000,
            ReactionTier::NearSync => 60_000,
            ReactionTier::Async => 3_600_000,
        }
    }

    /// Heap ordering weight; lower weight wins the queue.
    pub fn weight(self) -> u64 {
        match self {
            ReactionTier::Sync => 0,
            ReactionTier::NearSync => 1,
            ReactionTier::Async => 2,
        }
    }
}

/// Kinds of events an agent can observe. Unknown kinds survive as
/// `Other` so event producers can evolve ahead of this enum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentEventType {
    MeetingStarting,
    ChatMessage,
    EmailReceived,
    CalendarEvent,
    IdleCheck,
    #[serde(untagged)]
    Other(String),
}

impl AgentEventType {
    pub fn name(&self) -> &str {
        match self {
            AgentEventType::MeetingStarting => "meeting_starting",
            AgentEventType::ChatMessage => "chat_message",
            AgentEventType::EmailReceived => "email_received",
            AgentEventType::CalendarEvent => "calendar_event",
            AgentEventType::IdleCheck => "idle_check",
            AgentEventType::Other(kind) => kind,
        }
    }
}

impl std::fmt::Display for AgentEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Tier assignment is a pure function of the event kind, never overridden
/// per instance. Unmapped kinds fall back to the most relaxed tier so a new,
/// un-tiered event type degrades gracefully instead of starving urgent work.
pub fn tier_of(event_type: &AgentEventType) -> ReactionTier {
    match event_type {
        AgentEventType::MeetingStarting => ReactionTier::Sync,
        AgentEventType::ChatMessage => ReactionTier::NearSync,
        AgentEventType::EmailReceived
        | AgentEventType::CalendarEvent
        | AgentEventType::IdleCheck => ReactionTier::Async,
        AgentEventType::Other(_) => ReactionTier::Async,
    }
}

/// A single scheduled observation for one agent. Immutable once created;
/// consumed exactly once by a tick and discarded afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledEvent {
    pub id: String,
    pub agent_id: String,
    /// Epoch milliseconds at which the event becomes eligible.
    pub scheduled_for: u64,
    pub tier: ReactionTier,
    pub event_type: AgentEventType,
    #[serde(default)]
    pub payload: HashMap<String, serde_json::Value>,
    pub created_at: u64,
}

impl ScheduledEvent {
    pub fn new(
        agent_id: impl Into<String>,
        event_type: AgentEventType,
        payload: HashMap<String, serde_json::Value>,
        scheduled_for: Option<u64>,
    ) -> Self {
        let now = current_timestamp_ms();
        let tier = tier_of(&event_type);
        Self {
            id: generate_event_id(),
            agent_id: agent_id.into(),
            scheduled_for: scheduled_for.unwrap_or(now),
            tier,
            event_type,
            payload,
            created_at: now,
        }
    }
}

/// Composite priority: tier dominates, `scheduled_for` breaks ties within a
/// tier. This total order is the heap's comparison key.
pub fn priority_of(event: &ScheduledEvent) -> u64 {
    event.tier.weight() * TIER_PRIORITY_SPAN + event.scheduled_for
}

/// Ids are unique enough for a single run; they are never persisted across
/// process restarts.
pub fn generate_event_id() -> String {
    format!("evt_{}_{:08x}", current_timestamp_ms(), rand::random::<u32>())
}
