//! Discrete-event agent scheduler
//! One tick pops the most urgent due event, asks the inference backend how
//! the persona reacts, and reports the outcome. All state is owned by a
//! single logical thread of control; there is no internal locking because
//! there is no internal concurrency.

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use crate::ai::{GenerateOptions, InferenceBackend};
use crate::core::utils::current_timestamp_ms;

use super::actions::ActionResult;
use super::callbacks::{NoopCallbacks, SchedulerCallbacks};
use super::events::{priority_of, AgentEventType, ScheduledEvent};
use super::persona::{
    build_observation, build_persona_prompt, build_reasoning_prompt, placeholder_profile,
    PersonnelDirectory,
};
use super::protocol::{action_from_tool_calls, classify_action, parse_react_reply, reaction_tools};
use super::queue::BinaryMinHeap;

/// Agent lifecycle state: dormant while the backend is unavailable or the
/// simulation has not started, active otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Dormant,
    Active,
}

/// Per-agent runtime state, owned exclusively by the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRuntimeState {
    pub personnel_id: String,
    pub name: String,
    pub status: AgentStatus,
    #[serde(default)]
    pub active_context_ids: HashSet<String>,
    pub last_activity_at: u64,
    pub pending_action_count: u32,
}

/// The scheduler: event queue, agent map, persona cache, and the tick
/// protocol that turns due events into `ActionResult`s.
pub struct AgentScheduler {
    backend: Arc<dyn InferenceBackend>,
    directory: Arc<dyn PersonnelDirectory>,
    callbacks: Arc<dyn SchedulerCallbacks>,
    queue: BinaryMinHeap<ScheduledEvent>,
    agents: HashMap<String, AgentRuntimeState>,
    persona_cache: HashMap<String, String>,
    generate_options: GenerateOptions,
    tools_enabled: bool,
    /// Sticky: once the backend rejects tool calling we stop offering it.
    tools_rejected: bool,
    running: bool,
}

impl AgentScheduler {
    pub fn new(backend: Arc<dyn InferenceBackend>, directory: Arc<dyn PersonnelDirectory>) -> Self {
        Self {
            backend,
            directory,
            callbacks: Arc::new(NoopCallbacks),
            queue: BinaryMinHeap::new(|a: &ScheduledEvent, b: &ScheduledEvent| {
                priority_of(a).cmp(&priority_of(b))
            }),
            agents: HashMap::new(),
            persona_cache: HashMap::new(),
            generate_options: GenerateOptions::default(),
            tools_enabled: true,
            tools_rejected: false,
            running: false,
        }
    }

    pub fn with_callbacks(mut self, callbacks: Arc<dyn SchedulerCallbacks>) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn with_generate_options(mut self, options: GenerateOptions) -> Self {
        self.generate_options = options;
        self
    }

    pub fn with_tool_calling(mut self, enabled: bool) -> Self {
        self.tools_enabled = enabled;
        self
    }

    /// Register the simulated agents. Everyone starts dormant with zeroed
    /// counters; any previous roster is discarded.
    pub fn initialize_agents<I, S>(&mut self, personnel_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.agents.clear();
        self.persona_cache.clear();
        for id in personnel_ids {
            let id = id.into();
            let name = self
                .directory
                .lookup(&id)
                .map(|p| p.name)
                .unwrap_or_else(|| placeholder_profile(&id).name);
            self.agents.insert(
                id.clone(),
                AgentRuntimeState {
                    personnel_id: id,
                    name,
                    status: AgentStatus::Dormant,
                    active_context_ids: HashSet::new(),
                    last_activity_at: 0,
                    pending_action_count: 0,
                },
            );
        }
        tracing::info!("initialized {} agent(s), all dormant", self.agents.len());
    }

    /// Probe the backend once; agents wake only if it is reachable.
    pub async fn start(&mut self) -> usize {
        let availability = self.backend.availability().await;
        if availability.available {
            for state in self.agents.values_mut() {
                state.status = AgentStatus::Active;
            }
            tracing::info!("scheduler started, {} agent(s) active", self.agents.len());
        } else {
            tracing::warn!(
                "scheduler started with backend unavailable ({}), agents stay dormant",
                availability.error.as_deref().unwrap_or("no response")
            );
        }
        self.running = true;
        self.agents.len()
    }

    /// Hard stop: no drain phase. An event already popped by an in-flight
    /// tick is lost.
    pub fn stop(&mut self) {
        self.running = false;
        for state in self.agents.values_mut() {
            state.status = AgentStatus::Dormant;
        }
        tracing::info!("scheduler stopped, all agents dormant");
    }

    /// Derive the tier, assign an id, enqueue, and bump the target agent's
    /// pending count. `scheduled_for` defaults to now.
    pub fn schedule_event(
        &mut self,
        agent_id: &str,
        event_type: AgentEventType,
        payload: HashMap<String, serde_json::Value>,
        scheduled_for: Option<u64>,
    ) -> String {
        let event = ScheduledEvent::new(agent_id, event_type, payload, scheduled_for);
        let id = event.id.clone();
        if let Some(state) = self.agents.get_mut(agent_id) {
            state.pending_action_count = state.pending_action_count.saturating_add(1);
        }
        tracing::debug!(
            "scheduled {} ({}) for agent {} at {}",
            id,
            event.event_type,
            agent_id,
            event.scheduled_for
        );
        self.queue.push(event);
        id
    }

    /// One scheduler cycle. Returns `None` when nothing is due — the sole
    /// backpressure mechanism; the queue is never drained faster than events
    /// become eligible.
    pub async fn tick(&mut self) -> Option<ActionResult> {
        let now = current_timestamp_ms();
        match self.queue.peek() {
            Some(event) if event.scheduled_for <= now => {}
            _ => return None,
        }
        let event = self.queue.pop()?;
        let started = Instant::now();

        let result = if !self.agents.contains_key(&event.agent_id) {
            // Synthetic failure; queue and agent map are otherwise untouched.
            ActionResult::failure(
                format!("unknown agent: {}", event.agent_id),
                elapsed_ms(started),
            )
        } else {
            self.begin_processing(&event).await;
            match AssertUnwindSafe(self.process_event(&event, started))
                .catch_unwind()
                .await
            {
                Ok(result) => result,
                Err(panic) => {
                    // The driver must keep firing no matter what happened
                    // inside event processing.
                    let message = format!(
                        "tick processing panicked for event {}: {}",
                        event.id,
                        panic_message(panic.as_ref())
                    );
                    tracing::error!("{}", message);
                    self.callbacks.on_error(&message).await;
                    ActionResult::failure(message, elapsed_ms(started))
                }
            }
        };

        if result.success {
            if let Some(state) = self.agents.get_mut(&event.agent_id) {
                state.last_activity_at = current_timestamp_ms();
                state.status = AgentStatus::Active;
            }
        }
        self.callbacks.on_event_processed(&result).await;
        Some(result)
    }

    async fn begin_processing(&mut self, event: &ScheduledEvent) {
        let snapshot = match self.agents.get_mut(&event.agent_id) {
            Some(state) => {
                state.status = AgentStatus::Active;
                state.pending_action_count = state.pending_action_count.saturating_sub(1);
                if let Some(context) = event.payload.get("channel_name").and_then(|v| v.as_str()) {
                    state.active_context_ids.insert(context.to_string());
                }
                state.clone()
            }
            None => return,
        };
        self.callbacks.on_agent_state_change(&snapshot).await;
    }

    async fn process_event(&mut self, event: &ScheduledEvent, started: Instant) -> ActionResult {
        // Never attempt generation against a known-unavailable backend.
        let availability = self.backend.availability().await;
        if !availability.available {
            let snapshot = self.agents.get_mut(&event.agent_id).map(|state| {
                state.status = AgentStatus::Dormant;
                state.clone()
            });
            if let Some(snapshot) = snapshot {
                self.callbacks.on_agent_state_change(&snapshot).await;
            }
            let error = format!(
                "Ollama unavailable: {}",
                availability
                    .error
                    .unwrap_or_else(|| "no response".to_string())
            );
            tracing::warn!("{}, agent {} dormant", error, event.agent_id);
            return ActionResult::failure(error, elapsed_ms(started));
        }

        let persona = self.persona_for(&event.agent_id);
        let observation = build_observation(event);

        // Structured protocol first; transparent fallback on rejection.
        if self.tools_enabled && !self.tools_rejected {
            let outcome = self
                .backend
                .chat_with_tools(
                    &persona,
                    &observation,
                    &reaction_tools(),
                    &self.generate_options,
                )
                .await;
            if outcome.success {
                let action = action_from_tool_calls(&outcome.tool_calls, event);
                let response = action.content.clone();
                let thought = outcome.message.filter(|m| !m.trim().is_empty());
                return ActionResult::completed(action, thought, response, elapsed_ms(started));
            }
            if outcome.tools_unsupported {
                tracing::warn!("backend rejected tool calling, falling back to free-text protocol");
                self.tools_rejected = true;
            } else {
                return ActionResult::failure(
                    outcome
                        .error
                        .unwrap_or_else(|| "chat request failed".to_string()),
                    elapsed_ms(started),
                );
            }
        }

        let prompt = build_reasoning_prompt(&persona, &observation);
        let generated = self.backend.generate(&prompt, &self.generate_options).await;
        if !generated.success {
            return ActionResult::failure(
                generated
                    .error
                    .unwrap_or_else(|| "generation failed".to_string()),
                elapsed_ms(started),
            );
        }

        let raw = generated.response.unwrap_or_default();
        let reply = parse_react_reply(&raw);
        let action = classify_action(&reply, event);
        ActionResult::completed(
            action,
            non_empty(reply.thought),
            non_empty(reply.response),
            elapsed_ms(started),
        )
    }

    /// Resolve (or build and cache) the persona prompt for an agent.
    fn persona_for(&mut self, agent_id: &str) -> String {
        if let Some(cached) = self.persona_cache.get(agent_id) {
            return cached.clone();
        }
        let profile = self
            .directory
            .lookup(agent_id)
            .unwrap_or_else(|| placeholder_profile(agent_id));
        let prompt = build_persona_prompt(&profile);
        self.persona_cache.insert(agent_id.to_string(), prompt.clone());
        prompt
    }

    /// Force persona rebuilds after upstream personnel data changes.
    pub fn clear_persona_cache(&mut self) {
        self.persona_cache.clear();
    }

    pub fn has_agent(&self, agent_id: &str) -> bool {
        self.agents.contains_key(agent_id)
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    pub fn agent_states(&self) -> Vec<AgentRuntimeState> {
        self.agents.values().cloned().collect()
    }

    pub fn agent_state(&self, agent_id: &str) -> Option<&AgentRuntimeState> {
        self.agents.get(agent_id)
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::actions::AgentActionKind;
    use crate::agents::persona::{PersonnelProfile, StaticDirectory};
    use crate::ai::testing::StubBackend;
    use crate::ai::{Availability, GenerateOutcome, ToolChatOutcome, ToolInvocation, ToolSpec};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn directory() -> Arc<StaticDirectory> {
        Arc::new(StaticDirectory::new(vec![PersonnelProfile {
            id: "a1".to_string(),
            name: "Iris Chen".to_string(),
            title: Some("Staff Engineer".to_string()),
            department: Some("Platform".to_string()),
            bio: None,
        }]))
    }

    fn scheduler_with(backend: Arc<StubBackend>) -> AgentScheduler {
        let mut scheduler = AgentScheduler::new(backend, directory());
        scheduler.initialize_agents(["a1"]);
        scheduler
    }

    fn chat_payload() -> HashMap<String, serde_json::Value> {
        let mut payload = HashMap::new();
        payload.insert("channel_name".to_string(), json!("#general"));
        payload.insert("sender_name".to_string(), json!("Dana"));
        payload.insert("content".to_string(), json!("ping"));
        payload
    }

    #[tokio::test]
    async fn test_dormancy_on_outage() {
        let backend = Arc::new(StubBackend::unavailable("connection refused"));
        let mut scheduler = scheduler_with(backend);
        scheduler.start().await;
        scheduler.schedule_event("a1", AgentEventType::IdleCheck, HashMap::new(), Some(0));

        let result = scheduler.tick().await.expect("event was due");
        assert!(!result.success);
        let error = result.error.expect("failure carries an error");
        assert!(error.starts_with("Ollama unavailable:"), "got: {error}");
        assert!(error.contains("connection refused"));
        assert_eq!(
            scheduler.agent_state("a1").unwrap().status,
            AgentStatus::Dormant
        );
    }

    #[tokio::test]
    async fn test_pending_count_returns_to_zero() {
        let backend = Arc::new(StubBackend::default());
        let mut scheduler = scheduler_with(backend);
        scheduler.start().await;
        for _ in 0..3 {
            scheduler.schedule_event("a1", AgentEventType::IdleCheck, HashMap::new(), Some(0));
        }
        assert_eq!(scheduler.agent_state("a1").unwrap().pending_action_count, 3);

        for _ in 0..3 {
            assert!(scheduler.tick().await.is_some());
        }
        assert_eq!(scheduler.agent_state("a1").unwrap().pending_action_count, 0);

        // An extra tick is a no-op and the count stays floored at zero.
        assert!(scheduler.tick().await.is_none());
        assert_eq!(scheduler.agent_state("a1").unwrap().pending_action_count, 0);
    }

    #[tokio::test]
    async fn test_sync_preempts_async() {
        let backend = Arc::new(StubBackend::default());
        let mut scheduler = scheduler_with(backend.clone());
        scheduler.start().await;

        scheduler.schedule_event("a1", AgentEventType::IdleCheck, HashMap::new(), Some(0));
        let mut payload = HashMap::new();
        payload.insert("title".to_string(), json!("standup"));
        scheduler.schedule_event("a1", AgentEventType::MeetingStarting, payload, Some(0));

        scheduler.tick().await.expect("event was due");
        let prompts = backend.prompts.lock().unwrap();
        assert!(
            prompts[0].contains("standup"),
            "sync meeting should be processed first, prompt was: {}",
            prompts[0]
        );
        assert_eq!(scheduler.pending_events(), 1);
    }

    #[tokio::test]
    async fn test_successful_chat_reaction() {
        let backend = Arc::new(StubBackend::replying(
            "Thought: Dana wants an ack.\nAction: respond\nResponse: On it.",
        ));
        let mut scheduler = scheduler_with(backend);
        scheduler.start().await;
        scheduler.schedule_event("a1", AgentEventType::ChatMessage, chat_payload(), Some(0));

        let result = scheduler.tick().await.expect("event was due");
        assert!(result.success);
        assert_eq!(result.action.kind, AgentActionKind::SendChatMessage);
        assert_eq!(result.action.target_entity.as_deref(), Some("#general"));
        assert_eq!(result.response.as_deref(), Some("On it."));
        assert_eq!(result.thought.as_deref(), Some("Dana wants an ack."));

        let state = scheduler.agent_state("a1").unwrap();
        assert_eq!(state.status, AgentStatus::Active);
        assert!(state.last_activity_at > 0);
        assert!(state.active_context_ids.contains("#general"));
    }

    #[tokio::test]
    async fn test_unknown_agent_yields_synthetic_failure() {
        let backend = Arc::new(StubBackend::default());
        let mut scheduler = scheduler_with(backend);
        scheduler.start().await;
        scheduler.schedule_event("ghost", AgentEventType::IdleCheck, HashMap::new(), Some(0));

        let result = scheduler.tick().await.expect("event was due");
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("unknown agent: ghost"));
        // Known agents are untouched.
        assert_eq!(
            scheduler.agent_state("a1").unwrap().pending_action_count,
            0
        );
    }

    #[tokio::test]
    async fn test_future_event_is_not_drained() {
        let backend = Arc::new(StubBackend::default());
        let mut scheduler = scheduler_with(backend);
        scheduler.start().await;
        let future = current_timestamp_ms() + 60_000;
        scheduler.schedule_event("a1", AgentEventType::ChatMessage, HashMap::new(), Some(future));

        assert!(scheduler.tick().await.is_none());
        assert_eq!(scheduler.pending_events(), 1);
    }

    #[tokio::test]
    async fn test_generation_failure_keeps_agent_status() {
        let backend = Arc::new(StubBackend::default());
        *backend.generate_error.lock().unwrap() =
            Some("request timed out after 30s".to_string());
        let mut scheduler = scheduler_with(backend);
        scheduler.start().await;
        scheduler.schedule_event("a1", AgentEventType::ChatMessage, chat_payload(), Some(0));

        let result = scheduler.tick().await.expect("event was due");
        assert!(!result.success);
        assert!(result.error.unwrap().contains("timed out"));
        // Transient flakiness is not an outage: the agent stays active.
        assert_eq!(
            scheduler.agent_state("a1").unwrap().status,
            AgentStatus::Active
        );
    }

    #[tokio::test]
    async fn test_tool_protocol_path() {
        let backend = Arc::new(StubBackend::with_tool_calls(vec![ToolInvocation {
            name: "send_chat_message".to_string(),
            arguments: json!({"content": "ack"}),
        }]));
        let mut scheduler = scheduler_with(backend.clone());
        scheduler.start().await;
        scheduler.schedule_event("a1", AgentEventType::ChatMessage, chat_payload(), Some(0));

        let result = scheduler.tick().await.expect("event was due");
        assert!(result.success);
        assert_eq!(result.action.kind, AgentActionKind::SendChatMessage);
        assert_eq!(result.action.content.as_deref(), Some("ack"));
        // Free-text generation never ran.
        assert_eq!(backend.generate_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_tool_rejection_falls_back_transparently() {
        // Default stub rejects tools, so the scheduler must land on the
        // free-text protocol and still produce a result.
        let backend = Arc::new(StubBackend::replying(
            "Thought: quiet day\nAction: ignore\nResponse:",
        ));
        let mut scheduler = scheduler_with(backend.clone());
        scheduler.start().await;
        scheduler.schedule_event("a1", AgentEventType::IdleCheck, HashMap::new(), Some(0));

        let result = scheduler.tick().await.expect("event was due");
        assert!(result.success);
        assert_eq!(result.action.kind, AgentActionKind::Wait);
        assert_eq!(backend.generate_calls.load(Ordering::SeqCst), 1);

        // Rejection is sticky: the next tick goes straight to free text.
        scheduler.schedule_event("a1", AgentEventType::IdleCheck, HashMap::new(), Some(0));
        let result = scheduler.tick().await.expect("event was due");
        assert!(result.success);
        assert_eq!(backend.generate_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_tool_calling_can_be_disabled() {
        let backend = Arc::new(StubBackend::with_tool_calls(vec![ToolInvocation {
            name: "wait".to_string(),
            arguments: json!({}),
        }]));
        let mut scheduler = AgentScheduler::new(backend.clone(), directory())
            .with_tool_calling(false)
            .with_generate_options(GenerateOptions {
                temperature: 0.2,
                ..GenerateOptions::default()
            });
        scheduler.initialize_agents(["a1"]);
        scheduler.start().await;
        scheduler.schedule_event("a1", AgentEventType::IdleCheck, HashMap::new(), Some(0));

        let result = scheduler.tick().await.expect("event was due");
        assert!(result.success);
        // Tools were available but never offered; the free-text path ran.
        assert_eq!(backend.generate_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stop_forces_dormant() {
        let backend = Arc::new(StubBackend::default());
        let mut scheduler = scheduler_with(backend);
        scheduler.start().await;
        assert_eq!(
            scheduler.agent_state("a1").unwrap().status,
            AgentStatus::Active
        );

        scheduler.stop();
        assert!(!scheduler.is_running());
        assert_eq!(
            scheduler.agent_state("a1").unwrap().status,
            AgentStatus::Dormant
        );
    }

    struct CountingDirectory {
        inner: StaticDirectory,
        lookups: AtomicUsize,
    }

    impl PersonnelDirectory for CountingDirectory {
        fn lookup(&self, personnel_id: &str) -> Option<PersonnelProfile> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.lookup(personnel_id)
        }
    }

    #[tokio::test]
    async fn test_persona_cache_avoids_repeat_lookups() {
        let counting = Arc::new(CountingDirectory {
            inner: StaticDirectory::new(vec![PersonnelProfile {
                id: "a1".to_string(),
                name: "Iris Chen".to_string(),
                title: None,
                department: None,
                bio: None,
            }]),
            lookups: AtomicUsize::new(0),
        });
        let backend = Arc::new(StubBackend::default());
        let mut scheduler = AgentScheduler::new(backend, counting.clone());
        scheduler.initialize_agents(["a1"]);
        scheduler.start().await;
        let after_init = counting.lookups.load(Ordering::SeqCst);

        scheduler.schedule_event("a1", AgentEventType::IdleCheck, HashMap::new(), Some(0));
        scheduler.tick().await.expect("event was due");
        scheduler.schedule_event("a1", AgentEventType::IdleCheck, HashMap::new(), Some(0));
        scheduler.tick().await.expect("event was due");
        assert_eq!(counting.lookups.load(Ordering::SeqCst), after_init + 1);

        scheduler.clear_persona_cache();
        scheduler.schedule_event("a1", AgentEventType::IdleCheck, HashMap::new(), Some(0));
        scheduler.tick().await.expect("event was due");
        assert_eq!(counting.lookups.load(Ordering::SeqCst), after_init + 2);
    }

    #[tokio::test]
    async fn test_missing_personnel_record_uses_placeholder() {
        let backend = Arc::new(StubBackend::default());
        let empty = Arc::new(StaticDirectory::new(Vec::<PersonnelProfile>::new()));
        let mut scheduler = AgentScheduler::new(backend.clone(), empty);
        scheduler.initialize_agents(["nobody"]);
        scheduler.start().await;
        scheduler.schedule_event("nobody", AgentEventType::IdleCheck, HashMap::new(), Some(0));

        let result = scheduler.tick().await.expect("event was due");
        assert!(result.success);
        let prompts = backend.prompts.lock().unwrap();
        assert!(prompts[0].contains("A colleague"));
    }

    struct PanickingBackend;

    #[async_trait]
    impl crate::ai::InferenceBackend for PanickingBackend {
        async fn availability(&self) -> Availability {
            Availability::up()
        }

        async fn generate(&self, _prompt: &str, _options: &GenerateOptions) -> GenerateOutcome {
            panic!("backend bug");
        }

        async fn chat_with_tools(
            &self,
            _system: &str,
            _prompt: &str,
            _tools: &[ToolSpec],
            _options: &GenerateOptions,
        ) -> ToolChatOutcome {
            ToolChatOutcome {
                success: false,
                tools_unsupported: true,
                ..ToolChatOutcome::default()
            }
        }
    }

    #[tokio::test]
    async fn test_panic_is_contained_at_tick_boundary() {
        let mut scheduler = AgentScheduler::new(Arc::new(PanickingBackend), directory());
        scheduler.initialize_agents(["a1"]);
        scheduler.start().await;
        scheduler.schedule_event("a1", AgentEventType::IdleCheck, HashMap::new(), Some(0));

        let result = scheduler.tick().await.expect("event was due");
        assert!(!result.success);
        assert!(result.error.unwrap().contains("panicked"));

        // The scheduler keeps working after the contained panic.
        assert!(scheduler.tick().await.is_none());
    }
}
