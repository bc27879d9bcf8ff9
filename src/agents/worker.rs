//! Worker/manager isolation boundary
//! The scheduler lives inside a single worker task; all mutations are
//! serialized through one command channel and every command produces
//! exactly one response. No shared mutable memory crosses the boundary —
//! state moves by value through serializable messages.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, Duration, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::ai::InferenceBackend;
use crate::config::SimulationConfig;

use super::actions::ActionResult;
use super::callbacks::SchedulerCallbacks;
use super::events::AgentEventType;
use super::persona::PersonnelDirectory;
use super::scheduler::{AgentRuntimeState, AgentScheduler};

const NOTIFICATION_BUFFER: usize = 256;

/// Commands the host may send across the boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchedulerCommand {
    Start { config: SimulationConfig },
    Stop,
    Tick,
    Trigger { agent_id: String, event: TriggerEvent },
    Status,
}

/// Event payload carried by a `Trigger` command. The tier is derived from
/// the event type on the worker side, never trusted from the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub event_type: AgentEventType,
    #[serde(default)]
    pub payload: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub scheduled_for: Option<u64>,
}

/// Responses the worker sends back, exactly one per command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchedulerResponse {
    Started { agent_count: usize },
    Stopped,
    TickComplete { processed: usize, pending: usize },
    Status { running: bool, agents: Vec<AgentRuntimeState> },
    Error { message: String },
}

/// Unsolicited observe-only messages forwarded from scheduler callbacks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchedulerNotification {
    AgentStateChanged { state: AgentRuntimeState },
    EventProcessed { result: ActionResult },
    SchedulerError { message: String },
}

/// Snapshot returned by `SchedulerManager::status`.
#[derive(Debug, Clone)]
pub struct SchedulerStatus {
    pub running: bool,
    pub agents: Vec<AgentRuntimeState>,
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("scheduler worker is no longer running")]
    WorkerGone,
    #[error("command rejected: {0}")]
    CommandRejected(String),
    #[error("unexpected response from scheduler worker")]
    UnexpectedResponse,
}

/// A command plus its one-shot responder. The responder is consumed exactly
/// once, so no handler can leak across unrelated commands.
struct Envelope {
    command: SchedulerCommand,
    reply: oneshot::Sender<SchedulerResponse>,
}

/// Host-side handle to the worker. Construct one per application lifetime
/// and pass it down.
pub struct SchedulerManager {
    command_tx: mpsc::Sender<Envelope>,
    cancel: CancellationToken,
}

impl SchedulerManager {
    /// Spawn the worker task that owns exactly one scheduler. Returns the
    /// manager handle and the notification stream.
    pub fn spawn(
        backend: Arc<dyn InferenceBackend>,
        directory: Arc<dyn PersonnelDirectory>,
        agent_ids: Vec<String>,
    ) -> (Self, mpsc::Receiver<SchedulerNotification>) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (notify_tx, notify_rx) = mpsc::channel(NOTIFICATION_BUFFER);
        let cancel = CancellationToken::new();

        let mut scheduler = AgentScheduler::new(backend, directory)
            .with_callbacks(Arc::new(ForwardingCallbacks { tx: notify_tx }));
        scheduler.initialize_agents(agent_ids);

        let worker = SchedulerWorker {
            scheduler,
            driver_running: false,
            tick_rate_ms: 1000,
        };
        tokio::spawn(worker.run(command_rx, cancel.clone()));

        (Self { command_tx, cancel }, notify_rx)
    }

    /// Send a raw command and wait for its single response.
    pub async fn command(
        &self,
        command: SchedulerCommand,
    ) -> Result<SchedulerResponse, SchedulerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(Envelope {
                command,
                reply: reply_tx,
            })
            .await
            .map_err(|_| SchedulerError::WorkerGone)?;
        reply_rx.await.map_err(|_| SchedulerError::WorkerGone)
    }

    pub async fn start(&self, config: SimulationConfig) -> Result<usize, SchedulerError> {
        match self.command(SchedulerCommand::Start { config }).await? {
            SchedulerResponse::Started { agent_count } => Ok(agent_count),
            SchedulerResponse::Error { message } => Err(SchedulerError::CommandRejected(message)),
            _ => Err(SchedulerError::UnexpectedResponse),
        }
    }

    pub async fn stop(&self) -> Result<(), SchedulerError> {
        match self.command(SchedulerCommand::Stop).await? {
            SchedulerResponse::Stopped => Ok(()),
            SchedulerResponse::Error { message } => Err(SchedulerError::CommandRejected(message)),
            _ => Err(SchedulerError::UnexpectedResponse),
        }
    }

    /// Drive one scheduler cycle. Returns `(processed, pending)`.
    pub async fn tick(&self) -> Result<(usize, usize), SchedulerError> {
        match self.command(SchedulerCommand::Tick).await? {
            SchedulerResponse::TickComplete { processed, pending } => Ok((processed, pending)),
            SchedulerResponse::Error { message } => Err(SchedulerError::CommandRejected(message)),
            _ => Err(SchedulerError::UnexpectedResponse),
        }
    }

    pub async fn trigger(
        &self,
        agent_id: impl Into<String>,
        event: TriggerEvent,
    ) -> Result<(), SchedulerError> {
        let command = SchedulerCommand::Trigger {
            agent_id: agent_id.into(),
            event,
        };
        match self.command(command).await? {
            SchedulerResponse::Status { .. } => Ok(()),
            SchedulerResponse::Error { message } => Err(SchedulerError::CommandRejected(message)),
            _ => Err(SchedulerError::UnexpectedResponse),
        }
    }

    pub async fn status(&self) -> Result<SchedulerStatus, SchedulerError> {
        match self.command(SchedulerCommand::Status).await? {
            SchedulerResponse::Status { running, agents } => {
                Ok(SchedulerStatus { running, agents })
            }
            SchedulerResponse::Error { message } => Err(SchedulerError::CommandRejected(message)),
            _ => Err(SchedulerError::UnexpectedResponse),
        }
    }

    /// Hard teardown: cancels the worker immediately. An in-flight tick is
    /// abandoned mid-call and its event is lost.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

/// Forwards scheduler callbacks to the host as best-effort notifications.
/// `try_send` keeps a slow host from ever blocking the worker.
struct ForwardingCallbacks {
    tx: mpsc::Sender<SchedulerNotification>,
}

#[async_trait::async_trait]
impl SchedulerCallbacks for ForwardingCallbacks {
    async fn on_agent_state_change(&self, state: &AgentRuntimeState) {
        if self
            .tx
            .try_send(SchedulerNotification::AgentStateChanged {
                state: state.clone(),
            })
            .is_err()
        {
            tracing::debug!("notification channel full, dropping agent state change");
        }
    }

    async fn on_event_processed(&self, result: &ActionResult) {
        if self
            .tx
            .try_send(SchedulerNotification::EventProcessed {
                result: result.clone(),
            })
            .is_err()
        {
            tracing::debug!("notification channel full, dropping event result");
        }
    }

    async fn on_error(&self, message: &str) {
        if self
            .tx
            .try_send(SchedulerNotification::SchedulerError {
                message: message.to_string(),
            })
            .is_err()
        {
            tracing::debug!("notification channel full, dropping error notification");
        }
    }
}

/// The worker actor. Owns the scheduler and the periodic driver; both
/// driver firings and commands interleave in the one select loop, so ticks
/// are never re-entrant.
struct SchedulerWorker {
    scheduler: AgentScheduler,
    driver_running: bool,
    tick_rate_ms: u64,
}

impl SchedulerWorker {
    async fn run(mut self, mut command_rx: mpsc::Receiver<Envelope>, cancel: CancellationToken) {
        let mut driver = new_driver(self.tick_rate_ms);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                maybe = command_rx.recv() => {
                    let Some(envelope) = maybe else { break };
                    let rate_before = self.tick_rate_ms;
                    let response = self.handle(envelope.command).await;
                    if self.tick_rate_ms != rate_before {
                        driver = new_driver(self.tick_rate_ms);
                    }
                    let _ = envelope.reply.send(response);
                }
                _ = driver.tick(), if self.driver_running => {
                    // A slow inference call delays the next firing instead of
                    // overlapping it.
                    let tick = self.scheduler.tick();
                    tokio::pin!(tick);
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            tracing::warn!("worker cancelled mid-tick, in-flight event abandoned");
                            break;
                        }
                        _ = &mut tick => {}
                    }
                }
            }
        }
        tracing::debug!("scheduler worker exiting");
    }

    async fn handle(&mut self, command: SchedulerCommand) -> SchedulerResponse {
        match command {
            SchedulerCommand::Start { config } => {
                self.tick_rate_ms = config.tick_rate_ms.max(10);
                if self.scheduler.agent_count() > config.max_concurrent_agents {
                    tracing::warn!(
                        "{} agents exceeds the advisory cap of {}",
                        self.scheduler.agent_count(),
                        config.max_concurrent_agents
                    );
                }
                let agent_count = self.scheduler.start().await;
                self.driver_running = true;
                SchedulerResponse::Started { agent_count }
            }
            SchedulerCommand::Stop => {
                self.driver_running = false;
                self.scheduler.stop();
                SchedulerResponse::Stopped
            }
            SchedulerCommand::Tick => {
                let processed = usize::from(self.scheduler.tick().await.is_some());
                SchedulerResponse::TickComplete {
                    processed,
                    pending: self.scheduler.pending_events(),
                }
            }
            SchedulerCommand::Trigger { agent_id, event } => {
                if !self.scheduler.has_agent(&agent_id) {
                    return SchedulerResponse::Error {
                        message: format!("unknown agent: {}", agent_id),
                    };
                }
                self.scheduler.schedule_event(
                    &agent_id,
                    event.event_type,
                    event.payload,
                    event.scheduled_for,
                );
                SchedulerResponse::Status {
                    running: self.driver_running,
                    agents: self.scheduler.agent_states(),
                }
            }
            SchedulerCommand::Status => SchedulerResponse::Status {
                running: self.driver_running,
                agents: self.scheduler.agent_states(),
            },
        }
    }
}

/// The first firing waits a full period: commands issued right after
/// `start` must never race an immediate driver tick.
fn new_driver(tick_rate_ms: u64) -> Interval {
    let period = Duration::from_millis(tick_rate_ms.max(10));
    let mut driver = interval_at(Instant::now() + period, period);
    driver.set_missed_tick_behavior(MissedTickBehavior::Delay);
    driver
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::persona::{PersonnelProfile, StaticDirectory};
    use crate::agents::scheduler::AgentStatus;
    use crate::ai::testing::StubBackend;
    use serde_json::json;
    use std::sync::atomic::Ordering;

    fn directory() -> Arc<StaticDirectory> {
        Arc::new(StaticDirectory::new(vec![PersonnelProfile {
            id: "a1".to_string(),
            name: "Iris Chen".to_string(),
            title: None,
            department: None,
            bio: None,
        }]))
    }

    fn chat_trigger() -> TriggerEvent {
        let mut payload = HashMap::new();
        payload.insert("channel_name".to_string(), json!("#general"));
        payload.insert("sender_name".to_string(), json!("Dana"));
        payload.insert("content".to_string(), json!("ping"));
        TriggerEvent {
            event_type: AgentEventType::ChatMessage,
            payload,
            scheduled_for: None,
        }
    }

    fn manual_config() -> SimulationConfig {
        // A huge tick rate keeps the periodic driver out of manual tests.
        SimulationConfig {
            tick_rate_ms: 3_600_000,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn test_command_wire_schema() {
        let json_command = json!({
            "type": "trigger",
            "agent_id": "a1",
            "event": {
                "event_type": "chat_message",
                "payload": {"content": "hello"},
                "scheduled_for": 1700000000000u64
            }
        });
        let command: SchedulerCommand = serde_json::from_value(json_command).unwrap();
        match command {
            SchedulerCommand::Trigger { agent_id, event } => {
                assert_eq!(agent_id, "a1");
                assert_eq!(event.event_type, AgentEventType::ChatMessage);
                assert_eq!(event.scheduled_for, Some(1_700_000_000_000));
            }
            other => panic!("unexpected command: {:?}", other),
        }

        let response = SchedulerResponse::TickComplete {
            processed: 1,
            pending: 0,
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["type"], "tick_complete");
        assert_eq!(value["processed"], 1);
    }

    #[tokio::test]
    async fn test_trigger_then_tick_round_trip() {
        let backend = Arc::new(StubBackend::replying(
            "Thought: ack\nAction: respond\nResponse: pong",
        ));
        let (manager, _notifications) =
            SchedulerManager::spawn(backend, directory(), vec!["a1".to_string()]);

        let agent_count = manager.start(manual_config()).await.unwrap();
        assert_eq!(agent_count, 1);

        manager.trigger("a1", chat_trigger()).await.unwrap();
        let (processed, pending) = manager.tick().await.unwrap();
        assert_eq!(processed, 1);
        assert_eq!(pending, 0);
    }

    #[tokio::test]
    async fn test_trigger_unknown_agent_rejected() {
        let backend = Arc::new(StubBackend::default());
        let (manager, _notifications) =
            SchedulerManager::spawn(backend, directory(), vec!["a1".to_string()]);
        manager.start(manual_config()).await.unwrap();

        let err = manager.trigger("ghost", chat_trigger()).await.unwrap_err();
        match err {
            SchedulerError::CommandRejected(message) => {
                assert_eq!(message, "unknown agent: ghost")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stop_reports_dormant_status() {
        let backend = Arc::new(StubBackend::default());
        let (manager, _notifications) =
            SchedulerManager::spawn(backend, directory(), vec!["a1".to_string()]);
        manager.start(manual_config()).await.unwrap();

        let status = manager.status().await.unwrap();
        assert!(status.running);
        assert_eq!(status.agents[0].status, AgentStatus::Active);

        manager.stop().await.unwrap();
        let status = manager.status().await.unwrap();
        assert!(!status.running);
        assert_eq!(status.agents[0].status, AgentStatus::Dormant);
    }

    #[tokio::test]
    async fn test_notifications_forwarded() {
        let backend = Arc::new(StubBackend::default());
        let (manager, mut notifications) =
            SchedulerManager::spawn(backend, directory(), vec!["a1".to_string()]);
        manager.start(manual_config()).await.unwrap();
        manager.trigger("a1", chat_trigger()).await.unwrap();
        manager.tick().await.unwrap();

        let mut saw_state_change = false;
        let mut saw_result = false;
        while let Ok(notification) = notifications.try_recv() {
            match notification {
                SchedulerNotification::AgentStateChanged { .. } => saw_state_change = true,
                SchedulerNotification::EventProcessed { result } => {
                    assert!(result.success);
                    saw_result = true;
                }
                SchedulerNotification::SchedulerError { .. } => {}
            }
        }
        assert!(saw_state_change);
        assert!(saw_result);
    }

    #[tokio::test]
    async fn test_driver_never_overlaps_ticks() {
        let backend = Arc::new(StubBackend::default());
        *backend.delay.lock().unwrap() = Some(Duration::from_millis(80));
        let (manager, _notifications) =
            SchedulerManager::spawn(backend.clone(), directory(), vec!["a1".to_string()]);

        let config = SimulationConfig {
            tick_rate_ms: 10,
            ..SimulationConfig::default()
        };
        manager.start(config).await.unwrap();
        manager.trigger("a1", chat_trigger()).await.unwrap();
        manager.trigger("a1", chat_trigger()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(backend.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(backend.generate_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_shutdown_abandons_in_flight_work() {
        let backend = Arc::new(StubBackend::default());
        *backend.delay.lock().unwrap() = Some(Duration::from_millis(400));
        let (manager, _notifications) =
            SchedulerManager::spawn(backend.clone(), directory(), vec!["a1".to_string()]);

        let config = SimulationConfig {
            tick_rate_ms: 10,
            ..SimulationConfig::default()
        };
        manager.start(config).await.unwrap();
        manager.trigger("a1", chat_trigger()).await.unwrap();

        // Let the driver pop the event, then tear the worker down mid-call.
        tokio::time::sleep(Duration::from_millis(100)).await;
        manager.shutdown();
        tokio::time::sleep(Duration::from_millis(500)).await;

        // The generate call never completed and the worker is gone.
        assert_eq!(backend.generate_calls.load(Ordering::SeqCst), 0);
        assert!(matches!(
            manager.status().await,
            Err(SchedulerError::WorkerGone)
        ));
    }
}
