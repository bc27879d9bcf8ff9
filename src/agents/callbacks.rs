//! Scheduler lifecycle callbacks
//! Observe-only hooks the host wires to its own side effects. Default
//! implementations do nothing, so hosts override only what they need.

use async_trait::async_trait;

use super::actions::ActionResult;
use super::scheduler::AgentRuntimeState;

#[async_trait]
pub trait SchedulerCallbacks: Send + Sync {
    /// An agent's runtime state changed (status, pending count, activity).
    async fn on_agent_state_change(&self, state: &AgentRuntimeState) {
        let _ = state;
    }

    /// One scheduled event resolved to exactly one result.
    async fn on_event_processed(&self, result: &ActionResult) {
        let _ = result;
    }

    /// Something failed outside the modeled failure taxonomy.
    async fn on_error(&self, message: &str) {
        let _ = message;
    }
}

/// Callbacks that do nothing.
pub struct NoopCallbacks;

#[async_trait]
impl SchedulerCallbacks for NoopCallbacks {}
