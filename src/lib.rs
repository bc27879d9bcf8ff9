//! crewsim - autonomous workplace persona simulation
//!
//! Simulated colleagues observe events from a workplace collaboration
//! product (chat messages, emails, meetings, idle moments) and decide via a
//! local LLM backend whether and how to react. The core is a
//! discrete-event scheduler: a priority-queue-driven tick loop that turns
//! asynchronous events into serialized per-agent decisions while tolerating
//! an unreliable inference backend.
//!
//! The scheduler runs inside a worker task reachable only through the
//! [`agents::SchedulerManager`] command channel; hosts that do not need the
//! isolation boundary can drive [`agents::AgentScheduler`] directly.

pub mod agents;
pub mod ai;
pub mod config;
pub mod core;

pub use agents::{AgentScheduler, SchedulerManager};
pub use ai::{InferenceBackend, OllamaClient};
pub use config::SimulationConfig;
