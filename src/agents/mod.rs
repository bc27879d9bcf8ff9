//! Agent scheduling core
//! Queue, event model, persona/protocol layer, the tick scheduler, and the
//! worker/manager isolation boundary.

pub mod actions;
pub mod callbacks;
pub mod events;
pub mod persona;
pub mod protocol;
pub mod queue;
pub mod scheduler;
pub mod worker;

pub use actions::{ActionResult, AgentAction, AgentActionKind};
pub use callbacks::{NoopCallbacks, SchedulerCallbacks};
pub use events::{tier_of, AgentEventType, ReactionTier, ScheduledEvent};
pub use persona::{PersonnelDirectory, PersonnelProfile, StaticDirectory};
pub use scheduler::{AgentRuntimeState, AgentScheduler, AgentStatus};
pub use worker::{
    SchedulerCommand, SchedulerError, SchedulerManager, SchedulerNotification, SchedulerResponse,
    SchedulerStatus, TriggerEvent,
};
