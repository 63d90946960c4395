// src/engine/mod.rs

//! Orchestration engine for plandag.
//!
//! This module ties together:
//! - the task scheduler and failure policy
//! - the agent router and artifact store
//! - the main runtime event loop that reacts to:
//!   - task completion events from executors
//!   - operator control commands (pause / resume / abort)
//!   - shutdown requests
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use std::time::Duration;

use crate::agent::ProducedArtifact;
use crate::errors::TaskError;
use crate::plan::TaskId;
use crate::types::ResumeDecision;

/// Outcome of one task attempt as reported by the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success(Vec<ProducedArtifact>),
    Failed(TaskError),
}

/// Operator input accepted while a run is live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    Pause,
    /// `task = None` applies the decision to every escalated task.
    Resume {
        decision: ResumeDecision,
        task: Option<TaskId>,
    },
    Abort,
}

/// Runtime options used by the core.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Used when neither the task nor its agent sets a timeout.
    pub default_timeout: Option<Duration>,
    /// End the run with a `suspended` report once nothing is in flight,
    /// instead of waiting for an operator decision.
    pub exit_when_suspended: bool,
}

/// Events flowing into the runtime from executors and operators.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// An agent attempt ended. `attempt` identifies which dispatch this is
    /// the result of; results for older attempts are ignored.
    TaskFinished {
        task: TaskId,
        attempt: u32,
        outcome: TaskOutcome,
    },
    Control(ControlCommand),
    /// Stop now, cancelling whatever is in flight.
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod events;
pub mod report;
pub mod runtime;

pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use events::{HandoffRecord, RunEvent};
pub use report::{FailureReport, RunReport, TaskReport};
pub use runtime::Runtime;
