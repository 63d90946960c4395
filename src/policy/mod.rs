// src/policy/mod.rs

//! Failure policy: what the scheduler does after a task fails.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::TaskError;
use crate::plan::TaskSpec;

/// Per-task `on_failure` directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnFailure {
    /// Keep going; everything downstream of the task is skipped.
    Proceed,
    /// Stop the whole run.
    #[default]
    Halt,
    /// Hold the task for an operator decision and suspend the run.
    EscalateToUser,
}

/// Scheduler action chosen for a failed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunAction {
    Continue,
    Halt,
    Escalate,
    /// Dispatch the same task again. Only chosen when the task opted in
    /// through its `retries` budget.
    Retry,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FailurePolicy;

impl FailurePolicy {
    pub fn new() -> Self {
        Self
    }

    /// `attempts` is the number of times the task has been dispatched,
    /// including the one that just failed.
    pub fn decide(&self, task: &TaskSpec, attempts: u32, error: &TaskError) -> RunAction {
        if error.kind.is_retryable() && attempts <= task.retries {
            debug!(
                task = %task.id,
                attempts,
                retries = task.retries,
                "retry budget left"
            );
            return RunAction::Retry;
        }

        match task.on_failure {
            OnFailure::Proceed => RunAction::Continue,
            OnFailure::Halt => RunAction::Halt,
            OnFailure::EscalateToUser => RunAction::Escalate,
        }
    }
}
