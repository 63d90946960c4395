// src/engine/report.rs

use serde::Serialize;
use uuid::Uuid;

use crate::agent::Capability;
use crate::dag::TaskStatus;
use crate::engine::events::HandoffRecord;
use crate::errors::ErrorKind;
use crate::plan::TaskId;
use crate::types::RunState;

/// Why a task did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureReport {
    pub kind: ErrorKind,
    /// The task whose failure is ultimately responsible. Equal to the task's
    /// own id when it failed itself.
    pub origin: TaskId,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskReport {
    pub id: TaskId,
    pub name: String,
    pub agent: Capability,
    /// Pending tasks that can never run are reported as `skipped`.
    pub status: TaskStatus,
    pub attempts: u32,
    pub failure: Option<FailureReport>,
}

/// Terminal summary of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub goal: String,
    pub state: RunState,
    pub tasks: Vec<TaskReport>,
    pub handoffs: Vec<HandoffRecord>,
}

impl RunReport {
    pub fn task(&self, id: &str) -> Option<&TaskReport> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn with_status(&self, status: TaskStatus) -> Vec<&TaskReport> {
        self.tasks.iter().filter(|t| t.status == status).collect()
    }

    pub fn skipped(&self) -> Vec<&TaskReport> {
        self.with_status(TaskStatus::Skipped)
    }

    pub fn is_success(&self) -> bool {
        self.state == RunState::Completed
    }

    pub fn summary(&self) -> String {
        let completed = self.with_status(TaskStatus::Completed).len();
        let failed = self.with_status(TaskStatus::Failed).len();
        let skipped = self.skipped().len();
        let escalated = self.with_status(TaskStatus::Escalated).len();
        format!(
            "run {}: {} ({}/{} completed, {} failed, {} skipped, {} escalated)",
            self.run_id,
            self.state,
            completed,
            self.tasks.len(),
            failed,
            skipped,
            escalated
        )
    }
}
