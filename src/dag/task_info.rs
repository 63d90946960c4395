// src/dag/task_info.rs

//! Task status, the per-node record kept by the graph, and the dispatch
//! payload handed to executors.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::AgentHandle;
use crate::artifact::Artifact;
use crate::errors::{ErrorKind, TaskError};
use crate::plan::{TaskId, TaskSpec};

/// Lifecycle status of a single task.
///
/// ```text
/// pending -> ready -> running -> completed
///                        |
///                        +-> failed -> escalated -> skipped
///                              |           |
///                              +-----------+-> pending   (retry)
/// ```
///
/// `ready -> pending` is used when a halt or abort demotes tasks that were
/// waiting for a free slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Ready,
    Running,
    Completed,
    Failed,
    Escalated,
    Skipped,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Ready => "ready",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Escalated => "escalated",
            TaskStatus::Skipped => "skipped",
        }
    }

    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Ready)
                | (Ready, Running)
                | (Ready, Pending)
                | (Running, Completed)
                | (Running, Failed)
                | (Failed, Escalated)
                | (Failed, Pending)
                | (Escalated, Pending)
                | (Escalated, Skipped)
        )
    }

    /// A task in this status blocks its dependents for good (until an
    /// operator retries an escalated one).
    pub fn blocks_dependents(self) -> bool {
        matches!(
            self,
            TaskStatus::Failed | TaskStatus::Escalated | TaskStatus::Skipped
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Graph node: the task as declared plus its mutable run state.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub spec: TaskSpec,
    pub status: TaskStatus,
    /// Effective dependencies (declared + artifact reads), as node indices.
    pub deps: Vec<usize>,
    /// Reverse edges of `deps`.
    pub dependents: Vec<usize>,
    /// Number of times the task has been moved to `running`.
    pub attempts: u32,
    pub last_error: Option<TaskError>,
}

impl TaskInfo {
    pub fn id(&self) -> &str {
        &self.spec.id
    }
}

/// One entry of the ordered status feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEvent {
    pub task_id: TaskId,
    pub old_status: TaskStatus,
    pub new_status: TaskStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

/// A task that has been moved to `running` and must be handed to an agent.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub task: TaskSpec,
    pub agent: AgentHandle,
    /// 1-based attempt number; completions for other attempts are stale.
    pub attempt: u32,
    pub timeout: Option<Duration>,
    /// Latest committed artifacts at dispatch time.
    pub inputs: Vec<Artifact>,
}

impl ScheduledTask {
    pub fn id(&self) -> &str {
        &self.task.id
    }
}
