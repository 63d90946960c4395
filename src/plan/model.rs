// src/plan/model.rs

use std::time::Duration;

use serde::Deserialize;

use crate::agent::Capability;
use crate::dag::TaskStatus;
use crate::policy::OnFailure;
use crate::types::deserialize_opt_duration;

/// Canonical task id type used throughout the crate.
pub type TaskId = String;

/// A goal plus its decomposition into tasks.
///
/// Plans arrive from an external planning step, either as JSON:
///
/// ```json
/// { "goal": "ship it",
///   "tasks": [ { "id": "design", "agent": "architect" },
///              { "id": "build", "agent": "coder", "dependencies": ["design"] } ] }
/// ```
///
/// or as TOML with `[[tasks]]` tables. Task order is significant: it is the
/// default tie-break when several tasks become ready together.
#[derive(Debug, Clone, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub goal: String,

    #[serde(default, alias = "task")]
    pub tasks: Vec<TaskSpec>,
}

impl Plan {
    pub fn new(goal: impl Into<String>, tasks: Vec<TaskSpec>) -> Self {
        Self {
            goal: goal.into(),
            tasks,
        }
    }

    pub fn task(&self, id: &str) -> Option<&TaskSpec> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// One unit of work bound to a specialist capability.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskSpec {
    pub id: TaskId,

    /// Human-readable name; falls back to the id when empty.
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub goal: String,

    #[serde(alias = "assigned_agent")]
    pub agent: Capability,

    /// Ids of tasks that must be `completed` before this one is ready.
    #[serde(default, alias = "after")]
    pub dependencies: Vec<TaskId>,

    /// Seed status. Only `pending` and `completed` are accepted.
    #[serde(default)]
    pub status: TaskStatus,

    #[serde(default)]
    pub on_failure: OnFailure,

    /// Artifact names this task is expected to write.
    #[serde(default, alias = "produced_artifacts")]
    pub produces: Vec<String>,

    /// Artifact names this task consumes. Each one adds an implicit
    /// dependency on the task producing it.
    #[serde(default)]
    pub reads: Vec<String>,

    #[serde(default, deserialize_with = "deserialize_opt_duration")]
    pub timeout: Option<Duration>,

    /// Explicit retry budget for execution errors and timeouts.
    #[serde(default)]
    pub retries: u32,
}

impl TaskSpec {
    pub fn new(id: impl Into<TaskId>, agent: Capability) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            goal: String::new(),
            agent,
            dependencies: Vec::new(),
            status: TaskStatus::Pending,
            on_failure: OnFailure::default(),
            produces: Vec::new(),
            reads: Vec::new(),
            timeout: None,
            retries: 0,
        }
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = goal.into();
        self
    }

    pub fn after(mut self, dependency: impl Into<TaskId>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    pub fn on_failure(mut self, policy: OnFailure) -> Self {
        self.on_failure = policy;
        self
    }

    pub fn produces(mut self, artifact: impl Into<String>) -> Self {
        self.produces.push(artifact.into());
        self
    }

    pub fn reads(mut self, artifact: impl Into<String>) -> Self {
        self.reads.push(artifact.into());
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }
}
