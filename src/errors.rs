// src/errors.rs

//! Crate-wide error types.
//!
//! [`PlandagError`] is what library entry points return. Per-task failures are
//! not errors of the orchestrator itself; they travel as [`TaskError`] values
//! through the failure policy and end up in the run report.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::agent::Capability;
use crate::dag::TaskStatus;
use crate::plan::TaskId;

#[derive(Error, Debug)]
pub enum PlandagError {
    #[error("Plan validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("run is no longer accepting control commands")]
    RunClosed,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PlandagError>;

/// Structural problems with a submitted plan. Reported before any task runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("duplicate task id '{0}'")]
    DuplicateId(TaskId),

    #[error("invalid task id '{0}' (allowed: letters, digits, '_', '-', '.')")]
    InvalidId(String),

    #[error("task '{task}' depends on unknown task '{dependency}'")]
    DanglingDependency { task: TaskId, dependency: TaskId },

    #[error("task '{task}' reads artifact '{artifact}' which no task produces")]
    UnknownArtifact { task: TaskId, artifact: String },

    #[error("cycle detected in task graph: {}", .0.join(" -> "))]
    Cycle(Vec<TaskId>),

    #[error("task '{task}' may not start in status '{status}' (only pending or completed)")]
    InvalidInitialStatus { task: TaskId, status: TaskStatus },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid status transition for task '{task}': {from} -> {to}")]
pub struct InvalidTransition {
    pub task: TaskId,
    pub from: TaskStatus,
    pub to: TaskStatus,
}

/// Read-side failures of the artifact store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArtifactError {
    #[error("artifact '{0}' not found: no task produces it")]
    NotFound(String),

    #[error("artifact '{name}' not ready: producer '{producer}' has not completed")]
    NotReady { name: String, producer: TaskId },

    #[error("artifact '{name}' has no version {version}")]
    VersionNotFound { name: String, version: u64 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    #[error("no agent registered for capability '{capability}' (task '{task}')")]
    UnknownCapability { task: TaskId, capability: Capability },
}

/// Classification of a single task failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnknownCapability,
    Execution,
    Timeout,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::UnknownCapability => "unknown_capability",
            ErrorKind::Execution => "execution",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
        }
    }

    /// Kinds an explicit `retries` budget may re-dispatch.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Execution | ErrorKind::Timeout)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct TaskError {
    pub kind: ErrorKind,
    pub message: String,
}

impl TaskError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Execution, message)
    }

    pub fn timeout(limit: Duration) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!("task exceeded its timeout of {limit:?}"),
        )
    }

    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, reason)
    }
}

impl From<RoutingError> for TaskError {
    fn from(err: RoutingError) -> Self {
        Self::new(ErrorKind::UnknownCapability, err.to_string())
    }
}
