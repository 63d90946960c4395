// src/agent/executor.rs

//! The interface external agents implement.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::artifact::Artifact;
use crate::errors::TaskError;
use crate::plan::TaskSpec;

/// Everything an agent gets to see for one attempt of one task.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub task: TaskSpec,
    /// 1-based.
    pub attempt: u32,
    /// Latest committed version of every artifact at dispatch time.
    pub artifacts: Vec<Artifact>,
}

/// Output an agent hands back on success. Versioning happens in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducedArtifact {
    pub name: String,
    pub content: String,
}

impl ProducedArtifact {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// A specialist that can carry out tasks.
///
/// Implementations may suspend on IO for as long as they like; the
/// orchestrator runs each call on its own Tokio task and enforces timeouts
/// and cancellation by dropping the future.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    async fn execute(&self, request: AgentRequest) -> Result<Vec<ProducedArtifact>, TaskError>;
}
