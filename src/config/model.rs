// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::agent::{Capability, HandoffCondition, HandoffRule};
use crate::plan::TaskId;
use crate::types::{TieBreak, deserialize_opt_duration};

/// Configuration as read from `Plandag.toml`, before validation.
///
/// ```toml
/// [orchestrator]
/// max_concurrency = 4
/// task_timeout = "10m"
///
/// [agent.coder]
/// cmd = "./agents/coder.sh"
/// timeout = "5m"
///
/// [[handoff]]
/// from = "coder"
/// to = "reviewer"
/// when = { task_completed = "implement" }
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub orchestrator: OrchestratorSection,

    /// `[agent.<capability>]` tables, keyed by capability tag.
    #[serde(default)]
    pub agent: BTreeMap<String, AgentConfig>,

    /// `[[handoff]]` entries, in declaration order.
    #[serde(default)]
    pub handoff: Vec<HandoffConfig>,
}

/// Validated configuration. Construct through `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    pub orchestrator: OrchestratorSection,
    pub agent: BTreeMap<Capability, AgentConfig>,
    pub handoff: Vec<HandoffConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        orchestrator: OrchestratorSection,
        agent: BTreeMap<Capability, AgentConfig>,
        handoff: Vec<HandoffConfig>,
    ) -> Self {
        Self {
            orchestrator,
            agent,
            handoff,
        }
    }

    pub fn handoff_rules(&self) -> Vec<HandoffRule> {
        self.handoff
            .iter()
            .map(|h| HandoffRule::new(h.from, h.to, HandoffCondition::from(&h.when)))
            .collect()
    }
}

/// `[orchestrator]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorSection {
    /// Number of executor slots.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Timeout for tasks whose own definition and agent set none.
    #[serde(default, deserialize_with = "deserialize_opt_duration")]
    pub task_timeout: Option<Duration>,

    #[serde(default)]
    pub tie_break: TieBreak,

    /// End the run once it is suspended and idle instead of waiting for an
    /// operator decision.
    #[serde(default)]
    pub exit_when_suspended: bool,

    /// Buffer size of the status feed; slow subscribers lag past this.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Root directory for shell agent workspaces.
    #[serde(default = "default_workspace")]
    pub workspace: PathBuf,
}

fn default_max_concurrency() -> usize {
    4
}

fn default_event_capacity() -> usize {
    1024
}

fn default_workspace() -> PathBuf {
    PathBuf::from(".plandag/workspace")
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            task_timeout: None,
            tie_break: TieBreak::default(),
            exit_when_suspended: false,
            event_capacity: default_event_capacity(),
            workspace: default_workspace(),
        }
    }
}

/// `[agent.<capability>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Shell command run once per task attempt.
    pub cmd: String,

    #[serde(default, deserialize_with = "deserialize_opt_duration")]
    pub timeout: Option<Duration>,

    /// Extra environment variables for the command.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// `[[handoff]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct HandoffConfig {
    pub from: Capability,
    pub to: Capability,
    #[serde(default)]
    pub when: HandoffWhen,
}

/// Declarative handoff conditions: `"always"`, `{ task_completed = "id" }`,
/// `{ task_failed = "id" }` or `{ agent_finished = "coder" }`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffWhen {
    #[default]
    Always,
    TaskCompleted(TaskId),
    TaskFailed(TaskId),
    AgentFinished(Capability),
}

impl HandoffWhen {
    /// Task id this condition refers to, if any.
    pub fn task_ref(&self) -> Option<&str> {
        match self {
            HandoffWhen::TaskCompleted(id) | HandoffWhen::TaskFailed(id) => Some(id),
            HandoffWhen::Always | HandoffWhen::AgentFinished(_) => None,
        }
    }
}

impl From<&HandoffWhen> for HandoffCondition {
    fn from(when: &HandoffWhen) -> Self {
        match when {
            HandoffWhen::Always => HandoffCondition::Always,
            HandoffWhen::TaskCompleted(id) => HandoffCondition::TaskCompleted(id.clone()),
            HandoffWhen::TaskFailed(id) => HandoffCondition::TaskFailed(id.clone()),
            HandoffWhen::AgentFinished(c) => HandoffCondition::AgentFinished(*c),
        }
    }
}
