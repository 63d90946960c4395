// src/agent/router.rs

//! Agent routing and handoff evaluation.
//!
//! Routing is pure: it reads the registry, the handoff rules and a
//! [`GraphSnapshot`], and never mutates anything.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::agent::capability::Capability;
use crate::agent::registry::{AgentHandle, AgentRegistry};
use crate::dag::{GraphSnapshot, TaskStatus};
use crate::errors::RoutingError;
use crate::plan::{TaskId, TaskSpec};

/// Predicate type for handoff conditions defined in code.
pub type SnapshotPredicate = Arc<dyn Fn(&GraphSnapshot) -> bool + Send + Sync>;

/// When a handoff rule applies.
#[derive(Clone)]
pub enum HandoffCondition {
    Always,
    TaskCompleted(TaskId),
    TaskFailed(TaskId),
    /// Every task bound to the capability has completed.
    AgentFinished(Capability),
    Predicate(SnapshotPredicate),
}

impl HandoffCondition {
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&GraphSnapshot) -> bool + Send + Sync + 'static,
    {
        HandoffCondition::Predicate(Arc::new(f))
    }

    pub fn evaluate(&self, snapshot: &GraphSnapshot) -> bool {
        match self {
            HandoffCondition::Always => true,
            HandoffCondition::TaskCompleted(id) => {
                snapshot.status_of(id) == Some(TaskStatus::Completed)
            }
            HandoffCondition::TaskFailed(id) => matches!(
                snapshot.status_of(id),
                Some(TaskStatus::Failed | TaskStatus::Escalated)
            ),
            HandoffCondition::AgentFinished(capability) => {
                snapshot.all_completed_for(*capability)
            }
            HandoffCondition::Predicate(f) => f(snapshot),
        }
    }
}

impl fmt::Debug for HandoffCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandoffCondition::Always => f.write_str("Always"),
            HandoffCondition::TaskCompleted(id) => f.debug_tuple("TaskCompleted").field(id).finish(),
            HandoffCondition::TaskFailed(id) => f.debug_tuple("TaskFailed").field(id).finish(),
            HandoffCondition::AgentFinished(c) => f.debug_tuple("AgentFinished").field(c).finish(),
            HandoffCondition::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Once `condition` holds, tasks bound to `from_agent` are served by
/// `to_agent` instead.
#[derive(Debug, Clone)]
pub struct HandoffRule {
    pub from_agent: Capability,
    pub to_agent: Capability,
    pub condition: HandoffCondition,
}

impl HandoffRule {
    pub fn new(from_agent: Capability, to_agent: Capability, condition: HandoffCondition) -> Self {
        Self {
            from_agent,
            to_agent,
            condition,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AgentRouter {
    registry: AgentRegistry,
    handoffs: Vec<HandoffRule>,
}

impl AgentRouter {
    pub fn new(registry: AgentRegistry, handoffs: Vec<HandoffRule>) -> Self {
        Self { registry, handoffs }
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn handoffs(&self) -> &[HandoffRule] {
        &self.handoffs
    }

    /// The agent registered for the task's own capability.
    pub fn resolve_agent(&self, task: &TaskSpec) -> Result<AgentHandle, RoutingError> {
        self.registry
            .get(task.agent)
            .cloned()
            .ok_or_else(|| RoutingError::UnknownCapability {
                task: task.id.clone(),
                capability: task.agent,
            })
    }

    /// Indices of satisfied rules, in declaration order.
    pub fn satisfied_handoffs(&self, snapshot: &GraphSnapshot) -> Vec<usize> {
        self.handoffs
            .iter()
            .enumerate()
            .filter(|(_, rule)| rule.condition.evaluate(snapshot))
            .map(|(i, _)| i)
            .collect()
    }

    /// Satisfied rules, in declaration order.
    pub fn evaluate_handoffs(&self, snapshot: &GraphSnapshot) -> Vec<&HandoffRule> {
        self.satisfied_handoffs(snapshot)
            .into_iter()
            .map(|i| &self.handoffs[i])
            .collect()
    }

    /// Pick the agent for `task`: the first satisfied handoff away from the
    /// task's capability whose target is registered, else the task's own
    /// capability.
    pub fn route(
        &self,
        task: &TaskSpec,
        snapshot: &GraphSnapshot,
    ) -> Result<AgentHandle, RoutingError> {
        let handed_off = self
            .evaluate_handoffs(snapshot)
            .into_iter()
            .filter(|rule| rule.from_agent == task.agent)
            .find_map(|rule| self.registry.get(rule.to_agent));

        match handed_off {
            Some(handle) => {
                debug!(
                    task = %task.id,
                    from = %task.agent,
                    to = %handle.capability,
                    "task routed through handoff"
                );
                Ok(handle.clone())
            }
            None => self.resolve_agent(task),
        }
    }
}
