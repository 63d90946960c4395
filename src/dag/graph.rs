// src/dag/graph.rs

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use serde::Serialize;
use tracing::{debug, info};

use crate::agent::Capability;
use crate::dag::task_info::{StatusEvent, TaskInfo, TaskStatus};
use crate::errors::{InvalidTransition, PlandagError, Result, TaskError, ValidationError};
use crate::plan::{Plan, TaskId, validate_plan};

/// Arena of tasks addressed by declaration index.
///
/// All status mutation goes through [`TaskGraph::update_status`] (or the
/// `fail` shortcut), which enforces the legal transition table and appends
/// to an ordered buffer of [`StatusEvent`]s.
#[derive(Debug, Default)]
pub struct TaskGraph {
    goal: String,
    nodes: Vec<TaskInfo>,
    index: HashMap<TaskId, usize>,
    /// Dependencies before dependents.
    topo_order: Vec<usize>,
    changes: Vec<StatusEvent>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_plan(plan: &Plan) -> std::result::Result<Self, ValidationError> {
        let mut graph = Self::new();
        graph.add_plan(plan)?;
        Ok(graph)
    }

    /// Validate `plan` and replace whatever the graph held before.
    ///
    /// On error the graph is left untouched.
    pub fn add_plan(&mut self, plan: &Plan) -> std::result::Result<(), ValidationError> {
        let edges = validate_plan(plan)?;

        let mut nodes: Vec<TaskInfo> = plan
            .tasks
            .iter()
            .zip(edges)
            .map(|(spec, deps)| TaskInfo {
                spec: spec.clone(),
                status: spec.status,
                deps,
                dependents: Vec::new(),
                attempts: 0,
                last_error: None,
            })
            .collect();

        for task in 0..nodes.len() {
            for dep in nodes[task].deps.clone() {
                nodes[dep].dependents.push(task);
            }
        }

        let topo_order = topological_order(&nodes)?;

        self.goal = plan.goal.clone();
        self.index = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.spec.id.clone(), i))
            .collect();
        self.nodes = nodes;
        self.topo_order = topo_order;
        self.changes.clear();

        info!(goal = %self.goal, tasks = self.nodes.len(), "plan added to task graph");
        Ok(())
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[TaskInfo] {
        &self.nodes
    }

    pub fn node(&self, idx: usize) -> &TaskInfo {
        &self.nodes[idx]
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn get(&self, id: &str) -> Option<&TaskInfo> {
        self.index_of(id).map(|i| &self.nodes[i])
    }

    pub fn status_of(&self, id: &str) -> Option<TaskStatus> {
        self.get(id).map(|n| n.status)
    }

    pub fn topo_order(&self) -> &[usize] {
        &self.topo_order
    }

    /// Indices of all tasks currently in `status`, in declaration order.
    pub fn indices_with_status(&self, status: TaskStatus) -> Vec<usize> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.status == status)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        self.nodes.iter().filter(|n| n.status == status).count()
    }

    /// Move task `id` to `new_status`, enforcing the transition table.
    pub fn update_status(&mut self, id: &str, new_status: TaskStatus) -> Result<()> {
        let idx = self
            .index_of(id)
            .ok_or_else(|| PlandagError::TaskNotFound(id.to_string()))?;
        self.transition(idx, new_status, None)?;
        Ok(())
    }

    /// `running -> failed`, recording `error` on the node.
    pub fn fail(&mut self, id: &str, error: TaskError) -> Result<()> {
        let idx = self
            .index_of(id)
            .ok_or_else(|| PlandagError::TaskNotFound(id.to_string()))?;
        self.transition(idx, TaskStatus::Failed, Some(error))?;
        Ok(())
    }

    pub(crate) fn transition(
        &mut self,
        idx: usize,
        new_status: TaskStatus,
        error: Option<TaskError>,
    ) -> std::result::Result<(), InvalidTransition> {
        let node = &mut self.nodes[idx];
        let old_status = node.status;

        if !old_status.can_transition_to(new_status) {
            return Err(InvalidTransition {
                task: node.spec.id.clone(),
                from: old_status,
                to: new_status,
            });
        }

        node.status = new_status;
        match new_status {
            TaskStatus::Running => node.attempts += 1,
            TaskStatus::Completed => node.last_error = None,
            _ => {}
        }
        if let Some(err) = error {
            node.last_error = Some(err);
        }

        let error_kind = match new_status {
            TaskStatus::Failed | TaskStatus::Escalated => {
                node.last_error.as_ref().map(|e| e.kind)
            }
            _ => None,
        };

        debug!(
            task = %node.spec.id,
            from = %old_status,
            to = %new_status,
            ?error_kind,
            "task status changed"
        );

        self.changes.push(StatusEvent {
            task_id: node.spec.id.clone(),
            old_status,
            new_status,
            timestamp: Utc::now(),
            error_kind,
        });
        Ok(())
    }

    /// Drain the status events recorded since the last call.
    pub fn take_changes(&mut self) -> Vec<StatusEvent> {
        std::mem::take(&mut self.changes)
    }

    /// Group tasks into waves: every task in wave `n` only depends on tasks
    /// in earlier waves. Used by `--dry-run`.
    pub fn execution_waves(&self) -> Vec<Vec<TaskId>> {
        let mut level = vec![0usize; self.nodes.len()];
        for &idx in &self.topo_order {
            level[idx] = self.nodes[idx]
                .deps
                .iter()
                .map(|&d| level[d] + 1)
                .max()
                .unwrap_or(0);
        }

        let depth = level.iter().copied().max().map_or(0, |m| m + 1);
        let mut waves = vec![Vec::new(); depth];
        for (idx, node) in self.nodes.iter().enumerate() {
            waves[level[idx]].push(node.spec.id.clone());
        }
        waves
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        let tasks = self
            .nodes
            .iter()
            .map(|n| TaskView {
                id: n.spec.id.clone(),
                name: n.spec.display_name().to_string(),
                agent: n.spec.agent,
                status: n.status,
                dependencies: n
                    .deps
                    .iter()
                    .map(|&d| self.nodes[d].spec.id.clone())
                    .collect(),
                attempts: n.attempts,
                error: n.last_error.clone(),
            })
            .collect();

        GraphSnapshot {
            inner: Arc::new(SnapshotInner {
                goal: self.goal.clone(),
                tasks,
                index: self.index.clone(),
            }),
        }
    }
}

fn topological_order(nodes: &[TaskInfo]) -> std::result::Result<Vec<usize>, ValidationError> {
    let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();
    for (idx, node) in nodes.iter().enumerate() {
        graph.add_node(idx);
        for &dep in &node.deps {
            graph.add_edge(dep, idx, ());
        }
    }

    toposort(&graph, None).map_err(|cycle| {
        ValidationError::Cycle(vec![nodes[cycle.node_id()].spec.id.clone()])
    })
}

/// Read-only view of one task inside a [`GraphSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskView {
    pub id: TaskId,
    pub name: String,
    pub agent: Capability,
    pub status: TaskStatus,
    pub dependencies: Vec<TaskId>,
    pub attempts: u32,
    pub error: Option<TaskError>,
}

/// Immutable, cheaply clonable copy of the graph state.
///
/// Handoff predicates and dashboards only ever see snapshots, never the
/// live graph.
#[derive(Debug, Clone)]
pub struct GraphSnapshot {
    inner: Arc<SnapshotInner>,
}

#[derive(Debug)]
struct SnapshotInner {
    goal: String,
    tasks: Vec<TaskView>,
    index: HashMap<TaskId, usize>,
}

impl Default for GraphSnapshot {
    fn default() -> Self {
        Self {
            inner: Arc::new(SnapshotInner {
                goal: String::new(),
                tasks: Vec::new(),
                index: HashMap::new(),
            }),
        }
    }
}

impl GraphSnapshot {
    pub fn goal(&self) -> &str {
        &self.inner.goal
    }

    pub fn tasks(&self) -> &[TaskView] {
        &self.inner.tasks
    }

    pub fn task(&self, id: &str) -> Option<&TaskView> {
        self.inner.index.get(id).map(|&i| &self.inner.tasks[i])
    }

    pub fn status_of(&self, id: &str) -> Option<TaskStatus> {
        self.task(id).map(|t| t.status)
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        self.inner.tasks.iter().filter(|t| t.status == status).count()
    }

    /// `true` when at least one task is bound to `capability` and all such
    /// tasks are completed.
    pub fn all_completed_for(&self, capability: Capability) -> bool {
        let mut bound = self
            .inner
            .tasks
            .iter()
            .filter(|t| t.agent == capability)
            .peekable();
        bound.peek().is_some() && bound.all(|t| t.status == TaskStatus::Completed)
    }
}
