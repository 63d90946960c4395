// src/dag/resolver.rs

use std::cmp::Reverse;

use crate::dag::graph::TaskGraph;
use crate::dag::task_info::TaskStatus;
use crate::plan::TaskId;
use crate::types::TieBreak;

/// Stateless readiness computation over a [`TaskGraph`].
///
/// Everything is recomputed from scratch on each call, in
/// O(tasks + dependency edges).
#[derive(Debug, Clone, Copy, Default)]
pub struct DependencyResolver {
    tie_break: TieBreak,
}

impl DependencyResolver {
    pub fn new(tie_break: TieBreak) -> Self {
        Self { tie_break }
    }

    pub fn tie_break(&self) -> TieBreak {
        self.tie_break
    }

    /// Ids of pending tasks whose dependencies are all completed, in
    /// tie-break order.
    pub fn ready_tasks(&self, graph: &TaskGraph) -> Vec<TaskId> {
        self.ready_indices(graph)
            .into_iter()
            .map(|i| graph.node(i).spec.id.clone())
            .collect()
    }

    pub(crate) fn ready_indices(&self, graph: &TaskGraph) -> Vec<usize> {
        let nodes = graph.nodes();
        let mut ready: Vec<usize> = nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| {
                n.status == TaskStatus::Pending
                    && n.deps
                        .iter()
                        .all(|&d| nodes[d].status == TaskStatus::Completed)
            })
            .map(|(i, _)| i)
            .collect();
        self.order(graph, &mut ready);
        ready
    }

    /// Sort `indices` (assumed to be in declaration order) by the tie-break.
    pub(crate) fn order(&self, graph: &TaskGraph, indices: &mut [usize]) {
        match self.tie_break {
            TieBreak::DeclarationOrder => indices.sort_unstable(),
            TieBreak::MostDependents => {
                indices.sort_by_key(|&i| (Reverse(graph.node(i).dependents.len()), i))
            }
        }
    }

    /// For every pending task that can no longer become ready, the index of
    /// the upstream task responsible (a failed, escalated or skipped task,
    /// possibly several hops away). Indexed by node; `None` for unblocked.
    ///
    /// Non-pending blocking tasks map to themselves so callers can look up
    /// origins uniformly.
    pub fn blockers(&self, graph: &TaskGraph) -> Vec<Option<usize>> {
        let nodes = graph.nodes();
        let mut origin: Vec<Option<usize>> = vec![None; nodes.len()];

        for &idx in graph.topo_order() {
            let node = &nodes[idx];
            origin[idx] = if node.status.blocks_dependents() {
                Some(idx)
            } else if node.status == TaskStatus::Pending {
                node.deps.iter().find_map(|&d| origin[d])
            } else {
                None
            };
        }
        origin
    }

    /// `(blocked task, origin)` pairs for pending tasks that will never run.
    pub fn blocked_tasks(&self, graph: &TaskGraph) -> Vec<(TaskId, TaskId)> {
        let origins = self.blockers(graph);
        graph
            .nodes()
            .iter()
            .enumerate()
            .filter(|(_, n)| n.status == TaskStatus::Pending)
            .filter_map(|(i, n)| {
                origins[i].map(|o| (n.spec.id.clone(), graph.node(o).spec.id.clone()))
            })
            .collect()
    }
}
