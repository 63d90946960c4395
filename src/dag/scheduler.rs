// src/dag/scheduler.rs

use tracing::{debug, info, warn};

use crate::dag::graph::TaskGraph;
use crate::dag::resolver::DependencyResolver;
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::task_info::{StatusEvent, TaskStatus};
use crate::errors::{PlandagError, Result, TaskError, ValidationError};
use crate::plan::{Plan, TaskId};
use crate::types::TieBreak;

/// Scheduler owns the task graph plus the slot budget.
///
/// It is responsible for:
/// - promoting tasks whose dependencies completed to `ready`
/// - moving ready tasks to `running` without exceeding `max_concurrency`
/// - applying completion, failure, retry, skip and cancellation transitions
///
/// Readiness and the `running` transition happen inside the same `&mut self`
/// call, so a task can never be handed out twice.
#[derive(Debug)]
pub struct Scheduler {
    graph: TaskGraph,
    resolver: DependencyResolver,
    max_concurrency: usize,
}

impl Scheduler {
    pub fn new(graph: TaskGraph, resolver: DependencyResolver, max_concurrency: usize) -> Self {
        Self {
            graph,
            resolver,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Construct a scheduler for a plan, validating it first.
    pub fn from_plan(
        plan: &Plan,
        tie_break: TieBreak,
        max_concurrency: usize,
    ) -> std::result::Result<Self, ValidationError> {
        let graph = TaskGraph::from_plan(plan)?;
        Ok(Self::new(
            graph,
            DependencyResolver::new(tie_break),
            max_concurrency,
        ))
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// Drain the status changes recorded since the last call.
    pub fn take_status_events(&mut self) -> Vec<StatusEvent> {
        self.graph.take_changes()
    }

    pub fn resolver(&self) -> &DependencyResolver {
        &self.resolver
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn running_count(&self) -> usize {
        self.graph.count(TaskStatus::Running)
    }

    pub fn free_slots(&self) -> usize {
        self.max_concurrency.saturating_sub(self.running_count())
    }

    pub fn ready_tasks(&self) -> Vec<TaskId> {
        self.resolver.ready_tasks(&self.graph)
    }

    /// Promote newly ready tasks, then dispatch as many ready tasks as there
    /// are free slots.
    pub fn step(&mut self) -> SchedulerStep {
        let mut step = SchedulerStep::default();

        for idx in self.resolver.ready_indices(&self.graph) {
            match self.graph.transition(idx, TaskStatus::Ready, None) {
                Ok(()) => step.newly_ready.push(self.graph.node(idx).spec.id.clone()),
                Err(e) => warn!(error = %e, "failed to promote task to ready"),
            }
        }

        let mut waiting = self.graph.indices_with_status(TaskStatus::Ready);
        self.resolver.order(&self.graph, &mut waiting);

        let slots = self.free_slots();
        if waiting.len() > slots {
            debug!(
                ready = waiting.len(),
                slots, "more ready tasks than free slots; remaining tasks wait"
            );
        }

        for idx in waiting.into_iter().take(slots) {
            match self.graph.transition(idx, TaskStatus::Running, None) {
                Ok(()) => step.dispatched.push(self.graph.node(idx).spec.id.clone()),
                Err(e) => warn!(error = %e, "failed to move task to running"),
            }
        }

        step.quiescent = self.is_quiescent();
        step
    }

    pub fn complete(&mut self, task: &str) -> Result<()> {
        self.graph.update_status(task, TaskStatus::Completed)
    }

    pub fn fail(&mut self, task: &str, error: TaskError) -> Result<()> {
        self.graph.fail(task, error)
    }

    pub fn escalate(&mut self, task: &str) -> Result<()> {
        self.graph.update_status(task, TaskStatus::Escalated)
    }

    /// `failed -> pending` or `escalated -> pending`.
    pub fn retry(&mut self, task: &str) -> Result<()> {
        self.graph.update_status(task, TaskStatus::Pending)
    }

    pub fn skip(&mut self, task: &str) -> Result<()> {
        self.graph.update_status(task, TaskStatus::Skipped)
    }

    /// Put tasks that were waiting for a slot back to `pending`.
    pub fn demote_ready(&mut self) -> Vec<TaskId> {
        self.apply_to_all(TaskStatus::Ready, TaskStatus::Pending, None)
    }

    /// Fail every running task with a `Cancelled` error.
    pub fn cancel_running(&mut self, reason: &str) -> Vec<TaskId> {
        let cancelled = self.apply_to_all(
            TaskStatus::Running,
            TaskStatus::Failed,
            Some(TaskError::cancelled(reason)),
        );
        if !cancelled.is_empty() {
            info!(tasks = ?cancelled, reason, "cancelled running tasks");
        }
        cancelled
    }

    fn apply_to_all(
        &mut self,
        from: TaskStatus,
        to: TaskStatus,
        error: Option<TaskError>,
    ) -> Vec<TaskId> {
        let mut changed = Vec::new();
        for idx in self.graph.indices_with_status(from) {
            match self.graph.transition(idx, to, error.clone()) {
                Ok(()) => changed.push(self.graph.node(idx).spec.id.clone()),
                Err(e) => warn!(error = %e, "bulk status transition rejected"),
            }
        }
        changed
    }

    pub fn escalated(&self) -> Vec<TaskId> {
        self.ids_with_status(TaskStatus::Escalated)
    }

    pub fn ids_with_status(&self, status: TaskStatus) -> Vec<TaskId> {
        self.graph
            .indices_with_status(status)
            .into_iter()
            .map(|i| self.graph.node(i).spec.id.clone())
            .collect()
    }

    pub fn attempts_of(&self, task: &str) -> Result<u32> {
        self.graph
            .get(task)
            .map(|n| n.attempts)
            .ok_or_else(|| PlandagError::TaskNotFound(task.to_string()))
    }

    /// Some task is ready or could be promoted right now.
    pub fn has_runnable_work(&self) -> bool {
        self.graph.count(TaskStatus::Ready) > 0
            || !self.resolver.ready_indices(&self.graph).is_empty()
    }

    /// Nothing is running and nothing can become ready.
    pub fn is_quiescent(&self) -> bool {
        self.running_count() == 0 && !self.has_runnable_work()
    }
}
