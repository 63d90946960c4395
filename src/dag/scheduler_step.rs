// src/dag/scheduler_step.rs

//! Step-by-step execution result types for the scheduler.

use crate::plan::TaskId;

/// Structured result of a single [`Scheduler::step`](crate::dag::Scheduler::step).
///
/// Useful for tests that drive the graph by hand and assert on what changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStep {
    /// Tasks promoted `pending -> ready` in this step.
    pub newly_ready: Vec<TaskId>,
    /// Tasks moved `ready -> running` in this step, in dispatch order.
    pub dispatched: Vec<TaskId>,
    /// Nothing is running and nothing can become ready.
    pub quiescent: bool,
}
