// src/dag/mod.rs

//! Task graph representation and scheduling.
//!
//! - [`graph`] holds the arena of tasks and enforces status transitions.
//! - [`resolver`] computes which tasks are ready and which are blocked.
//! - [`scheduler`] bounds dispatch by the number of executor slots.
//! - [`task_info`] provides task status, node and dispatch payload types.
//! - [`scheduler_step`] defines the result type for scheduler steps.

pub mod graph;
pub mod resolver;
pub mod scheduler;
pub mod scheduler_step;
pub mod task_info;

pub use graph::{GraphSnapshot, TaskGraph, TaskView};
pub use resolver::DependencyResolver;
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
pub use task_info::{ScheduledTask, StatusEvent, TaskInfo, TaskStatus};
