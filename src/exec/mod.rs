// src/exec/mod.rs

//! Offloaded task execution.
//!
//! - [`backend`] is the seam the runtime talks to.
//! - [`executor_loop`] owns the in-flight attempts and their cancel handles.
//! - [`task_runner`] drives one attempt with timeout and cancellation.

pub mod backend;
pub mod executor_loop;
pub mod task_runner;

pub use backend::{AgentExecutorBackend, BackendFuture, ExecutorBackend};
pub use executor_loop::{ExecRequest, spawn_executor};
