// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime talks to an `ExecutorBackend` instead of a raw mpsc sender.
//! This makes it easy to swap in a fake executor in tests while keeping the
//! production executor in [`executor_loop`](super::executor_loop).
//!
//! - `AgentExecutorBackend` is the default implementation. It forwards
//!   dispatch and cancel requests to the background executor loop, which
//!   calls the task's agent on its own Tokio task.
//! - Tests can provide their own `ExecutorBackend` that, for example, records
//!   which tasks were dispatched and directly emits `TaskFinished` events.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

use crate::dag::ScheduledTask;
use crate::engine::RuntimeEvent;
use crate::errors::{Error, Result};
use crate::plan::TaskId;

use super::executor_loop::{ExecRequest, spawn_executor};

/// Boxed future returned by [`ExecutorBackend`] methods.
pub type BackendFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Trait abstracting how scheduled tasks are executed.
pub trait ExecutorBackend: Send {
    /// Start the given tasks. Must not wait for them to finish; results come
    /// back as `RuntimeEvent::TaskFinished`.
    fn spawn_ready_tasks(&mut self, tasks: Vec<ScheduledTask>) -> BackendFuture<'_>;

    /// Stop the given in-flight tasks. Unknown or already finished ids are
    /// ignored.
    fn cancel_tasks(&mut self, tasks: Vec<TaskId>) -> BackendFuture<'_>;
}

/// Production backend: runs each task's agent on the executor loop.
pub struct AgentExecutorBackend {
    tx: mpsc::Sender<ExecRequest>,
}

impl AgentExecutorBackend {
    /// Create a backend wired to the given runtime event sender.
    ///
    /// This spawns the background executor loop immediately, so it must be
    /// called from within a Tokio runtime.
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        let tx = spawn_executor(runtime_tx);
        Self { tx }
    }
}

impl ExecutorBackend for AgentExecutorBackend {
    fn spawn_ready_tasks(&mut self, tasks: Vec<ScheduledTask>) -> BackendFuture<'_> {
        // Clone the sender so the future doesn't borrow `self` across `await`.
        let tx = self.tx.clone();

        Box::pin(async move {
            for task in tasks {
                tx.send(ExecRequest::Run(task)).await.map_err(Error::from)?;
            }
            Ok(())
        })
    }

    fn cancel_tasks(&mut self, tasks: Vec<TaskId>) -> BackendFuture<'_> {
        let tx = self.tx.clone();

        Box::pin(async move {
            for task in tasks {
                tx.send(ExecRequest::Cancel(task)).await.map_err(Error::from)?;
            }
            Ok(())
        })
    }
}
