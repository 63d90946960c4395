// src/engine/runtime.rs

use std::fmt;

use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info};

use crate::dag::{GraphSnapshot, ScheduledTask};
use crate::engine::report::RunReport;
use crate::errors::Result;
use crate::exec::ExecutorBackend;
use crate::plan::TaskId;

use super::core::CoreRuntime;
use super::events::RunEvent;
use super::{CoreCommand, CoreStep, RuntimeEvent};

/// Drives the core in response to `RuntimeEvent`s and delegates actual task
/// execution to an `ExecutorBackend`.
///
/// This is a pure IO shell around `CoreRuntime`, which contains all the
/// orchestration semantics. This struct handles async IO: reading events
/// from the channel, dispatching and cancelling tasks, and publishing the
/// status feed and graph snapshots.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
    events_tx: broadcast::Sender<RunEvent>,
    snapshot_tx: watch::Sender<GraphSnapshot>,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(
        core: CoreRuntime,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        executor: E,
        events_tx: broadcast::Sender<RunEvent>,
        snapshot_tx: watch::Sender<GraphSnapshot>,
    ) -> Self {
        Self {
            core,
            event_rx,
            executor,
            events_tx,
            snapshot_tx,
        }
    }

    /// Main event loop.
    ///
    /// - Starts the run and dispatches the initially ready tasks.
    /// - Consumes `RuntimeEvent`s from `event_rx` and feeds them to the core.
    /// - Executes commands returned by the core until it asks to stop.
    pub async fn run(mut self) -> Result<RunReport> {
        info!(run_id = %self.core.run_id(), "plandag runtime started");

        let step = self.core.start();
        let mut keep_running = self.apply(step).await?;

        while keep_running {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    break;
                }
            };

            debug!(?event, "runtime received event");

            let step = self.core.step(event);
            keep_running = self.apply(step).await?;
        }

        let report = self.core.report();
        info!(state = %report.state, "runtime exiting");
        Ok(report)
    }

    async fn apply(&mut self, step: CoreStep) -> Result<bool> {
        for event in step.events {
            // No subscribers is fine; the feed is best-effort for observers.
            let _ = self.events_tx.send(event);
        }
        self.snapshot_tx.send_replace(self.core.snapshot());

        for command in step.commands {
            self.execute_command(command).await?;
        }
        Ok(step.keep_running)
    }

    /// Execute a single command from the core.
    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::DispatchTasks(tasks) => self.spawn_ready(tasks).await?,
            CoreCommand::CancelTasks(tasks) => self.cancel(tasks).await?,
            CoreCommand::RequestExit => {
                debug!("core issued RequestExit command");
            }
        }
        Ok(())
    }

    async fn spawn_ready(&mut self, tasks: Vec<ScheduledTask>) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }

        let ids: Vec<_> = tasks.iter().map(|t| t.id()).collect();
        debug!(?ids, "spawning ready tasks");

        self.executor.spawn_ready_tasks(tasks).await
    }

    async fn cancel(&mut self, tasks: Vec<TaskId>) -> Result<()> {
        debug!(?tasks, "cancelling in-flight tasks");
        self.executor.cancel_tasks(tasks).await
    }
}
