use std::sync::{Arc, Mutex};

use plandag::agent::ProducedArtifact;
use plandag::dag::ScheduledTask;
use plandag::engine::{RuntimeEvent, TaskOutcome};
use plandag::exec::{BackendFuture, ExecutorBackend};
use plandag::plan::TaskId;

/// A fake executor backend that:
/// - records which tasks were dispatched (and cancelled)
/// - immediately reports success for each dispatched task, writing every
///   artifact the task declares.
///
/// It bypasses the agents entirely, so only the core's scheduling
/// semantics are exercised.
pub struct FakeExecutor {
    runtime_tx: tokio::sync::mpsc::Sender<RuntimeEvent>,
    executed: Arc<Mutex<Vec<TaskId>>>,
    cancelled: Arc<Mutex<Vec<TaskId>>>,
}

impl FakeExecutor {
    pub fn new(
        runtime_tx: tokio::sync::mpsc::Sender<RuntimeEvent>,
        executed: Arc<Mutex<Vec<TaskId>>>,
    ) -> Self {
        Self {
            runtime_tx,
            executed,
            cancelled: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_cancel_log(mut self, cancelled: Arc<Mutex<Vec<TaskId>>>) -> Self {
        self.cancelled = cancelled;
        self
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_ready_tasks(&mut self, tasks: Vec<ScheduledTask>) -> BackendFuture<'_> {
        let tx = self.runtime_tx.clone();
        let executed = Arc::clone(&self.executed);

        Box::pin(async move {
            for t in tasks {
                executed.lock().unwrap().push(t.task.id.clone());

                let produced = t
                    .task
                    .produces
                    .iter()
                    .map(|name| ProducedArtifact::new(name.clone(), format!("{} output", t.task.id)))
                    .collect();

                tx.send(RuntimeEvent::TaskFinished {
                    task: t.task.id.clone(),
                    attempt: t.attempt,
                    outcome: TaskOutcome::Success(produced),
                })
                .await
                .map_err(anyhow::Error::from)?;
            }
            Ok(())
        })
    }

    fn cancel_tasks(&mut self, tasks: Vec<TaskId>) -> BackendFuture<'_> {
        let cancelled = Arc::clone(&self.cancelled);
        Box::pin(async move {
            cancelled.lock().unwrap().extend(tasks);
            Ok(())
        })
    }
}
