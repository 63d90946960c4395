// src/exec/task_runner.rs

//! Runs a single task attempt against its agent.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::agent::AgentRequest;
use crate::dag::ScheduledTask;
use crate::engine::{RuntimeEvent, TaskOutcome};
use crate::errors::TaskError;

/// Call the task's agent and report the outcome as `TaskFinished`.
///
/// The agent call races against the optional per-task timeout and the
/// cancel channel. Whichever loses is dropped, which also kills any child
/// process the agent spawned with `kill_on_drop`.
pub async fn run_task(
    task: ScheduledTask,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    mut cancel_rx: oneshot::Receiver<()>,
) {
    let ScheduledTask {
        task: spec,
        agent,
        attempt,
        timeout,
        inputs,
    } = task;
    let task_id = spec.id.clone();

    info!(
        task = %task_id,
        attempt,
        agent = %agent.name,
        ?timeout,
        "running task"
    );

    let executor = agent.executor();
    let request = AgentRequest {
        task: spec,
        attempt,
        artifacts: inputs,
    };

    let execution = async move {
        let call = executor.execute(request);
        match timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => Err(TaskError::timeout(limit)),
            },
            None => call.await,
        }
    };

    let outcome = tokio::select! {
        result = execution => match result {
            Ok(produced) => TaskOutcome::Success(produced),
            Err(error) => TaskOutcome::Failed(error),
        },

        cancel = &mut cancel_rx => {
            match cancel {
                Ok(()) => info!(task = %task_id, attempt, "cancellation requested; dropping agent call"),
                Err(e) => debug!(
                    task = %task_id,
                    attempt,
                    error = %e,
                    "cancel channel closed; dropping agent call"
                ),
            }
            TaskOutcome::Failed(TaskError::cancelled("task cancelled while running"))
        }
    };

    match &outcome {
        TaskOutcome::Success(produced) => {
            info!(task = %task_id, attempt, artifacts = produced.len(), "task attempt succeeded")
        }
        TaskOutcome::Failed(error) => {
            warn!(task = %task_id, attempt, kind = %error.kind, error = %error.message, "task attempt failed")
        }
    }

    let event = RuntimeEvent::TaskFinished {
        task: task_id.clone(),
        attempt,
        outcome,
    };
    if let Err(e) = runtime_tx.send(event).await {
        debug!(task = %task_id, error = %e, "runtime no longer listening; dropping task result");
    }
}
