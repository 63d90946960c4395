// src/exec/executor_loop.rs

//! Main executor loop that owns the in-flight agent calls.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::dag::ScheduledTask;
use crate::engine::RuntimeEvent;
use crate::exec::task_runner::run_task;
use crate::plan::TaskId;

/// Request sent from the runtime to the executor loop.
#[derive(Debug)]
pub enum ExecRequest {
    Run(ScheduledTask),
    Cancel(TaskId),
}

/// Internal handle for a task attempt that is currently executing.
///
/// - `cancel` stops the attempt (used when the run is halted or aborted).
/// - `handle` is the Tokio task that is driving the agent call.
struct ActiveTask {
    attempt: u32,
    cancel: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<()>,
}

/// Spawn the background executor loop.
///
/// Each scheduled task runs on its own Tokio task so slow agents never block
/// the loop, and **per task id there is never more than one attempt in
/// flight**: a second dispatch of the same attempt is refused, while a newer
/// attempt (a retry) replaces whatever is left of the previous one.
pub fn spawn_executor(runtime_tx: mpsc::Sender<RuntimeEvent>) -> mpsc::Sender<ExecRequest> {
    let (tx, mut rx) = mpsc::channel::<ExecRequest>(64);

    tokio::spawn(async move {
        info!("executor loop started");

        let mut active: HashMap<TaskId, ActiveTask> = HashMap::new();

        while let Some(request) = rx.recv().await {
            active.retain(|_, t| !t.handle.is_finished());

            match request {
                ExecRequest::Run(task) => handle_scheduled_task(task, &mut active, &runtime_tx),
                ExecRequest::Cancel(id) => cancel_task(&id, &mut active),
            }
        }

        info!("executor loop finished (channel closed)");
    });

    tx
}

fn handle_scheduled_task(
    task: ScheduledTask,
    active: &mut HashMap<TaskId, ActiveTask>,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
) {
    let id = task.task.id.clone();

    if let Some(existing) = active.get_mut(&id) {
        if !existing.handle.is_finished() {
            if existing.attempt >= task.attempt {
                warn!(
                    task = %id,
                    attempt = task.attempt,
                    "attempt already in flight; refusing duplicate dispatch"
                );
                return;
            }
            // The previous attempt has already reported its result; make
            // sure nothing of it lingers.
            if let Some(cancel) = existing.cancel.take() {
                let _ = cancel.send(());
            }
        }
    }

    let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
    let rt_tx = runtime_tx.clone();
    let attempt = task.attempt;
    let spawn_id = id.clone();

    let handle = tokio::spawn(async move {
        run_task(task, rt_tx, cancel_rx).await;
        debug!(task = %spawn_id, attempt, "task runner future finished");
    });

    active.insert(
        id,
        ActiveTask {
            attempt,
            cancel: Some(cancel_tx),
            handle,
        },
    );
}

fn cancel_task(id: &str, active: &mut HashMap<TaskId, ActiveTask>) {
    let Some(existing) = active.get_mut(id) else {
        debug!(task = %id, "cancel requested for task that is not running");
        return;
    };

    info!(task = %id, attempt = existing.attempt, "cancelling in-flight task");

    match existing.cancel.take() {
        Some(cancel) => {
            if cancel.send(()).is_err() {
                debug!(task = %id, "task already finished while cancelling");
            }
        }
        None => debug!(task = %id, "no cancel sender present; task may already be cancelled"),
    }
}
