// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use tracing::{debug, info, warn};

use crate::dag::{ScheduledTask, TaskStatus};
use crate::engine::core::CoreRuntime;
use crate::engine::events::RunEvent;
use crate::engine::{ControlCommand, TaskOutcome};
use crate::errors::TaskError;
use crate::plan::TaskId;
use crate::policy::RunAction;
use crate::types::{ResumeDecision, RunState};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Hand these tasks to the executor.
    DispatchTasks(Vec<ScheduledTask>),
    /// Stop these in-flight tasks; they are already marked failed.
    CancelTasks(Vec<TaskId>),
    /// The run reached a terminal state.
    RequestExit,
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Status feed entries produced while handling the event.
    pub events: Vec<RunEvent>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreRuntime {
    pub(super) fn handle_task_finished(
        &mut self,
        task: TaskId,
        attempt: u32,
        outcome: TaskOutcome,
    ) -> CoreStep {
        let mut commands = Vec::new();

        let current = self
            .scheduler
            .graph()
            .get(&task)
            .map(|n| (n.status, n.attempts));

        match current {
            Some((TaskStatus::Running, attempts)) if attempts == attempt => {}
            Some((status, attempts)) => {
                debug!(
                    task = %task,
                    attempt,
                    current_attempt = attempts,
                    %status,
                    "ignoring stale task result"
                );
                return self.finish_step(commands);
            }
            None => {
                warn!(task = %task, "result for unknown task; ignoring");
                return self.finish_step(commands);
            }
        }

        match outcome {
            TaskOutcome::Success(produced) => {
                for output in produced {
                    let artifact = self.artifacts.write(output.name, output.content, &task);
                    self.push_event(RunEvent::ArtifactWritten {
                        name: artifact.name,
                        version: artifact.version,
                        producing_task_id: artifact.producing_task_id,
                    });
                }
                match self.scheduler.complete(&task) {
                    Ok(()) => {
                        self.artifacts.commit(&task);
                        info!(task = %task, attempt, "task completed");
                    }
                    Err(e) => warn!(task = %task, error = %e, "could not mark task completed"),
                }
            }
            TaskOutcome::Failed(error) => self.handle_failure(&task, error, &mut commands),
        }

        self.evaluate_new_handoffs();
        self.finish_step(commands)
    }

    pub(super) fn handle_control(&mut self, command: ControlCommand) -> CoreStep {
        let mut commands = Vec::new();

        if self.state.is_finished() {
            debug!(?command, state = %self.state, "run already finished; ignoring control command");
            return self.finish_step(commands);
        }

        match command {
            ControlCommand::Pause => {
                if self.state == RunState::Running {
                    self.set_state(RunState::Paused);
                } else {
                    debug!(state = %self.state, "pause ignored");
                }
            }
            ControlCommand::Abort => {
                info!("abort requested by operator");
                self.halt(None, "run aborted by operator", &mut commands);
            }
            ControlCommand::Resume { decision, task } => {
                self.resume(decision, task, &mut commands);
            }
        }

        self.evaluate_new_handoffs();
        self.finish_step(commands)
    }

    pub(super) fn handle_shutdown(&mut self) -> CoreStep {
        let mut commands = Vec::new();
        if !self.state.is_finished() {
            info!("shutdown requested; stopping run");
            self.halt(None, "runtime shutting down", &mut commands);
        }
        let mut step = self.finish_step(commands);
        step.keep_running = false;
        step
    }

    fn resume(
        &mut self,
        decision: ResumeDecision,
        task: Option<TaskId>,
        commands: &mut Vec<CoreCommand>,
    ) {
        match decision {
            ResumeDecision::Abort => {
                self.halt(None, "run aborted by operator", commands);
                return;
            }
            ResumeDecision::Continue => {}
            ResumeDecision::Retry | ResumeDecision::Skip => {
                let targets: Vec<TaskId> = self
                    .scheduler
                    .escalated()
                    .into_iter()
                    .filter(|id| task.as_ref().is_none_or(|t| t == id))
                    .collect();

                if targets.is_empty() {
                    warn!(?task, ?decision, "no escalated task matches resume request");
                }

                for id in targets {
                    let result = if decision == ResumeDecision::Retry {
                        self.scheduler.retry(&id)
                    } else {
                        self.scheduler.skip(&id)
                    };
                    match result {
                        Ok(()) => info!(task = %id, ?decision, "operator resolved escalation"),
                        Err(e) => warn!(task = %id, error = %e, "could not apply resume decision"),
                    }
                }
            }
        }

        let still_escalated = self.scheduler.escalated();
        if still_escalated.is_empty() {
            self.stop_origin = None;
        } else {
            info!(tasks = ?still_escalated, "tasks still await an operator decision");
        }

        // A suspended run only wakes up when the decision unblocked something;
        // `check_termination` suspends it again once it is idle.
        let progressed = decision != ResumeDecision::Continue || still_escalated.is_empty();
        if self.state == RunState::Paused || (self.state == RunState::Suspended && progressed) {
            self.set_state(RunState::Running);
        }
    }

    /// Record a task failure and apply the policy decision.
    pub(super) fn handle_failure(
        &mut self,
        task: &str,
        error: TaskError,
        commands: &mut Vec<CoreCommand>,
    ) {
        if let Err(e) = self.scheduler.fail(task, error.clone()) {
            warn!(task = %task, error = %e, "could not mark task failed");
            return;
        }

        let Some(node) = self.scheduler.graph().get(task) else {
            return;
        };
        let action = self.policy.decide(&node.spec, node.attempts, &error);

        warn!(
            task = %task,
            kind = %error.kind,
            error = %error.message,
            ?action,
            "task failed"
        );

        match action {
            RunAction::Retry => {
                if let Err(e) = self.scheduler.retry(task) {
                    warn!(task = %task, error = %e, "could not schedule retry");
                }
            }
            RunAction::Continue => {}
            RunAction::Halt => {
                self.halt(Some(task), "run halted by failure policy", commands);
            }
            RunAction::Escalate => {
                if let Err(e) = self.scheduler.escalate(task) {
                    warn!(task = %task, error = %e, "could not escalate task");
                    return;
                }
                if self.stop_origin.is_none() {
                    self.stop_origin = Some(task.to_string());
                }
                // Work that does not depend on the escalated task keeps
                // running; the run suspends once nothing else can progress.
            }
        }
    }

    /// Stop the run: cancel in-flight work, demote waiting tasks, abort.
    pub(super) fn halt(
        &mut self,
        origin: Option<&str>,
        reason: &str,
        commands: &mut Vec<CoreCommand>,
    ) {
        let cancelled = self.scheduler.cancel_running(reason);
        let demoted = self.scheduler.demote_ready();
        if !demoted.is_empty() {
            debug!(tasks = ?demoted, "ready tasks returned to pending");
        }
        if !cancelled.is_empty() {
            commands.push(CoreCommand::CancelTasks(cancelled));
        }
        if let Some(origin) = origin {
            self.stop_origin = Some(origin.to_string());
        }
        self.set_state(RunState::Aborted);
    }

    /// Dispatch what can be dispatched, then decide whether the run is over.
    pub(super) fn finish_step(&mut self, mut commands: Vec<CoreCommand>) -> CoreStep {
        self.dispatch_ready(&mut commands);
        let keep_running = self.check_termination(&mut commands);
        self.flush_status();

        CoreStep {
            commands,
            events: std::mem::take(&mut self.events),
            keep_running,
        }
    }

    fn dispatch_ready(&mut self, commands: &mut Vec<CoreCommand>) {
        loop {
            if self.state != RunState::Running {
                return;
            }

            let snapshot = self.snapshot();
            let step = self.scheduler.step();
            if step.dispatched.is_empty() {
                return;
            }

            let mut batch = Vec::with_capacity(step.dispatched.len());
            let mut routing_failed = false;

            for id in step.dispatched {
                if self.state == RunState::Aborted {
                    break;
                }
                let Some(node) = self.scheduler.graph().get(&id) else {
                    continue;
                };
                let spec = node.spec.clone();
                let attempt = node.attempts;

                match self.router.route(&spec, &snapshot) {
                    Ok(agent) => {
                        let timeout = spec
                            .timeout
                            .or(agent.timeout)
                            .or(self.options.default_timeout);
                        debug!(task = %id, agent = %agent.name, attempt, "task dispatched");
                        batch.push(ScheduledTask {
                            task: spec,
                            agent,
                            attempt,
                            timeout,
                            inputs: self.artifacts.available(),
                        });
                    }
                    Err(err) => {
                        routing_failed = true;
                        self.handle_failure(&id, TaskError::from(err), commands);
                    }
                }
            }

            if self.state == RunState::Aborted {
                // Everything that was running, including this batch, has
                // already been failed as cancelled.
                return;
            }
            if !batch.is_empty() {
                commands.push(CoreCommand::DispatchTasks(batch));
            }
            if !routing_failed {
                return;
            }
        }
    }

    fn check_termination(&mut self, commands: &mut Vec<CoreCommand>) -> bool {
        let keep_running = match self.state {
            RunState::Running => {
                if !self.scheduler.is_quiescent() {
                    true
                } else if !self.scheduler.escalated().is_empty() {
                    self.set_state(RunState::Suspended);
                    !self.options.exit_when_suspended
                } else {
                    let done = self.completion_state();
                    self.set_state(done);
                    false
                }
            }
            RunState::Paused => true,
            RunState::Suspended => {
                !(self.options.exit_when_suspended && self.scheduler.is_quiescent())
            }
            RunState::Aborted
            | RunState::Completed
            | RunState::CompletedWithSkips
            | RunState::CompletedWithFailures => false,
        };

        if !keep_running {
            info!(state = %self.state, "run finished");
            commands.push(CoreCommand::RequestExit);
        }
        keep_running
    }

    fn completion_state(&self) -> RunState {
        let graph = self.scheduler.graph();
        let has_blocked = !self.scheduler.resolver().blocked_tasks(graph).is_empty();

        if has_blocked || graph.count(TaskStatus::Skipped) > 0 {
            RunState::CompletedWithSkips
        } else if graph.count(TaskStatus::Failed) > 0 {
            RunState::CompletedWithFailures
        } else {
            RunState::Completed
        }
    }
}
