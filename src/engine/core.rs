// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated core state
//! - a list of commands describing what the IO shell should do next
//! - the status feed entries caused by the event
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from channels
//! - handing `ScheduledTask`s to the executor and cancelling them
//! - publishing the status feed
//!
//! The core can be tested without any Tokio runtime, channels or processes.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::agent::AgentRouter;
use crate::artifact::ArtifactStore;
use crate::dag::{GraphSnapshot, Scheduler, TaskStatus};
use crate::engine::event_handlers::CoreStep;
use crate::engine::events::{HandoffRecord, RunEvent};
use crate::engine::report::{FailureReport, RunReport, TaskReport};
use crate::engine::{RunOptions, RuntimeEvent};
use crate::errors::ErrorKind;
use crate::plan::TaskId;
use crate::policy::FailurePolicy;
use crate::types::RunState;

/// Pure core runtime state.
///
/// This owns:
/// - the scheduler (and through it the task graph)
/// - the agent router and failure policy
/// - a handle to the shared artifact store
/// - the run-level state and the pending status feed
///
/// It has no channels and performs no IO.
#[derive(Debug)]
pub struct CoreRuntime {
    pub(super) run_id: Uuid,
    pub(super) scheduler: Scheduler,
    pub(super) router: AgentRouter,
    pub(super) policy: FailurePolicy,
    pub(super) artifacts: Arc<ArtifactStore>,
    pub(super) options: RunOptions,
    pub(super) state: RunState,
    /// Task whose failure halted or suspended the run.
    pub(super) stop_origin: Option<TaskId>,
    /// One flag per handoff rule: already reported as satisfied.
    pub(super) fired_handoffs: Vec<bool>,
    pub(super) handoff_log: Vec<HandoffRecord>,
    pub(super) events: Vec<RunEvent>,
}

impl CoreRuntime {
    pub fn new(
        scheduler: Scheduler,
        router: AgentRouter,
        artifacts: Arc<ArtifactStore>,
        options: RunOptions,
    ) -> Self {
        let fired_handoffs = vec![false; router.handoffs().len()];
        Self {
            run_id: Uuid::new_v4(),
            scheduler,
            router,
            policy: FailurePolicy::new(),
            artifacts,
            options,
            state: RunState::Running,
            stop_origin: None,
            fired_handoffs,
            handoff_log: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        self.scheduler.graph().snapshot()
    }

    /// Kick off the run: report handoffs that already hold and dispatch the
    /// initially ready tasks.
    pub fn start(&mut self) -> CoreStep {
        info!(
            run_id = %self.run_id,
            goal = %self.scheduler.graph().goal(),
            tasks = self.scheduler.graph().len(),
            "starting run"
        );
        self.evaluate_new_handoffs();
        self.finish_step(Vec::new())
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::TaskFinished {
                task,
                attempt,
                outcome,
            } => self.handle_task_finished(task, attempt, outcome),
            RuntimeEvent::Control(command) => self.handle_control(command),
            RuntimeEvent::ShutdownRequested => self.handle_shutdown(),
        }
    }

    /// Terminal (or current) summary of the run.
    pub fn report(&self) -> RunReport {
        let graph = self.scheduler.graph();
        let blockers = self.scheduler.resolver().blockers(graph);
        let stop_kind = self
            .stop_origin
            .as_deref()
            .and_then(|id| graph.get(id))
            .and_then(|n| n.last_error.as_ref())
            .map(|e| e.kind);

        let tasks = graph
            .nodes()
            .iter()
            .enumerate()
            .map(|(idx, node)| {
                let id = node.spec.id.clone();
                let own_kind = node.last_error.as_ref().map(|e| e.kind);
                let own_message = node
                    .last_error
                    .as_ref()
                    .map(|e| e.message.clone())
                    .unwrap_or_default();

                let (status, failure) = match node.status {
                    TaskStatus::Completed => (TaskStatus::Completed, None),
                    TaskStatus::Failed => {
                        let kind = own_kind.unwrap_or(ErrorKind::Execution);
                        let origin = match (kind, &self.stop_origin) {
                            (ErrorKind::Cancelled, Some(origin)) => origin.clone(),
                            _ => id.clone(),
                        };
                        (
                            TaskStatus::Failed,
                            Some(FailureReport {
                                kind,
                                origin,
                                message: own_message,
                            }),
                        )
                    }
                    TaskStatus::Escalated => (
                        TaskStatus::Escalated,
                        Some(FailureReport {
                            kind: own_kind.unwrap_or(ErrorKind::Execution),
                            origin: id.clone(),
                            message: own_message,
                        }),
                    ),
                    TaskStatus::Skipped => (
                        TaskStatus::Skipped,
                        Some(FailureReport {
                            kind: own_kind.unwrap_or(ErrorKind::Execution),
                            origin: id.clone(),
                            message: "skipped by operator".to_string(),
                        }),
                    ),
                    status @ (TaskStatus::Pending | TaskStatus::Ready | TaskStatus::Running) => {
                        match blockers[idx] {
                            Some(origin_idx) if status == TaskStatus::Pending => {
                                let upstream = graph.node(origin_idx);
                                let kind = upstream
                                    .last_error
                                    .as_ref()
                                    .map_or(ErrorKind::Execution, |e| e.kind);
                                // A cancelled upstream was stopped by someone else.
                                let origin = match (kind, &self.stop_origin) {
                                    (ErrorKind::Cancelled, Some(stop)) => stop.clone(),
                                    _ => upstream.spec.id.clone(),
                                };
                                (
                                    TaskStatus::Skipped,
                                    Some(FailureReport {
                                        kind,
                                        origin,
                                        message: format!(
                                            "upstream task '{}' did not complete",
                                            upstream.spec.id
                                        ),
                                    }),
                                )
                            }
                            _ => (status, self.unfinished_failure(&id, stop_kind)),
                        }
                    }
                };

                TaskReport {
                    id,
                    name: node.spec.display_name().to_string(),
                    agent: node.spec.agent,
                    status,
                    attempts: node.attempts,
                    failure,
                }
            })
            .collect();

        RunReport {
            run_id: self.run_id,
            goal: graph.goal().to_string(),
            state: self.state,
            tasks,
            handoffs: self.handoff_log.clone(),
        }
    }

    /// Failure attribution for a task that never got to finish because the
    /// run stopped around it.
    fn unfinished_failure(&self, id: &str, stop_kind: Option<ErrorKind>) -> Option<FailureReport> {
        match (&self.stop_origin, self.state) {
            (Some(origin), _) => Some(FailureReport {
                kind: stop_kind.unwrap_or(ErrorKind::Execution),
                origin: origin.clone(),
                message: format!("run stopped by task '{origin}' before this task finished"),
            }),
            (None, RunState::Aborted) => Some(FailureReport {
                kind: ErrorKind::Cancelled,
                origin: id.to_string(),
                message: "run aborted before this task finished".to_string(),
            }),
            _ => None,
        }
    }

    pub(super) fn set_state(&mut self, new: RunState) {
        let old = self.state;
        if old == new {
            return;
        }
        self.state = new;
        info!(run_id = %self.run_id, from = %old, to = %new, "run state changed");
        self.push_event(RunEvent::RunState {
            old,
            new,
            timestamp: Utc::now(),
        });
    }

    /// Append a feed entry, first flushing any status changes recorded by
    /// the graph so the feed stays in causal order.
    pub(super) fn push_event(&mut self, event: RunEvent) {
        self.flush_status();
        self.events.push(event);
    }

    pub(super) fn flush_status(&mut self) {
        let changes = self.scheduler.take_status_events();
        self.events
            .extend(changes.into_iter().map(RunEvent::TaskStatus));
    }

    /// Report every handoff rule that holds for the first time.
    pub(super) fn evaluate_new_handoffs(&mut self) {
        if self.fired_handoffs.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        for idx in self.router.satisfied_handoffs(&snapshot) {
            if self.fired_handoffs[idx] {
                continue;
            }
            self.fired_handoffs[idx] = true;

            let rule = &self.router.handoffs()[idx];
            let record = HandoffRecord {
                from_agent: rule.from_agent,
                to_agent: rule.to_agent,
                timestamp: Utc::now(),
            };
            info!(from = %record.from_agent, to = %record.to_agent, "handoff condition satisfied");
            self.handoff_log.push(record.clone());
            self.push_event(RunEvent::Handoff(record));
        }
    }
}
