// src/orchestrator.rs

//! Public entry point: submit a plan, observe it, steer it, collect the report.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::agent::{AgentRegistry, AgentRouter, HandoffCondition};
use crate::artifact::ArtifactStore;
use crate::config::{ConfigFile, OrchestratorSection};
use crate::dag::{GraphSnapshot, Scheduler};
use crate::engine::{
    ControlCommand, CoreRuntime, RunEvent, RunOptions, RunReport, Runtime, RuntimeEvent,
};
use crate::errors::{Error, PlandagError, Result};
use crate::exec::{AgentExecutorBackend, ExecutorBackend};
use crate::plan::{Plan, TaskId};
use crate::types::ResumeDecision;

/// Holds the agent setup and limits shared by every run it starts.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    settings: OrchestratorSection,
    router: AgentRouter,
}

impl Orchestrator {
    pub fn new(settings: OrchestratorSection, router: AgentRouter) -> Self {
        Self { settings, router }
    }

    /// Shell agents and handoff rules as described by the config file.
    pub fn from_config(cfg: &ConfigFile) -> Self {
        let registry = AgentRegistry::from_config(cfg, &cfg.orchestrator.workspace);
        let router = AgentRouter::new(registry, cfg.handoff_rules());
        Self::new(cfg.orchestrator.clone(), router)
    }

    pub fn settings(&self) -> &OrchestratorSection {
        &self.settings
    }

    pub fn router(&self) -> &AgentRouter {
        &self.router
    }

    /// Validate `plan` and start running it with the production executor.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, plan: Plan) -> Result<RunHandle> {
        self.submit_with(plan, AgentExecutorBackend::new)
    }

    /// Like [`submit`](Self::submit), with the executor backend built by
    /// `make_backend` from the runtime's event sender.
    pub fn submit_with<E, F>(&self, plan: Plan, make_backend: F) -> Result<RunHandle>
    where
        E: ExecutorBackend + 'static,
        F: FnOnce(mpsc::Sender<RuntimeEvent>) -> E,
    {
        let scheduler = Scheduler::from_plan(
            &plan,
            self.settings.tie_break,
            self.settings.max_concurrency,
        )?;
        self.warn_unknown_handoff_refs(&plan);

        let artifacts = Arc::new(ArtifactStore::new());
        artifacts.declare_producers(&plan);

        let options = RunOptions {
            default_timeout: self.settings.task_timeout,
            exit_when_suspended: self.settings.exit_when_suspended,
        };
        let core = CoreRuntime::new(scheduler, self.router.clone(), Arc::clone(&artifacts), options);
        let run_id = core.run_id();

        let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
        let (events_tx, events_rx) = broadcast::channel(self.settings.event_capacity.max(1));
        let (snapshot_tx, snapshot_rx) = watch::channel(core.snapshot());

        let executor = make_backend(rt_tx.clone());
        let runtime = Runtime::new(core, rt_rx, executor, events_tx.clone(), snapshot_tx);

        info!(%run_id, goal = %plan.goal, tasks = plan.tasks.len(), "plan submitted");
        let join = tokio::spawn(runtime.run());

        Ok(RunHandle {
            run_id,
            control: RunControl { tx: rt_tx },
            events_tx,
            events_rx: Some(events_rx),
            snapshot_rx,
            artifacts,
            join,
        })
    }

    fn warn_unknown_handoff_refs(&self, plan: &Plan) {
        for rule in self.router.handoffs() {
            let referenced = match &rule.condition {
                HandoffCondition::TaskCompleted(id) | HandoffCondition::TaskFailed(id) => id,
                _ => continue,
            };
            if plan.task(referenced).is_none() {
                warn!(
                    from = %rule.from_agent,
                    to = %rule.to_agent,
                    task = %referenced,
                    "handoff condition refers to a task that is not in the plan; it will never hold"
                );
            }
        }
    }
}

/// A live run.
#[derive(Debug)]
pub struct RunHandle {
    run_id: Uuid,
    control: RunControl,
    events_tx: broadcast::Sender<RunEvent>,
    events_rx: Option<broadcast::Receiver<RunEvent>>,
    snapshot_rx: watch::Receiver<GraphSnapshot>,
    artifacts: Arc<ArtifactStore>,
    join: JoinHandle<Result<RunReport>>,
}

impl RunHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn control(&self) -> RunControl {
        self.control.clone()
    }

    /// The receiver created before the run started. Holds every event from
    /// the very first status change; `None` once taken.
    pub fn take_events(&mut self) -> Option<broadcast::Receiver<RunEvent>> {
        self.events_rx.take()
    }

    /// A fresh receiver that only sees events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.events_tx.subscribe()
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Watch channel that changes after every processed runtime event.
    pub fn snapshots(&self) -> watch::Receiver<GraphSnapshot> {
        self.snapshot_rx.clone()
    }

    pub fn artifacts(&self) -> Arc<ArtifactStore> {
        Arc::clone(&self.artifacts)
    }

    /// Wait for the run to reach a terminal state.
    pub async fn wait(self) -> Result<RunReport> {
        match self.join.await {
            Ok(report) => report,
            Err(e) => Err(PlandagError::Other(Error::from(e))),
        }
    }
}

/// Cloneable control surface for a run.
#[derive(Debug, Clone)]
pub struct RunControl {
    tx: mpsc::Sender<RuntimeEvent>,
}

impl RunControl {
    /// Stop dispatching new tasks. In-flight tasks keep running.
    pub async fn pause(&self) -> Result<()> {
        self.send(ControlCommand::Pause).await
    }

    /// Continue a paused or suspended run. For a suspended run `decision`
    /// applies to every escalated task.
    pub async fn resume(&self, decision: ResumeDecision) -> Result<()> {
        self.send(ControlCommand::Resume {
            decision,
            task: None,
        })
        .await
    }

    /// Apply `decision` to one escalated task only.
    pub async fn resume_task(&self, task: impl Into<TaskId>, decision: ResumeDecision) -> Result<()> {
        self.send(ControlCommand::Resume {
            decision,
            task: Some(task.into()),
        })
        .await
    }

    /// Cancel in-flight work and end the run as `aborted`.
    pub async fn abort(&self) -> Result<()> {
        self.send(ControlCommand::Abort).await
    }

    async fn send(&self, command: ControlCommand) -> Result<()> {
        self.tx
            .send(RuntimeEvent::Control(command))
            .await
            .map_err(|_| PlandagError::RunClosed)
    }
}
