// tests/runtime_fake_executor.rs

mod common;
use crate::common::{FakeExecutor, PlanBuilder, TaskBuilder, drain, init_tracing, with_timeout};

use std::error::Error;
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, mpsc, watch};

use plandag::agent::{AgentRegistry, AgentRouter, Capability};
use plandag::artifact::ArtifactStore;
use plandag::config::OrchestratorSection;
use plandag::dag::{GraphSnapshot, Scheduler, TaskStatus};
use plandag::engine::{CoreRuntime, RunEvent, RunOptions, Runtime, RuntimeEvent};
use plandag::orchestrator::Orchestrator;
use plandag::plan::Plan;
use plandag::types::{RunState, TieBreak};

type TestResult = Result<(), Box<dyn Error>>;

/// Very simple chain: A -> B
fn simple_chain_plan() -> Plan {
    PlanBuilder::new("chain")
        .task("A", Capability::Coder, &[])
        .task("B", Capability::Tester, &["A"])
        .build()
}

#[tokio::test]
async fn runtime_runs_chain_with_fake_executor() -> TestResult {
    init_tracing();

    let plan = simple_chain_plan();
    let scheduler = Scheduler::from_plan(&plan, TieBreak::default(), 4)?;
    let artifacts = Arc::new(ArtifactStore::new());
    artifacts.declare_producers(&plan);

    // Routing still happens in the core, so the plan's capabilities need an
    // agent even though the fake backend never calls it.
    let agent = common::ScriptedAgent::new();
    let registry = AgentRegistry::new()
        .with_agent(agent.handle(Capability::Coder))
        .with_agent(agent.handle(Capability::Tester));
    let core = CoreRuntime::new(
        scheduler,
        AgentRouter::new(registry, Vec::new()),
        artifacts,
        RunOptions::default(),
    );

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(16);
    let (events_tx, mut events_rx) = broadcast::channel::<RunEvent>(64);
    let (snapshot_tx, snapshot_rx) = watch::channel(GraphSnapshot::default());

    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(rt_tx.clone(), Arc::clone(&executed));

    let runtime = Runtime::new(core, rt_rx, executor, events_tx, snapshot_tx);
    let report = with_timeout(runtime.run()).await?;

    assert_eq!(report.state, RunState::Completed);
    assert_eq!(*executed.lock().unwrap(), vec!["A", "B"]);
    assert!(agent.calls().is_empty(), "fake backend bypasses agents");

    let snapshot = snapshot_rx.borrow().clone();
    assert_eq!(snapshot.count(TaskStatus::Completed), 2);

    let feed = drain(&mut events_rx);
    assert!(feed.iter().any(|e| matches!(
        e,
        RunEvent::RunState { new: RunState::Completed, .. }
    )));
    Ok(())
}

#[tokio::test]
async fn submit_with_injects_the_backend() -> TestResult {
    init_tracing();

    let agent = common::ScriptedAgent::new();
    let orchestrator = Orchestrator::new(
        OrchestratorSection::default(),
        AgentRouter::new(agent.registry(), Vec::new()),
    );

    let plan = PlanBuilder::new("fan-in")
        .with_task(TaskBuilder::new("left", Capability::Researcher).produces("l.txt").build())
        .with_task(TaskBuilder::new("right", Capability::Researcher).produces("r.txt").build())
        .with_task(
            TaskBuilder::new("merge", Capability::Writer)
                .reads("l.txt")
                .reads("r.txt")
                .build(),
        )
        .build();

    let executed = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&executed);
    let handle = orchestrator.submit_with(plan, move |tx| FakeExecutor::new(tx, log))?;
    let store = handle.artifacts();
    let report = with_timeout(handle.wait()).await?;

    assert_eq!(report.state, RunState::Completed);
    assert_eq!(*executed.lock().unwrap(), vec!["left", "right", "merge"]);
    assert_eq!(store.read("l.txt")?.content, "left output");
    assert_eq!(store.names(), vec!["l.txt".to_string(), "r.txt".to_string()]);
    Ok(())
}

#[tokio::test]
async fn seeded_completed_tasks_are_not_dispatched() -> TestResult {
    init_tracing();

    let agent = common::ScriptedAgent::new();
    let orchestrator = Orchestrator::new(
        OrchestratorSection::default(),
        AgentRouter::new(agent.registry(), Vec::new()),
    );
    let plan = PlanBuilder::new("resume")
        .with_task(TaskBuilder::new("A", Capability::Coder).completed().build())
        .task("B", Capability::Tester, &["A"])
        .build();

    let executed = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&executed);
    let report = with_timeout(
        orchestrator
            .submit_with(plan, move |tx| FakeExecutor::new(tx, log))?
            .wait(),
    )
    .await?;

    assert_eq!(report.state, RunState::Completed);
    assert_eq!(*executed.lock().unwrap(), vec!["B"]);
    assert_eq!(report.task("A").map(|t| t.attempts), Some(0));
    Ok(())
}
