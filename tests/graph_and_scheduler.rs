// tests/graph_and_scheduler.rs

mod common;
use crate::common::{PlanBuilder, TaskBuilder};

use std::error::Error;

use plandag::agent::Capability;
use plandag::dag::{DependencyResolver, Scheduler, TaskGraph, TaskStatus};
use plandag::errors::{ErrorKind, PlandagError, TaskError};
use plandag::plan::Plan;
use plandag::types::TieBreak;

type TestResult = Result<(), Box<dyn Error>>;

/// a -> {b, c} -> d
fn diamond() -> Plan {
    PlanBuilder::new("diamond")
        .task("a", Capability::Planner, &[])
        .task("b", Capability::Coder, &["a"])
        .task("c", Capability::Tester, &["a"])
        .task("d", Capability::Reviewer, &["b", "c"])
        .build()
}

fn walk(graph: &mut TaskGraph, id: &str, path: &[TaskStatus]) -> TestResult {
    for status in path {
        graph.update_status(id, *status)?;
    }
    Ok(())
}

const TO_COMPLETED: [TaskStatus; 3] = [
    TaskStatus::Ready,
    TaskStatus::Running,
    TaskStatus::Completed,
];

#[test]
fn legal_transitions_are_accepted_and_recorded_in_order() -> TestResult {
    let mut graph = TaskGraph::from_plan(&diamond())?;

    walk(&mut graph, "a", &TO_COMPLETED)?;
    walk(&mut graph, "b", &[TaskStatus::Ready, TaskStatus::Running])?;
    graph.fail("b", TaskError::execution("boom"))?;
    walk(&mut graph, "b", &[TaskStatus::Escalated, TaskStatus::Skipped])?;

    let changes: Vec<_> = graph
        .take_changes()
        .into_iter()
        .map(|e| (e.task_id, e.old_status, e.new_status, e.error_kind))
        .collect();

    assert_eq!(
        changes,
        vec![
            ("a".into(), TaskStatus::Pending, TaskStatus::Ready, None),
            ("a".into(), TaskStatus::Ready, TaskStatus::Running, None),
            ("a".into(), TaskStatus::Running, TaskStatus::Completed, None),
            ("b".into(), TaskStatus::Pending, TaskStatus::Ready, None),
            ("b".into(), TaskStatus::Ready, TaskStatus::Running, None),
            (
                "b".into(),
                TaskStatus::Running,
                TaskStatus::Failed,
                Some(ErrorKind::Execution)
            ),
            (
                "b".into(),
                TaskStatus::Failed,
                TaskStatus::Escalated,
                Some(ErrorKind::Execution)
            ),
            ("b".into(), TaskStatus::Escalated, TaskStatus::Skipped, None),
        ]
    );
    assert!(graph.take_changes().is_empty());
    Ok(())
}

#[test]
fn illegal_transitions_are_rejected_without_side_effects() -> TestResult {
    let mut graph = TaskGraph::from_plan(&diamond())?;

    let illegal = [
        ("a", TaskStatus::Completed),
        ("a", TaskStatus::Running),
        ("a", TaskStatus::Skipped),
        ("a", TaskStatus::Pending),
    ];
    for (id, to) in illegal {
        match graph.update_status(id, to) {
            Err(PlandagError::InvalidTransition(t)) => {
                assert_eq!(t.from, TaskStatus::Pending);
                assert_eq!(t.to, to);
            }
            other => panic!("pending -> {to} should be rejected, got {other:?}"),
        }
    }
    assert_eq!(graph.status_of("a"), Some(TaskStatus::Pending));
    assert!(graph.take_changes().is_empty());

    walk(&mut graph, "a", &TO_COMPLETED)?;
    assert!(graph.update_status("a", TaskStatus::Running).is_err());
    assert!(graph.update_status("a", TaskStatus::Pending).is_err());
    Ok(())
}

#[test]
fn unknown_task_is_reported() -> TestResult {
    let mut graph = TaskGraph::from_plan(&diamond())?;
    assert!(matches!(
        graph.update_status("nope", TaskStatus::Ready),
        Err(PlandagError::TaskNotFound(id)) if id == "nope"
    ));
    Ok(())
}

#[test]
fn attempts_count_dispatches_and_success_clears_the_error() -> TestResult {
    let mut graph = TaskGraph::from_plan(&diamond())?;

    walk(&mut graph, "a", &[TaskStatus::Ready, TaskStatus::Running])?;
    graph.fail("a", TaskError::timeout(std::time::Duration::from_secs(1)))?;
    assert_eq!(
        graph.get("a").and_then(|n| n.last_error.as_ref()).map(|e| e.kind),
        Some(ErrorKind::Timeout)
    );

    walk(&mut graph, "a", &[TaskStatus::Pending])?;
    walk(&mut graph, "a", &TO_COMPLETED)?;

    let a = graph.get("a").expect("a exists");
    assert_eq!(a.attempts, 2);
    assert!(a.last_error.is_none());
    Ok(())
}

#[test]
fn resolver_surfaces_tasks_as_dependencies_complete() -> TestResult {
    let mut graph = TaskGraph::from_plan(&diamond())?;
    let resolver = DependencyResolver::default();

    assert_eq!(resolver.ready_tasks(&graph), vec!["a"]);

    walk(&mut graph, "a", &TO_COMPLETED)?;
    assert_eq!(resolver.ready_tasks(&graph), vec!["b", "c"]);

    walk(&mut graph, "b", &TO_COMPLETED)?;
    assert_eq!(resolver.ready_tasks(&graph), vec!["c"]);

    walk(&mut graph, "c", &TO_COMPLETED)?;
    assert_eq!(resolver.ready_tasks(&graph), vec!["d"]);
    Ok(())
}

#[test]
fn seeded_completed_tasks_unlock_their_dependents() -> TestResult {
    let plan = PlanBuilder::new("resume")
        .with_task(TaskBuilder::new("a", Capability::Planner).completed().build())
        .task("b", Capability::Coder, &["a"])
        .build();

    let graph = TaskGraph::from_plan(&plan)?;
    assert_eq!(DependencyResolver::default().ready_tasks(&graph), vec!["b"]);
    Ok(())
}

#[test]
fn most_dependents_tie_break_prefers_unblocking_tasks() -> TestResult {
    let plan = PlanBuilder::new("fan-out")
        .task("leaf", Capability::Writer, &[])
        .task("hub", Capability::Architect, &[])
        .task("x", Capability::Coder, &["hub"])
        .task("y", Capability::Coder, &["hub"])
        .build();
    let graph = TaskGraph::from_plan(&plan)?;

    assert_eq!(
        DependencyResolver::new(TieBreak::DeclarationOrder).ready_tasks(&graph),
        vec!["leaf", "hub"]
    );
    assert_eq!(
        DependencyResolver::new(TieBreak::MostDependents).ready_tasks(&graph),
        vec!["hub", "leaf"]
    );
    Ok(())
}

#[test]
fn blocked_tasks_name_the_failed_upstream() -> TestResult {
    let mut graph = TaskGraph::from_plan(&diamond())?;
    let resolver = DependencyResolver::default();

    walk(&mut graph, "a", &TO_COMPLETED)?;
    walk(&mut graph, "b", &[TaskStatus::Ready, TaskStatus::Running])?;
    graph.fail("b", TaskError::execution("compile error"))?;

    assert_eq!(
        resolver.blocked_tasks(&graph),
        vec![("d".to_string(), "b".to_string())]
    );
    // c is unaffected by b's failure.
    assert_eq!(resolver.ready_tasks(&graph), vec!["c"]);
    Ok(())
}

#[test]
fn scheduler_never_exceeds_its_slots() -> TestResult {
    let plan = PlanBuilder::new("wide")
        .task("t1", Capability::Coder, &[])
        .task("t2", Capability::Coder, &[])
        .task("t3", Capability::Coder, &[])
        .task("t4", Capability::Coder, &[])
        .task("t5", Capability::Coder, &[])
        .build();
    let mut scheduler = Scheduler::from_plan(&plan, TieBreak::DeclarationOrder, 2)?;

    let step = scheduler.step();
    assert_eq!(step.newly_ready.len(), 5);
    assert_eq!(step.dispatched, vec!["t1", "t2"]);
    assert_eq!(scheduler.running_count(), 2);
    assert_eq!(scheduler.ids_with_status(TaskStatus::Ready), vec!["t3", "t4", "t5"]);

    // Nothing finished, nothing new is handed out.
    assert!(scheduler.step().dispatched.is_empty());

    scheduler.complete("t2")?;
    assert_eq!(scheduler.step().dispatched, vec!["t3"]);
    assert_eq!(scheduler.running_count(), 2);
    assert_eq!(scheduler.free_slots(), 0);
    Ok(())
}

#[test]
fn zero_concurrency_is_clamped_to_one() -> TestResult {
    let mut scheduler = Scheduler::from_plan(&diamond(), TieBreak::default(), 0)?;
    assert_eq!(scheduler.max_concurrency(), 1);
    assert_eq!(scheduler.step().dispatched, vec!["a"]);
    Ok(())
}

#[test]
fn scheduler_walks_the_diamond_to_quiescence() -> TestResult {
    let mut scheduler = Scheduler::from_plan(&diamond(), TieBreak::default(), 4)?;
    let mut order = Vec::new();

    loop {
        let step = scheduler.step();
        if step.dispatched.is_empty() {
            assert!(step.quiescent);
            break;
        }
        for id in step.dispatched {
            scheduler.complete(&id)?;
            order.push(id);
        }
    }

    assert_eq!(order, vec!["a", "b", "c", "d"]);
    assert_eq!(scheduler.graph().count(TaskStatus::Completed), 4);
    assert_eq!(scheduler.attempts_of("d")?, 1);
    Ok(())
}

#[test]
fn cancel_and_demote_stop_all_work() -> TestResult {
    let plan = PlanBuilder::new("wide")
        .task("t1", Capability::Coder, &[])
        .task("t2", Capability::Coder, &[])
        .task("t3", Capability::Coder, &[])
        .build();
    let mut scheduler = Scheduler::from_plan(&plan, TieBreak::default(), 2)?;
    scheduler.step();

    let cancelled = scheduler.cancel_running("halted");
    let demoted = scheduler.demote_ready();
    assert_eq!(cancelled, vec!["t1", "t2"]);
    assert_eq!(demoted, vec!["t3"]);

    let t1 = scheduler.graph().get("t1").expect("t1 exists");
    assert_eq!(t1.status, TaskStatus::Failed);
    assert_eq!(
        t1.last_error.as_ref().map(|e| e.kind),
        Some(ErrorKind::Cancelled)
    );
    assert_eq!(scheduler.graph().status_of("t3"), Some(TaskStatus::Pending));
    Ok(())
}

#[test]
fn execution_waves_group_by_depth() -> TestResult {
    let graph = TaskGraph::from_plan(&diamond())?;
    assert_eq!(
        graph.execution_waves(),
        vec![
            vec!["a".to_string()],
            vec!["b".to_string(), "c".to_string()],
            vec!["d".to_string()],
        ]
    );
    Ok(())
}

#[test]
fn snapshot_is_a_frozen_copy() -> TestResult {
    let mut graph = TaskGraph::from_plan(&diamond())?;
    let before = graph.snapshot();

    walk(&mut graph, "a", &TO_COMPLETED)?;
    let after = graph.snapshot();

    assert_eq!(before.status_of("a"), Some(TaskStatus::Pending));
    assert_eq!(after.status_of("a"), Some(TaskStatus::Completed));
    assert_eq!(after.task("d").map(|t| t.dependencies.clone()), Some(vec!["b".to_string(), "c".to_string()]));
    assert!(after.all_completed_for(Capability::Planner));
    assert!(!after.all_completed_for(Capability::Coder));
    assert!(!after.all_completed_for(Capability::Analyst));
    Ok(())
}
