// tests/plan_validation.rs

mod common;
use crate::common::{PlanBuilder, ScriptedAgent, TaskBuilder, init_tracing, orchestrator};

use std::error::Error;
use std::io::Write;

use plandag::agent::Capability;
use plandag::cli::{CliArgs, EscalationMode};
use plandag::dag::{TaskGraph, TaskStatus};
use plandag::errors::{PlandagError, ValidationError};
use plandag::plan::{Plan, TaskSpec, load_and_validate_plan, load_plan, validate_plan};

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn valid_plan_resolves_declared_edges() -> TestResult {
    let plan = PlanBuilder::new("ship it")
        .task("design", Capability::Architect, &[])
        .task("build", Capability::Coder, &["design"])
        .task("test", Capability::Tester, &["build", "design"])
        .build();

    let edges = validate_plan(&plan)?;
    assert_eq!(edges, vec![vec![], vec![0], vec![1, 0]]);
    Ok(())
}

#[test]
fn empty_plan_is_valid() -> TestResult {
    let plan = Plan::new("nothing to do", Vec::new());
    assert!(validate_plan(&plan)?.is_empty());
    assert!(TaskGraph::from_plan(&plan)?.is_empty());
    Ok(())
}

#[test]
fn duplicate_ids_are_rejected() {
    let plan = PlanBuilder::new("dup")
        .task("a", Capability::Coder, &[])
        .task("a", Capability::Tester, &[])
        .build();

    assert_eq!(
        validate_plan(&plan),
        Err(ValidationError::DuplicateId("a".to_string()))
    );
}

#[test]
fn ids_with_spaces_or_slashes_are_rejected() {
    for bad in ["has space", "a/b", "", ".", ".."] {
        let plan = Plan::new("bad ids", vec![TaskSpec::new(bad, Capability::Coder)]);
        assert_eq!(
            validate_plan(&plan),
            Err(ValidationError::InvalidId(bad.to_string())),
            "id {bad:?} should be rejected"
        );
    }
}

#[test]
fn dangling_dependency_names_both_tasks() {
    let plan = PlanBuilder::new("dangling")
        .task("build", Capability::Coder, &["design"])
        .build();

    let err = validate_plan(&plan).unwrap_err();
    assert_eq!(
        err,
        ValidationError::DanglingDependency {
            task: "build".to_string(),
            dependency: "design".to_string(),
        }
    );
    assert!(err.to_string().contains("unknown task 'design'"));
}

#[test]
fn cycle_is_reported_with_its_path() {
    let plan = PlanBuilder::new("cycle")
        .task("a", Capability::Coder, &["c"])
        .task("b", Capability::Coder, &["a"])
        .task("c", Capability::Coder, &["b"])
        .build();

    match validate_plan(&plan) {
        Err(ValidationError::Cycle(path)) => {
            assert_eq!(path.first(), path.last());
            assert_eq!(path.len(), 4);
            for id in ["a", "b", "c"] {
                assert!(path.iter().any(|p| p == id), "{id} missing from {path:?}");
            }
        }
        other => panic!("expected cycle, got {other:?}"),
    }
}

/// `step_0` depends on `step_1`, which depends on `step_2`, and so on,
/// declared so the walk has to follow the whole chain from the first task.
fn long_chain(len: usize) -> Vec<TaskSpec> {
    (0..len)
        .map(|i| {
            let task = TaskSpec::new(format!("step_{i}"), Capability::Coder);
            if i + 1 < len {
                task.after(format!("step_{}", i + 1))
            } else {
                task
            }
        })
        .collect()
}

#[test]
fn very_long_chains_validate() -> TestResult {
    let plan = Plan::new("deep", long_chain(100_000));

    let edges = validate_plan(&plan)?;
    assert_eq!(edges.iter().map(Vec::len).sum::<usize>(), 99_999);

    let graph = TaskGraph::from_plan(&plan)?;
    assert_eq!(graph.execution_waves().len(), 100_000);
    Ok(())
}

#[test]
fn cycle_closing_a_very_long_chain_is_found() {
    let mut tasks = long_chain(50_000);
    let last = tasks.len() - 1;
    tasks[last] = TaskSpec::new(format!("step_{last}"), Capability::Coder).after("step_0");

    match validate_plan(&Plan::new("deep cycle", tasks)) {
        Err(ValidationError::Cycle(path)) => {
            assert_eq!(path.len(), 50_001);
            assert_eq!(path.first().map(String::as_str), Some("step_0"));
            assert_eq!(path.last().map(String::as_str), Some("step_0"));
        }
        other => panic!("expected cycle, got {other:?}"),
    }
}

#[test]
fn self_dependency_is_a_cycle() {
    let plan = PlanBuilder::new("self")
        .task("loop", Capability::Coder, &["loop"])
        .build();

    assert_eq!(
        validate_plan(&plan),
        Err(ValidationError::Cycle(vec![
            "loop".to_string(),
            "loop".to_string()
        ]))
    );
}

#[test]
fn reads_add_an_edge_to_the_producer() -> TestResult {
    let plan = PlanBuilder::new("artifacts")
        .with_task(TaskBuilder::new("review", Capability::Reviewer).reads("patch").build())
        .with_task(TaskBuilder::new("code", Capability::Coder).produces("patch").build())
        .build();

    let graph = TaskGraph::from_plan(&plan)?;
    let review = graph.get("review").expect("review exists");
    assert_eq!(review.deps, vec![1]);
    assert_eq!(
        graph.execution_waves(),
        vec![vec!["code".to_string()], vec!["review".to_string()]]
    );
    Ok(())
}

#[test]
fn reading_an_artifact_nobody_produces_is_rejected() {
    let plan = PlanBuilder::new("artifacts")
        .with_task(TaskBuilder::new("review", Capability::Reviewer).reads("patch").build())
        .build();

    assert_eq!(
        validate_plan(&plan),
        Err(ValidationError::UnknownArtifact {
            task: "review".to_string(),
            artifact: "patch".to_string(),
        })
    );
}

#[test]
fn reads_can_close_a_cycle() {
    let plan = PlanBuilder::new("artifact cycle")
        .with_task(
            TaskBuilder::new("a", Capability::Coder)
                .produces("x")
                .reads("y")
                .build(),
        )
        .with_task(
            TaskBuilder::new("b", Capability::Coder)
                .produces("y")
                .reads("x")
                .build(),
        )
        .build();

    assert!(matches!(validate_plan(&plan), Err(ValidationError::Cycle(_))));
}

#[test]
fn only_pending_or_completed_seed_statuses_are_accepted() -> TestResult {
    let seeded = PlanBuilder::new("resume")
        .with_task(TaskBuilder::new("done", Capability::Coder).completed().build())
        .task("next", Capability::Tester, &["done"])
        .build();
    validate_plan(&seeded)?;

    let running = Plan::new(
        "bad seed",
        vec![TaskSpec::new("x", Capability::Coder).with_status(TaskStatus::Running)],
    );
    assert_eq!(
        validate_plan(&running),
        Err(ValidationError::InvalidInitialStatus {
            task: "x".to_string(),
            status: TaskStatus::Running,
        })
    );
    Ok(())
}

#[test]
fn toml_plan_file_is_loaded_with_aliases() -> TestResult {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
    write!(
        file,
        r#"
goal = "add a feature"

[[tasks]]
id = "design"
agent = "architect"
produces = ["design.md"]

[[tasks]]
id = "implement"
name = "Implement the feature"
assigned_agent = "coder"
after = ["design"]
reads = ["design.md"]
on_failure = "escalate_to_user"
timeout = "90s"
retries = 2
"#
    )?;

    let plan = load_and_validate_plan(file.path())?;
    assert_eq!(plan.goal, "add a feature");
    assert_eq!(plan.tasks.len(), 2);

    let implement = plan.task("implement").expect("implement task");
    assert_eq!(implement.agent, Capability::Coder);
    assert_eq!(implement.dependencies, vec!["design".to_string()]);
    assert_eq!(implement.display_name(), "Implement the feature");
    assert_eq!(implement.timeout, Some(std::time::Duration::from_secs(90)));
    assert_eq!(implement.retries, 2);
    assert_eq!(
        implement.on_failure,
        plandag::policy::OnFailure::EscalateToUser
    );
    Ok(())
}

#[test]
fn json_plan_file_is_loaded() -> TestResult {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile()?;
    write!(
        file,
        r#"{{
  "goal": "write docs",
  "tasks": [
    {{ "id": "outline", "agent": "planner" }},
    {{ "id": "draft", "agent": "writer", "dependencies": ["outline"], "on_failure": "proceed" }}
  ]
}}"#
    )?;

    let plan = load_plan(file.path())?;
    assert_eq!(plan.tasks[1].agent, Capability::Writer);
    assert_eq!(plan.tasks[1].on_failure, plandag::policy::OnFailure::Proceed);
    assert_eq!(plan.tasks[0].on_failure, plandag::policy::OnFailure::Halt);
    Ok(())
}

#[test]
fn unknown_capability_in_plan_file_is_a_parse_error() -> TestResult {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
    write!(
        file,
        r#"
goal = "x"

[[tasks]]
id = "t"
agent = "astronaut"
"#
    )?;

    assert!(matches!(
        load_plan(file.path()),
        Err(PlandagError::TomlError(_))
    ));
    Ok(())
}

#[tokio::test]
async fn invalid_plan_is_rejected_before_any_agent_runs() -> TestResult {
    init_tracing();

    let agent = ScriptedAgent::new();
    let plan = PlanBuilder::new("cycle")
        .task("ok", Capability::Planner, &[])
        .task("a", Capability::Coder, &["b"])
        .task("b", Capability::Coder, &["a"])
        .build();

    let result = orchestrator(&agent, 2).submit(plan);
    assert!(matches!(
        result,
        Err(PlandagError::Validation(ValidationError::Cycle(_)))
    ));

    tokio::task::yield_now().await;
    assert!(agent.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn cli_rejects_a_cyclic_plan_before_building_anything() -> TestResult {
    init_tracing();
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
    write!(
        file,
        r#"
goal = "loop"

[[tasks]]
id = "a"
agent = "coder"
after = ["b"]

[[tasks]]
id = "b"
agent = "coder"
after = ["a"]
"#
    )?;
    let config_dir = tempfile::tempdir()?;

    let args = CliArgs {
        plan: file.path().display().to_string(),
        config: config_dir.path().join("missing.toml").display().to_string(),
        max_concurrency: None,
        escalation: EscalationMode::Exit,
        events_json: false,
        log_level: None,
        dry_run: true,
    };
    let err = plandag::run(args).await.unwrap_err();

    assert!(format!("{err:#}").contains("failed to load plan"), "{err:#}");
    assert!(
        err.chain().any(|cause| matches!(
            cause.downcast_ref::<PlandagError>(),
            Some(PlandagError::Validation(ValidationError::Cycle(_)))
        )),
        "{err:#}"
    );
    Ok(())
}
