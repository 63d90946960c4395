// src/lib.rs

pub mod agent;
pub mod artifact;
pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod orchestrator;
pub mod plan;
pub mod policy;
pub mod types;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, EscalationMode};
use crate::config::ConfigFile;
use crate::config::loader::load_or_default;
use crate::dag::{GraphSnapshot, TaskGraph, TaskStatus};
use crate::engine::{RunEvent, RunReport};
use crate::orchestrator::{Orchestrator, RunControl};
use crate::plan::{Plan, TaskId, load_and_validate_plan};
use crate::types::{ResumeDecision, RunState};

pub use crate::orchestrator::RunHandle;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - plan and config loading
/// - the orchestrator and its run handle
/// - the status feed printer and escalation handling
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let plan = load_and_validate_plan(&args.plan)
        .with_context(|| format!("failed to load plan from {}", args.plan))?;

    let config_path = PathBuf::from(&args.config);
    let mut cfg = load_or_default(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    apply_overrides(&mut cfg, &args)?;

    if args.dry_run {
        return print_dry_run(&plan, &cfg);
    }

    let orchestrator = Orchestrator::from_config(&cfg);
    let mut handle = orchestrator.submit(plan)?;
    let control = handle.control();
    let snapshots = handle.snapshots();
    let mut events = handle
        .take_events()
        .context("event receiver already taken")?;

    // Ctrl-C → abort.
    {
        let control = control.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("Ctrl-C received; aborting run");
            if let Err(e) = control.abort().await {
                debug!(error = %e, "abort after Ctrl-C not delivered");
            }
        });
    }

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut events_open = true;
    let wait = handle.wait();
    tokio::pin!(wait);

    let report = loop {
        tokio::select! {
            report = &mut wait => break report?,

            event = events.recv(), if events_open => match event {
                Ok(event) => {
                    print_event(&event, args.events_json);
                    if let RunEvent::RunState { new: RunState::Suspended, .. } = event {
                        let escalated = escalated_tasks(&snapshots.borrow());
                        let decision = tokio::select! {
                            report = &mut wait => break report?,
                            decision = escalation_decision(args.escalation, &escalated, &mut stdin) => decision,
                        };
                        if let Some(decision) = decision {
                            apply_decision(&control, decision).await;
                        }
                    }
                }
                Err(RecvError::Lagged(n)) => warn!(missed = n, "status feed lagged; some events were dropped"),
                Err(RecvError::Closed) => events_open = false,
            },
        }
    };

    // Events published right before the run ended.
    while let Ok(event) = events.try_recv() {
        print_event(&event, args.events_json);
    }

    print_report(&report);
    if report.state != RunState::Completed {
        bail!("run ended in state '{}'", report.state);
    }
    Ok(())
}

fn apply_overrides(cfg: &mut ConfigFile, args: &CliArgs) -> Result<()> {
    if let Some(n) = args.max_concurrency {
        if n == 0 {
            bail!("--max-concurrency must be >= 1");
        }
        cfg.orchestrator.max_concurrency = n;
    }
    if args.escalation == EscalationMode::Exit {
        cfg.orchestrator.exit_when_suspended = true;
    }
    Ok(())
}

fn escalated_tasks(snapshot: &GraphSnapshot) -> Vec<TaskId> {
    snapshot
        .tasks()
        .iter()
        .filter(|t| t.status == TaskStatus::Escalated)
        .map(|t| t.id.clone())
        .collect()
}

/// `None` means "leave the run suspended".
async fn escalation_decision(
    mode: EscalationMode,
    escalated: &[TaskId],
    stdin: &mut Lines<BufReader<Stdin>>,
) -> Option<ResumeDecision> {
    match mode {
        EscalationMode::Skip => Some(ResumeDecision::Skip),
        EscalationMode::Abort => Some(ResumeDecision::Abort),
        EscalationMode::Exit => None,
        EscalationMode::Prompt => Some(prompt_decision(escalated, stdin).await),
    }
}

async fn prompt_decision(
    escalated: &[TaskId],
    stdin: &mut Lines<BufReader<Stdin>>,
) -> ResumeDecision {
    loop {
        eprintln!(
            "escalated: {}. [r]etry, [s]kip or [a]bort?",
            escalated.join(", ")
        );
        match stdin.next_line().await {
            Ok(Some(line)) => match line.parse::<ResumeDecision>() {
                Ok(ResumeDecision::Continue) => eprintln!("continue does not resolve an escalation"),
                Ok(decision) => return decision,
                Err(e) => eprintln!("{e}"),
            },
            Ok(None) => {
                warn!("stdin closed while waiting for a decision; aborting");
                return ResumeDecision::Abort;
            }
            Err(e) => {
                warn!(error = %e, "failed to read decision from stdin; aborting");
                return ResumeDecision::Abort;
            }
        }
    }
}

async fn apply_decision(control: &RunControl, decision: ResumeDecision) {
    let sent = match decision {
        ResumeDecision::Abort => control.abort().await,
        other => control.resume(other).await,
    };
    if let Err(e) = sent {
        debug!(error = %e, ?decision, "decision not delivered; run already finished");
    }
}

fn print_event(event: &RunEvent, as_json: bool) {
    if as_json {
        match event.to_json() {
            Ok(line) => println!("{line}"),
            Err(e) => warn!(error = %e, "failed to serialise run event"),
        }
        return;
    }

    match event {
        RunEvent::TaskStatus(status) => match &status.error_kind {
            Some(kind) => println!(
                "task {:<24} {} -> {} ({kind})",
                status.task_id, status.old_status, status.new_status
            ),
            None => println!(
                "task {:<24} {} -> {}",
                status.task_id, status.old_status, status.new_status
            ),
        },
        RunEvent::RunState { old, new, .. } => println!("run  {old} -> {new}"),
        RunEvent::Handoff(record) => {
            println!("handoff {} -> {}", record.from_agent, record.to_agent)
        }
        RunEvent::ArtifactWritten {
            name,
            version,
            producing_task_id,
        } => println!("artifact {name} v{version} (from {producing_task_id})"),
    }
}

fn print_report(report: &RunReport) {
    println!();
    println!("{}", report.summary());
    for task in &report.tasks {
        match &task.failure {
            Some(failure) if failure.origin == task.id => println!(
                "  {:<24} {:<10} {}: {}",
                task.id, task.status, failure.kind, failure.message
            ),
            Some(failure) => println!(
                "  {:<24} {:<10} {} (caused by {})",
                task.id, task.status, failure.kind, failure.origin
            ),
            None => println!("  {:<24} {}", task.id, task.status),
        }
    }
}

/// Validate the plan and print tasks, agents and execution waves.
fn print_dry_run(plan: &Plan, cfg: &ConfigFile) -> Result<()> {
    let graph = TaskGraph::from_plan(plan)?;

    println!("plandag dry-run");
    println!("  goal = {}", plan.goal);
    println!(
        "  orchestrator.max_concurrency = {}",
        cfg.orchestrator.max_concurrency
    );
    println!("  orchestrator.tie_break = {:?}", cfg.orchestrator.tie_break);
    println!();

    println!("agents ({}):", cfg.agent.len());
    for (capability, agent) in cfg.agent.iter() {
        println!("  - {capability}: {}", agent.cmd);
        if let Some(timeout) = agent.timeout {
            println!("      timeout: {timeout:?}");
        }
    }
    for handoff in &cfg.handoff {
        println!("  handoff {} -> {} when {:?}", handoff.from, handoff.to, handoff.when);
    }
    println!();

    println!("tasks ({}):", plan.tasks.len());
    for task in &plan.tasks {
        println!("  - {} [{}]", task.id, task.agent);
        if !task.name.is_empty() {
            println!("      name: {}", task.name);
        }
        if !task.dependencies.is_empty() {
            println!("      after: {:?}", task.dependencies);
        }
        if !task.produces.is_empty() {
            println!("      produces: {:?}", task.produces);
        }
        if !task.reads.is_empty() {
            println!("      reads: {:?}", task.reads);
        }
        if task.status != TaskStatus::Pending {
            println!("      status: {}", task.status);
        }
        if !cfg.agent.contains_key(&task.agent) {
            println!("      (no agent configured for {})", task.agent);
        }
    }
    println!();

    println!("waves:");
    for (i, wave) in graph.execution_waves().iter().enumerate() {
        println!("  {}: {}", i + 1, wave.join(", "));
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
