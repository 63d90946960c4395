#![allow(dead_code)]

pub use plandag_test_utils::*;

use plandag::agent::AgentRouter;
use plandag::config::OrchestratorSection;
use plandag::dag::{StatusEvent, TaskStatus};
use plandag::engine::RunEvent;
use plandag::orchestrator::Orchestrator;
use plandag::types::RunState;
use tokio::sync::broadcast;

/// An orchestrator whose every capability is served by `agent`.
pub fn orchestrator(agent: &ScriptedAgent, max_concurrency: usize) -> Orchestrator {
    let settings = OrchestratorSection {
        max_concurrency,
        ..OrchestratorSection::default()
    };
    Orchestrator::new(settings, AgentRouter::new(agent.registry(), Vec::new()))
}

/// Everything still buffered in `rx`. Call after the run has finished.
pub fn drain(rx: &mut broadcast::Receiver<RunEvent>) -> Vec<RunEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn status_events(events: &[RunEvent]) -> Vec<&StatusEvent> {
    events.iter().filter_map(RunEvent::as_status).collect()
}

/// `(task, new status)` pairs in feed order.
pub fn transitions(events: &[RunEvent]) -> Vec<(String, TaskStatus)> {
    status_events(events)
        .into_iter()
        .map(|e| (e.task_id.clone(), e.new_status))
        .collect()
}

pub fn run_states(events: &[RunEvent]) -> Vec<RunState> {
    events
        .iter()
        .filter_map(|e| match e {
            RunEvent::RunState { new, .. } => Some(*new),
            _ => None,
        })
        .collect()
}

/// Wait until the run reports `state`.
pub async fn wait_for_state(rx: &mut broadcast::Receiver<RunEvent>, state: RunState) {
    loop {
        match rx.recv().await {
            Ok(RunEvent::RunState { new, .. }) if new == state => return,
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => {
                panic!("event feed closed before the run reached {state}")
            }
        }
    }
}

/// Wait until `task` enters `status`.
pub async fn wait_for_status(
    rx: &mut broadcast::Receiver<RunEvent>,
    task: &str,
    status: TaskStatus,
) {
    loop {
        match rx.recv().await {
            Ok(RunEvent::TaskStatus(e)) if e.task_id == task && e.new_status == status => return,
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => {
                panic!("event feed closed before {task} became {status}")
            }
        }
    }
}
