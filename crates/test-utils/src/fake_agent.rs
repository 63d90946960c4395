#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use plandag::agent::{
    AgentExecutor, AgentHandle, AgentRegistry, AgentRequest, Capability, ProducedArtifact,
};
use plandag::errors::TaskError;
use plandag::plan::TaskId;

/// What a [`ScriptedAgent`] does for a given task.
#[derive(Debug, Clone)]
pub enum Behaviour {
    /// Write every declared artifact with content `"<task> v<attempt>"`.
    Succeed,
    /// Succeed with exactly these artifacts.
    Produce(Vec<ProducedArtifact>),
    /// Fail every attempt with an execution error.
    Fail(String),
    /// Fail the first `n` attempts, then succeed.
    FailTimes(u32),
    /// Sleep, then succeed.
    Sleep(Duration),
    /// Never return.
    Hang,
}

/// One recorded `execute` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentCall {
    pub task: TaskId,
    pub attempt: u32,
    /// Names of the artifacts visible at dispatch.
    pub inputs: Vec<String>,
}

#[derive(Default)]
struct State {
    scripts: Mutex<HashMap<TaskId, Behaviour>>,
    calls: Mutex<Vec<AgentCall>>,
    finished: Mutex<Vec<TaskId>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// An in-process agent driven by per-task scripts.
///
/// Clones share state, so a test can hand one copy to the registry and
/// inspect the calls through another.
#[derive(Clone, Default)]
pub struct ScriptedAgent {
    state: Arc<State>,
}

impl ScriptedAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, task: &str, behaviour: Behaviour) -> Self {
        self.state
            .scripts
            .lock()
            .unwrap()
            .insert(task.to_string(), behaviour);
        self
    }

    pub fn handle(&self, capability: Capability) -> AgentHandle {
        AgentHandle::new(
            format!("scripted:{capability}"),
            capability,
            Arc::new(self.clone()),
        )
    }

    /// A registry serving every capability with this agent.
    pub fn registry(&self) -> AgentRegistry {
        Capability::ALL
            .into_iter()
            .fold(AgentRegistry::new(), |r, c| r.with_agent(self.handle(c)))
    }

    pub fn calls(&self) -> Vec<AgentCall> {
        self.state.calls.lock().unwrap().clone()
    }

    /// Task ids in the order their calls started.
    pub fn started(&self) -> Vec<TaskId> {
        self.calls().into_iter().map(|c| c.task).collect()
    }

    /// Task ids in the order their calls returned successfully.
    pub fn finished(&self) -> Vec<TaskId> {
        self.state.finished.lock().unwrap().clone()
    }

    pub fn attempts_of(&self, task: &str) -> usize {
        self.calls().iter().filter(|c| c.task == task).count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    fn behaviour_for(&self, task: &str) -> Behaviour {
        self.state
            .scripts
            .lock()
            .unwrap()
            .get(task)
            .cloned()
            .unwrap_or(Behaviour::Succeed)
    }
}

fn declared_outputs(request: &AgentRequest) -> Vec<ProducedArtifact> {
    request
        .task
        .produces
        .iter()
        .map(|name| {
            ProducedArtifact::new(
                name.clone(),
                format!("{} v{}", request.task.id, request.attempt),
            )
        })
        .collect()
}

/// Decrements the in-flight counter even when the call is cancelled.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl AgentExecutor for ScriptedAgent {
    async fn execute(&self, request: AgentRequest) -> Result<Vec<ProducedArtifact>, TaskError> {
        let now = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.state.in_flight);

        self.state.calls.lock().unwrap().push(AgentCall {
            task: request.task.id.clone(),
            attempt: request.attempt,
            inputs: request.artifacts.iter().map(|a| a.name.clone()).collect(),
        });

        let result = match self.behaviour_for(&request.task.id) {
            Behaviour::Succeed => Ok(declared_outputs(&request)),
            Behaviour::Produce(artifacts) => Ok(artifacts),
            Behaviour::Fail(message) => Err(TaskError::execution(message)),
            Behaviour::FailTimes(n) if request.attempt <= n => Err(TaskError::execution(format!(
                "scripted failure {} of {n}",
                request.attempt
            ))),
            Behaviour::FailTimes(_) => Ok(declared_outputs(&request)),
            Behaviour::Sleep(d) => {
                tokio::time::sleep(d).await;
                Ok(declared_outputs(&request))
            }
            Behaviour::Hang => std::future::pending().await,
        };

        if result.is_ok() {
            self.state
                .finished
                .lock()
                .unwrap()
                .push(request.task.id.clone());
        }
        result
    }
}
