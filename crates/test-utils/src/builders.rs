#![allow(dead_code)]

use std::collections::BTreeMap;
use std::time::Duration;

use plandag::agent::Capability;
use plandag::config::{
    AgentConfig, ConfigFile, HandoffConfig, HandoffWhen, OrchestratorSection, RawConfigFile,
};
use plandag::dag::TaskStatus;
use plandag::plan::{Plan, TaskSpec};
use plandag::policy::OnFailure;
use plandag::types::TieBreak;

/// Builder for `Plan` to simplify test setup.
pub struct PlanBuilder {
    goal: String,
    tasks: Vec<TaskSpec>,
}

impl PlanBuilder {
    pub fn new(goal: &str) -> Self {
        Self {
            goal: goal.to_string(),
            tasks: Vec::new(),
        }
    }

    pub fn with_task(mut self, task: TaskSpec) -> Self {
        self.tasks.push(task);
        self
    }

    /// Shorthand for a plain task with explicit dependencies.
    pub fn task(self, id: &str, agent: Capability, after: &[&str]) -> Self {
        self.with_task(TaskBuilder::new(id, agent).after(after).build())
    }

    /// `ids[0] <- ids[1] <- ...`, all bound to `agent`.
    pub fn chain(mut self, ids: &[&str], agent: Capability) -> Self {
        let mut previous: Option<&str> = None;
        for id in ids {
            let deps: Vec<&str> = previous.into_iter().collect();
            self = self.task(id, agent, &deps);
            previous = Some(*id);
        }
        self
    }

    pub fn build(self) -> Plan {
        Plan::new(self.goal, self.tasks)
    }
}

/// Builder for `TaskSpec`.
pub struct TaskBuilder {
    task: TaskSpec,
}

impl TaskBuilder {
    pub fn new(id: &str, agent: Capability) -> Self {
        Self {
            task: TaskSpec::new(id, agent),
        }
    }

    pub fn after(mut self, deps: &[&str]) -> Self {
        for dep in deps {
            self.task = self.task.after(*dep);
        }
        self
    }

    pub fn produces(mut self, artifact: &str) -> Self {
        self.task = self.task.produces(artifact);
        self
    }

    pub fn reads(mut self, artifact: &str) -> Self {
        self.task = self.task.reads(artifact);
        self
    }

    pub fn on_failure(mut self, policy: OnFailure) -> Self {
        self.task = self.task.on_failure(policy);
        self
    }

    pub fn proceed(self) -> Self {
        self.on_failure(OnFailure::Proceed)
    }

    pub fn escalate(self) -> Self {
        self.on_failure(OnFailure::EscalateToUser)
    }

    pub fn retries(mut self, n: u32) -> Self {
        self.task = self.task.with_retries(n);
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.task = self.task.with_timeout(Duration::from_millis(ms));
        self
    }

    pub fn completed(mut self) -> Self {
        self.task = self.task.with_status(TaskStatus::Completed);
        self
    }

    pub fn build(self) -> TaskSpec {
        self.task
    }
}

/// Builder for `ConfigFile`, going through the same validation as a file.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                orchestrator: OrchestratorSection::default(),
                agent: BTreeMap::new(),
                handoff: Vec::new(),
            },
        }
    }

    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.config.orchestrator.max_concurrency = n;
        self
    }

    pub fn task_timeout_ms(mut self, ms: u64) -> Self {
        self.config.orchestrator.task_timeout = Some(Duration::from_millis(ms));
        self
    }

    pub fn tie_break(mut self, tie_break: TieBreak) -> Self {
        self.config.orchestrator.tie_break = tie_break;
        self
    }

    pub fn exit_when_suspended(mut self, val: bool) -> Self {
        self.config.orchestrator.exit_when_suspended = val;
        self
    }

    pub fn agent(mut self, capability: Capability, cmd: &str) -> Self {
        self.config.agent.insert(
            capability.to_string(),
            AgentConfig {
                cmd: cmd.to_string(),
                timeout: None,
                env: BTreeMap::new(),
            },
        );
        self
    }

    pub fn handoff(mut self, from: Capability, to: Capability, when: HandoffWhen) -> Self {
        self.config.handoff.push(HandoffConfig { from, to, when });
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
