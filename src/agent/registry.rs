// src/agent/registry.rs

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::agent::capability::Capability;
use crate::agent::executor::AgentExecutor;
use crate::agent::shell::ShellAgent;
use crate::config::ConfigFile;

/// A registered agent, ready to be dispatched to.
#[derive(Clone)]
pub struct AgentHandle {
    pub name: String,
    pub capability: Capability,
    /// Used when the task itself has no timeout.
    pub timeout: Option<Duration>,
    executor: Arc<dyn AgentExecutor>,
}

impl AgentHandle {
    pub fn new(
        name: impl Into<String>,
        capability: Capability,
        executor: Arc<dyn AgentExecutor>,
    ) -> Self {
        Self {
            name: name.into(),
            capability,
            timeout: None,
            executor,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn executor(&self) -> Arc<dyn AgentExecutor> {
        Arc::clone(&self.executor)
    }
}

impl fmt::Debug for AgentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentHandle")
            .field("name", &self.name)
            .field("capability", &self.capability)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Capability -> agent table, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    agents: BTreeMap<Capability, AgentHandle>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle` for its capability, returning the handle it replaced.
    pub fn register(&mut self, handle: AgentHandle) -> Option<AgentHandle> {
        debug!(agent = %handle.name, capability = %handle.capability, "registering agent");
        self.agents.insert(handle.capability, handle)
    }

    pub fn with_agent(mut self, handle: AgentHandle) -> Self {
        self.register(handle);
        self
    }

    pub fn get(&self, capability: Capability) -> Option<&AgentHandle> {
        self.agents.get(&capability)
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.agents.contains_key(&capability)
    }

    pub fn capabilities(&self) -> impl Iterator<Item = Capability> + '_ {
        self.agents.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// One [`ShellAgent`] per `[agent.<capability>]` section, each working in
    /// its own directory below the configured workspace.
    pub fn from_config(cfg: &ConfigFile, workspace_root: &Path) -> Self {
        let mut registry = Self::new();
        for (capability, agent_cfg) in cfg.agent.iter() {
            let shell = ShellAgent::new(
                agent_cfg.cmd.clone(),
                workspace_root.join(capability.as_str()),
            )
            .with_env(agent_cfg.env.clone());

            registry.register(
                AgentHandle::new(
                    format!("shell:{capability}"),
                    *capability,
                    Arc::new(shell),
                )
                .with_timeout(agent_cfg.timeout),
            );
        }
        registry
    }
}
