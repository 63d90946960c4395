// src/config/validate.rs

use std::collections::BTreeMap;

use crate::agent::Capability;
use crate::config::model::{AgentConfig, ConfigFile, RawConfigFile};
use crate::errors::{PlandagError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = PlandagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_orchestrator(&raw)?;
        let agent = parse_agents(&raw)?;
        validate_handoffs(&raw, &agent)?;
        Ok(ConfigFile::new_unchecked(raw.orchestrator, agent, raw.handoff))
    }
}

/// Validate an already-typed config (e.g. one assembled in code).
pub fn validate_config(cfg: &ConfigFile) -> Result<()> {
    let raw = RawConfigFile {
        orchestrator: cfg.orchestrator.clone(),
        agent: cfg
            .agent
            .iter()
            .map(|(c, a)| (c.to_string(), a.clone()))
            .collect(),
        handoff: cfg.handoff.clone(),
    };
    ConfigFile::try_from(raw).map(|_| ())
}

fn validate_orchestrator(cfg: &RawConfigFile) -> Result<()> {
    if cfg.orchestrator.max_concurrency == 0 {
        return Err(PlandagError::ConfigError(
            "[orchestrator].max_concurrency must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.orchestrator.event_capacity == 0 {
        return Err(PlandagError::ConfigError(
            "[orchestrator].event_capacity must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.orchestrator.task_timeout.is_some_and(|d| d.is_zero()) {
        return Err(PlandagError::ConfigError(
            "[orchestrator].task_timeout must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn parse_agents(cfg: &RawConfigFile) -> Result<BTreeMap<Capability, AgentConfig>> {
    let mut agents = BTreeMap::new();
    for (tag, agent) in cfg.agent.iter() {
        let capability: Capability = tag
            .parse()
            .map_err(|e: String| PlandagError::ConfigError(format!("[agent.{tag}]: {e}")))?;

        if agent.cmd.trim().is_empty() {
            return Err(PlandagError::ConfigError(format!(
                "[agent.{tag}].cmd must not be empty"
            )));
        }
        if agent.timeout.is_some_and(|d| d.is_zero()) {
            return Err(PlandagError::ConfigError(format!(
                "[agent.{tag}].timeout must be greater than zero"
            )));
        }

        if agents.insert(capability, agent.clone()).is_some() {
            return Err(PlandagError::ConfigError(format!(
                "capability '{capability}' is configured more than once"
            )));
        }
    }
    Ok(agents)
}

fn validate_handoffs(
    cfg: &RawConfigFile,
    agents: &BTreeMap<Capability, AgentConfig>,
) -> Result<()> {
    for (i, handoff) in cfg.handoff.iter().enumerate() {
        if handoff.from == handoff.to {
            return Err(PlandagError::ConfigError(format!(
                "handoff #{} hands '{}' off to itself",
                i + 1,
                handoff.from
            )));
        }
        if !agents.contains_key(&handoff.to) {
            return Err(PlandagError::ConfigError(format!(
                "handoff #{} targets '{}' but no [agent.{}] is configured",
                i + 1,
                handoff.to,
                handoff.to
            )));
        }
    }
    Ok(())
}
