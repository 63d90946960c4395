// src/config/mod.rs

//! Orchestrator configuration.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate limits, agent tags and handoff targets (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_or_default};
pub use model::{
    AgentConfig, ConfigFile, HandoffConfig, HandoffWhen, OrchestratorSection, RawConfigFile,
};
pub use validate::validate_config;
