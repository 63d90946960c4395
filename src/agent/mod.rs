// src/agent/mod.rs

//! Specialist agents: capability tags, the executor interface, the registry
//! built at startup and the router that binds tasks to agents.

pub mod capability;
pub mod executor;
pub mod registry;
pub mod router;
pub mod shell;

pub use capability::Capability;
pub use executor::{AgentExecutor, AgentRequest, ProducedArtifact};
pub use registry::{AgentHandle, AgentRegistry};
pub use router::{AgentRouter, HandoffCondition, HandoffRule, SnapshotPredicate};
pub use shell::ShellAgent;
