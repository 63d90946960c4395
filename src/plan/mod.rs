// src/plan/mod.rs

//! Plan input: the data model, loading from TOML/JSON and validation.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate_plan, load_plan};
pub use model::{Plan, TaskId, TaskSpec};
pub use validate::{ResolvedEdges, validate_plan};
