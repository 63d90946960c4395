// src/plan/loader.rs

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::errors::Result;
use crate::plan::model::Plan;
use crate::plan::validate::validate_plan;

/// Read a plan from disk without validating it.
///
/// Files ending in `.json` are parsed as JSON; everything else as TOML.
pub fn load_plan(path: impl AsRef<Path>) -> Result<Plan> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let plan: Plan = if is_json {
        serde_json::from_str(&contents)?
    } else {
        toml::from_str(&contents)?
    };

    debug!(path = %path.display(), tasks = plan.tasks.len(), "plan loaded");
    Ok(plan)
}

/// Read a plan from disk and reject it if it is structurally invalid.
pub fn load_and_validate_plan(path: impl AsRef<Path>) -> Result<Plan> {
    let plan = load_plan(path)?;
    validate_plan(&plan)?;
    Ok(plan)
}
