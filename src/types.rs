use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

/// How the dependency resolver orders tasks that become ready at the same
/// time, which matters when fewer slots are free than tasks are ready.
///
/// - `DeclarationOrder`: plan order (default, fully deterministic).
/// - `MostDependents`: tasks unblocking the most direct dependents first,
///   falling back to plan order on ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    #[default]
    DeclarationOrder,
    MostDependents,
}

impl FromStr for TieBreak {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "declaration_order" => Ok(TieBreak::DeclarationOrder),
            "most_dependents" => Ok(TieBreak::MostDependents),
            other => Err(format!(
                "invalid tie_break: {other} (expected \"declaration_order\" or \"most_dependents\")"
            )),
        }
    }
}

/// Run-level state, distinct from per-task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Running,
    /// Operator pause; in-flight tasks continue, nothing new is dispatched.
    Paused,
    /// At least one task is escalated and awaits an operator decision.
    Suspended,
    Completed,
    /// Completed, but some tasks never ran because an upstream task failed.
    CompletedWithSkips,
    /// Completed, but a `proceed` failure had nothing downstream to skip.
    CompletedWithFailures,
    Aborted,
}

impl RunState {
    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Running => "running",
            RunState::Paused => "paused",
            RunState::Suspended => "suspended",
            RunState::Completed => "completed",
            RunState::CompletedWithSkips => "completed_with_skips",
            RunState::CompletedWithFailures => "completed_with_failures",
            RunState::Aborted => "aborted",
        }
    }

    /// States from which the run can no longer make progress on its own.
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            RunState::Completed
                | RunState::CompletedWithSkips
                | RunState::CompletedWithFailures
                | RunState::Aborted
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator decision carried by `resume`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeDecision {
    /// Lift a pause. Escalated tasks stay escalated.
    Continue,
    /// Put escalated tasks back to pending so they are dispatched again.
    Retry,
    /// Mark escalated tasks skipped; their dependents never run.
    Skip,
    Abort,
}

impl FromStr for ResumeDecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "continue" | "c" => Ok(ResumeDecision::Continue),
            "retry" | "r" => Ok(ResumeDecision::Retry),
            "skip" | "s" => Ok(ResumeDecision::Skip),
            "abort" | "a" => Ok(ResumeDecision::Abort),
            other => Err(format!(
                "invalid decision: {other} (expected continue, retry, skip or abort)"
            )),
        }
    }
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| format!("duration '{s}' is missing a unit suffix"))?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{num_part}': {e}"))?;

    let secs = |factor: u64| {
        value
            .checked_mul(factor)
            .map(Duration::from_secs)
            .ok_or_else(|| format!("duration '{s}' is too large"))
    };

    match unit_part.trim().to_lowercase().as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => secs(60),
        "h" => secs(60 * 60),
        unit => Err(format!(
            "unsupported duration unit '{unit}'; expected ms, s, m, or h"
        )),
    }
}

/// Serde helper for optional duration strings (`timeout = "30s"`).
pub fn deserialize_opt_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|s| parse_duration(&s).map_err(serde::de::Error::custom))
        .transpose()
}
