// src/agent/capability.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Closed set of specialist roles a task can be bound to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Planner,
    Researcher,
    Architect,
    Coder,
    Tester,
    Reviewer,
    Writer,
    Analyst,
}

impl Capability {
    pub const ALL: [Capability; 8] = [
        Capability::Planner,
        Capability::Researcher,
        Capability::Architect,
        Capability::Coder,
        Capability::Tester,
        Capability::Reviewer,
        Capability::Writer,
        Capability::Analyst,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Planner => "planner",
            Capability::Researcher => "researcher",
            Capability::Architect => "architect",
            Capability::Coder => "coder",
            Capability::Tester => "tester",
            Capability::Reviewer => "reviewer",
            Capability::Writer => "writer",
            Capability::Analyst => "analyst",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Capability::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| {
                let known: Vec<&str> = Capability::ALL.iter().map(|c| c.as_str()).collect();
                format!("unknown capability '{s}' (expected one of: {})", known.join(", "))
            })
    }
}
