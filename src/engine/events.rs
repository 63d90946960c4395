// src/engine/events.rs

//! The ordered status feed published to dashboards and observers.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::agent::Capability;
use crate::dag::StatusEvent;
use crate::plan::TaskId;
use crate::types::RunState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandoffRecord {
    pub from_agent: Capability,
    pub to_agent: Capability,
    pub timestamp: DateTime<Utc>,
}

/// One entry of the run's event feed, in the order things happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    TaskStatus(StatusEvent),
    RunState {
        old: RunState,
        new: RunState,
        timestamp: DateTime<Utc>,
    },
    Handoff(HandoffRecord),
    ArtifactWritten {
        name: String,
        version: u64,
        producing_task_id: TaskId,
    },
}

impl RunEvent {
    /// The status change carried by this event, if it is one.
    pub fn as_status(&self) -> Option<&StatusEvent> {
        match self {
            RunEvent::TaskStatus(ev) => Some(ev),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
