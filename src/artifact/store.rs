// src/artifact/store.rs

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dag::TaskStatus;
use crate::errors::ArtifactError;
use crate::plan::{Plan, TaskId};

/// One immutable version of a named artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub content: String,
    pub producing_task_id: TaskId,
    /// Starts at 1 and increases by one per write to the same name.
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

/// Append-only, versioned artifact store shared between the scheduler and
/// external readers.
///
/// Writes are only visible to readers once their producing task has been
/// committed (i.e. reached `completed`), so a dependent never observes the
/// half-finished output of a task that later fails.
#[derive(Debug, Default)]
pub struct ArtifactStore {
    inner: RwLock<StoreInner>,
}

#[derive(Debug, Default)]
struct StoreInner {
    /// Every version ever written, per name, in version order.
    versions: BTreeMap<String, Vec<Artifact>>,
    /// Producers declared by the current plan, per name, in plan order.
    declared: HashMap<String, Vec<TaskId>>,
    committed: HashSet<TaskId>,
}

impl StoreInner {
    fn is_visible(&self, artifact: &Artifact) -> bool {
        self.committed.contains(&artifact.producing_task_id)
    }

    fn latest_visible(&self, name: &str) -> Option<&Artifact> {
        self.versions
            .get(name)?
            .iter()
            .rev()
            .find(|a| self.is_visible(a))
    }

    /// First producer (declared or observed) that has not committed yet.
    fn pending_producer(&self, name: &str) -> Option<TaskId> {
        let declared = self.declared.get(name).into_iter().flatten();
        let written = self
            .versions
            .get(name)
            .into_iter()
            .flatten()
            .map(|a| &a.producing_task_id);

        declared
            .chain(written)
            .find(|id| !self.committed.contains(*id))
            .cloned()
    }
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record which tasks of `plan` produce which artifacts. Tasks the plan
    /// seeds as `completed` are committed straight away.
    pub fn declare_producers(&self, plan: &Plan) {
        let mut inner = self.inner.write();
        inner.declared.clear();
        for task in &plan.tasks {
            for name in &task.produces {
                inner
                    .declared
                    .entry(name.clone())
                    .or_default()
                    .push(task.id.clone());
            }
            if task.status == TaskStatus::Completed {
                inner.committed.insert(task.id.clone());
            }
        }
    }

    /// Append a new version of `name`.
    ///
    /// Writing the same content again from the same task returns the version
    /// already stored instead of appending a duplicate.
    pub fn write(
        &self,
        name: impl Into<String>,
        content: impl Into<String>,
        producing_task_id: &str,
    ) -> Artifact {
        let name = name.into();
        let content = content.into();
        let mut inner = self.inner.write();
        let history = inner.versions.entry(name.clone()).or_default();

        if let Some(existing) = history
            .iter()
            .rev()
            .find(|a| a.producing_task_id == producing_task_id)
        {
            if existing.content == content {
                debug!(artifact = %name, version = existing.version, "idempotent artifact write");
                return existing.clone();
            }
        }

        let artifact = Artifact {
            name,
            content,
            producing_task_id: producing_task_id.to_string(),
            version: history.len() as u64 + 1,
            created_at: Utc::now(),
        };
        history.push(artifact.clone());

        debug!(
            artifact = %artifact.name,
            version = artifact.version,
            task = %artifact.producing_task_id,
            "artifact written"
        );
        artifact
    }

    /// Make everything `task_id` wrote visible to readers.
    pub fn commit(&self, task_id: &str) {
        self.inner.write().committed.insert(task_id.to_string());
    }

    /// Latest committed version of `name`.
    pub fn read(&self, name: &str) -> Result<Artifact, ArtifactError> {
        let inner = self.inner.read();
        if let Some(artifact) = inner.latest_visible(name) {
            return Ok(artifact.clone());
        }
        match inner.pending_producer(name) {
            Some(producer) => Err(ArtifactError::NotReady {
                name: name.to_string(),
                producer,
            }),
            None => Err(ArtifactError::NotFound(name.to_string())),
        }
    }

    pub fn read_version(&self, name: &str, version: u64) -> Result<Artifact, ArtifactError> {
        let inner = self.inner.read();
        let history = inner
            .versions
            .get(name)
            .ok_or_else(|| match inner.pending_producer(name) {
                Some(producer) => ArtifactError::NotReady {
                    name: name.to_string(),
                    producer,
                },
                None => ArtifactError::NotFound(name.to_string()),
            })?;

        let artifact = history
            .iter()
            .find(|a| a.version == version)
            .ok_or_else(|| ArtifactError::VersionNotFound {
                name: name.to_string(),
                version,
            })?;

        if inner.is_visible(artifact) {
            Ok(artifact.clone())
        } else {
            Err(ArtifactError::NotReady {
                name: name.to_string(),
                producer: artifact.producing_task_id.clone(),
            })
        }
    }

    /// All committed versions of `name`, oldest first.
    pub fn history(&self, name: &str) -> Vec<Artifact> {
        let inner = self.inner.read();
        inner
            .versions
            .get(name)
            .map(|h| h.iter().filter(|a| inner.is_visible(a)).cloned().collect())
            .unwrap_or_default()
    }

    /// Names with at least one committed version, sorted.
    pub fn names(&self) -> Vec<String> {
        let inner = self.inner.read();
        inner
            .versions
            .keys()
            .filter(|name| inner.latest_visible(name).is_some())
            .cloned()
            .collect()
    }

    /// Latest committed version of every artifact, sorted by name.
    pub fn available(&self) -> Vec<Artifact> {
        let inner = self.inner.read();
        inner
            .versions
            .keys()
            .filter_map(|name| inner.latest_visible(name).cloned())
            .collect()
    }
}
