// src/agent/shell.rs

//! An agent that runs a shell command per task.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::agent::executor::{AgentExecutor, AgentRequest, ProducedArtifact};
use crate::errors::TaskError;

/// Runs `cmd` through the platform shell, once per attempt, inside a fresh
/// `<workspace>/<task id>/attempt-<n>` directory.
///
/// Before the command starts, every input artifact is written to
/// `<attempt dir>/<artifact name>`, except the task's own declared outputs
/// that it does not also read. After it exits successfully, each name in the
/// task's `produces` list is read back from that directory. A task that
/// declares no outputs gets its stdout stored as `<task id>.stdout`.
///
/// The task is described to the command through `PLANDAG_*` environment
/// variables. The child process is killed when the future is dropped, which
/// is how timeouts and cancellation reach it.
#[derive(Debug, Clone)]
pub struct ShellAgent {
    cmd: String,
    workspace: PathBuf,
    env: BTreeMap<String, String>,
}

impl ShellAgent {
    pub fn new(cmd: impl Into<String>, workspace: impl Into<PathBuf>) -> Self {
        Self {
            cmd: cmd.into(),
            workspace: workspace.into(),
            env: BTreeMap::new(),
        }
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env.extend(env);
        self
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Fresh directory for one attempt of one task.
    fn attempt_dir(&self, request: &AgentRequest) -> PathBuf {
        self.workspace
            .join(&request.task.id)
            .join(format!("attempt-{}", request.attempt))
    }

    async fn run(&self, request: &AgentRequest) -> Result<Vec<ProducedArtifact>> {
        let task = &request.task;
        let dir = self.attempt_dir(request);

        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => debug!(task = %task.id, dir = %dir.display(), "cleared stale attempt directory"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| format!("clearing attempt directory {dir:?}"));
            }
        }
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("creating attempt directory {dir:?}"))?;

        for artifact in &request.artifacts {
            // A declared output must come from this attempt, unless the task
            // also reads it and edits it in place.
            if task.produces.contains(&artifact.name) && !task.reads.contains(&artifact.name) {
                debug!(task = %task.id, artifact = %artifact.name, "not materializing declared output");
                continue;
            }
            let path = artifact_path(&dir, &artifact.name)?;
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, &artifact.content)
                .await
                .with_context(|| format!("materializing artifact '{}'", artifact.name))?;
        }

        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.cmd);
            c
        };

        cmd.current_dir(&dir)
            .envs(&self.env)
            .env("PLANDAG_TASK_ID", &task.id)
            .env("PLANDAG_TASK_NAME", task.display_name())
            .env("PLANDAG_TASK_GOAL", &task.goal)
            .env("PLANDAG_AGENT", task.agent.as_str())
            .env("PLANDAG_ATTEMPT", request.attempt.to_string())
            .env("PLANDAG_WORKSPACE", &dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!(task = %task.id, cmd = %self.cmd, attempt = request.attempt, "starting agent process");

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning process for task '{}'", task.id))?;

        let mut stdout = child.stdout.take().context("child stdout not captured")?;
        let stdout_reader = tokio::spawn(async move {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).await.map(|_| buf)
        });

        if let Some(stderr) = child.stderr.take() {
            let task_id = task.id.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(task = %task_id, "stderr: {}", line);
                }
            });
        }

        let status = child
            .wait()
            .await
            .with_context(|| format!("waiting for process of task '{}'", task.id))?;
        let output = stdout_reader
            .await
            .context("stdout reader task failed")?
            .context("reading process stdout")?;

        info!(
            task = %task.id,
            exit_code = status.code().unwrap_or(-1),
            success = status.success(),
            "agent process exited"
        );

        if !status.success() {
            bail!(
                "command exited with status {}",
                status.code().map_or_else(|| "unknown".to_string(), |c| c.to_string())
            );
        }

        if task.produces.is_empty() {
            let output = String::from_utf8(output).context("process stdout is not valid UTF-8")?;
            return Ok(vec![ProducedArtifact::new(format!("{}.stdout", task.id), output)]);
        }

        let mut produced = Vec::with_capacity(task.produces.len());
        for name in &task.produces {
            let path = artifact_path(&dir, name)?;
            let content = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("declared artifact '{name}' was not written"))?;
            produced.push(ProducedArtifact::new(name.clone(), content));
        }
        Ok(produced)
    }
}

/// Map an artifact name onto a path inside `dir`.
fn artifact_path(dir: &Path, name: &str) -> Result<PathBuf> {
    let relative = Path::new(name);
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if name.is_empty() || escapes {
        bail!("artifact name '{name}' is not a relative path inside the workspace");
    }
    Ok(dir.join(relative))
}

#[async_trait]
impl AgentExecutor for ShellAgent {
    async fn execute(&self, request: AgentRequest) -> Result<Vec<ProducedArtifact>, TaskError> {
        self.run(&request)
            .await
            .map_err(|e| TaskError::execution(format!("{e:#}")))
    }
}
