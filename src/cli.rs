// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `plandag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "plandag",
    version,
    about = "Run a multi-agent task plan as a dependency graph.",
    long_about = None
)]
pub struct CliArgs {
    /// Plan file (`.json`, otherwise TOML).
    #[arg(long, value_name = "PATH")]
    pub plan: String,

    /// Path to the orchestrator config file (TOML).
    ///
    /// Default: `Plandag.toml` in the current working directory. A missing
    /// file means "no agents configured, default limits".
    #[arg(long, value_name = "PATH", default_value = "Plandag.toml")]
    pub config: String,

    /// Override `[orchestrator].max_concurrency`.
    #[arg(long, value_name = "N")]
    pub max_concurrency: Option<usize>,

    /// What to do when a task escalates to the operator.
    #[arg(long, value_enum, value_name = "MODE", default_value = "prompt")]
    pub escalation: EscalationMode,

    /// Print the status feed as JSON lines instead of plain text.
    #[arg(long)]
    pub events_json: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PLANDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the execution waves, but don't run any agent.
    #[arg(long)]
    pub dry_run: bool,
}

/// Reaction to a suspended run.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum EscalationMode {
    /// Ask on stdin: retry, skip or abort.
    Prompt,
    /// Skip every escalated task.
    Skip,
    Abort,
    /// Stop with a `suspended` report.
    Exit,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
