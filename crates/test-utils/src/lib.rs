//! Shared helpers for plandag's integration tests.

pub mod builders;
pub mod fake_agent;
pub mod fake_executor;

use std::future::Future;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

pub use builders::{ConfigFileBuilder, PlanBuilder, TaskBuilder};
pub use fake_agent::{AgentCall, Behaviour, ScriptedAgent};
pub use fake_executor::FakeExecutor;

/// Upper bound for any single awaited step in a test.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Capture logs per test; the harness only shows them for failures.
///
/// Filter with `RUST_LOG`, e.g. `RUST_LOG=plandag::engine=debug cargo test`.
/// Safe to call from every test.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .with_target(true)
        .try_init();
}

/// Await `f`, panicking if it takes longer than [`TEST_TIMEOUT`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(TEST_TIMEOUT, f).await {
        Ok(value) => value,
        Err(_) => panic!("test step did not finish within {TEST_TIMEOUT:?}"),
    }
}
