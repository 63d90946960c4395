// tests/logging_filter.rs

use std::error::Error;

use plandag::cli::LogLevel;
use plandag::logging::build_filter;

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn cli_flag_wins_over_environment() -> TestResult {
    let filter = build_filter(Some(LogLevel::Debug), Some("plandag=trace"))?;
    assert_eq!(filter.to_string(), "debug");
    Ok(())
}

#[test]
fn environment_directives_are_used_verbatim() -> TestResult {
    let filter = build_filter(None, Some("plandag::engine=debug"))?;
    assert_eq!(filter.to_string(), "plandag::engine=debug");
    Ok(())
}

#[test]
fn blank_environment_falls_back_to_info() -> TestResult {
    assert_eq!(build_filter(None, Some("   "))?.to_string(), "info");
    assert_eq!(build_filter(None, None)?.to_string(), "info");
    Ok(())
}

#[test]
fn malformed_environment_value_is_reported() {
    let err = build_filter(None, Some("plandag=loud")).unwrap_err();
    assert!(err.to_string().contains("PLANDAG_LOG"), "{err}");
}
