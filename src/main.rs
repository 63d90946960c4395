// src/main.rs

use std::process::ExitCode;

use plandag::errors::{PlandagError, ValidationError};
use plandag::{cli, logging, run};

/// Exit status for a plan or config that was rejected before running.
const EXIT_INVALID_INPUT: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("plandag: {err:#}");
        return ExitCode::from(EXIT_INVALID_INPUT);
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("plandag: {err:#}");
            let rejected = err.chain().any(|cause| {
                cause.is::<ValidationError>()
                    || matches!(
                        cause.downcast_ref::<PlandagError>(),
                        Some(PlandagError::Validation(_) | PlandagError::ConfigError(_))
                    )
            });
            if rejected {
                ExitCode::from(EXIT_INVALID_INPUT)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
