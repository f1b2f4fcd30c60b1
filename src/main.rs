//! Binary entry point: parse arguments, run the sync, map the outcome to an exit code

use airgap_mirror::cli::{Args, Runner};
use airgap_mirror::logging::Logger;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let runner = match Runner::new(Args::parse_args()) {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    Logger::init_tracing(runner.transport().debug);

    match runner.run().await {
        Ok(report) if report.ok() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
