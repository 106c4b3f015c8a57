//! Entry point for the pgis command-line interface.
#![forbid(unsafe_code)]

use std::process::ExitCode;

use pgis_cli::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    match pgis_cli::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::ArgumentParsing(err)) => err.exit(),
        Err(err) => report(&err),
    }
}

#[expect(
    clippy::print_stderr,
    reason = "failures are reported even when logging is filtered out"
)]
fn report(err: &CliError) -> ExitCode {
    eprintln!("pgis: {err}");
    ExitCode::FAILURE
}
