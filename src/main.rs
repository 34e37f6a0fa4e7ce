//! namedsem: named counting semaphores from the command line.
//!
//! This is the main entry point for the `namedsem` CLI. It parses arguments,
//! loads configuration, dispatches to the appropriate command handler, and
//! handles errors with proper exit codes.

use namedsem::cli::Cli;
use namedsem::config::Config;
use namedsem::{commands, exit_codes, logging};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    logging::init(cli.verbose);

    let result = Config::resolve(cli.config.as_deref())
        .and_then(|config| commands::dispatch(cli.command, &config));

    match result {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(err) => {
            // Print user-actionable error message to stderr
            eprintln!("Error: {}", err);

            // Return appropriate exit code
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
