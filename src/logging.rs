//! Diagnostic logging setup.
//!
//! Logs go to stderr through `tracing-subscriber`. The filter comes from
//! `$NAMEDSEM_LOG` (standard `EnvFilter` syntax) and otherwise defaults to
//! `warn`, or `debug` when the CLI is run with `--verbose`.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "NAMEDSEM_LOG";

/// Install the global subscriber. Calling it twice is harmless.
pub fn init(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}
