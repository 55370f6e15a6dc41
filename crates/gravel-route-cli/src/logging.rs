//! Logging initialization for the command-line front end.
//!
//! Logs go to stderr so command output on stdout stays pipeable. `RUST_LOG` always wins;
//! otherwise the level defaults to INFO, or DEBUG with `--verbose`.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Default directives when `RUST_LOG` is not set
pub fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

pub fn setup_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter);
    tracing_subscriber::registry().with(fmt_layer).init();

    #[cfg(feature = "profiling")]
    tracing::debug!("Profiling scopes are emitted as tracing spans");
}
