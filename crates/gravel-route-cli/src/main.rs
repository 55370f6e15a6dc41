//! Gravel Route - command-line front end
//!
//! Drives the route measurement engine from the terminal: inspect route files, convert
//! between GPX and GeoJSON, and manage the local route library.

mod commands;
mod logging;
mod settings;

use settings::Settings;
use std::process::ExitCode;

fn main() -> ExitCode {
    let settings = Settings::from_cli();
    logging::setup_logging(settings.verbose);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match commands::run(&settings, &mut out) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
