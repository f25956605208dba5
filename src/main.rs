//! Runlock: run a command under a self-cleaning advisory file lock.
//!
//! This is the main entry point for the `runlock` CLI. It parses arguments,
//! installs signal handlers, runs the command under the lock, and turns
//! errors into exit codes.

mod cli;
pub mod config;
pub mod error;
pub mod exit_codes;
pub mod locks;
mod logging;
pub mod orchestrator;
pub mod runner;
pub mod signals;

#[cfg(test)]
mod test_support;

use cli::Cli;
use config::RunConfig;
use error::Result;
use runner::ProcessRunner;
use std::process::ExitCode;

fn main() -> ExitCode {
    let config = Cli::parse_args().into_config();
    logging::init(config.verbose);

    // Everything that owns the lock is dropped inside `execute`, before we
    // hand the status back to the OS.
    let code = match execute(&config) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("runlock: {}", err);
            err.exit_code()
        }
    };

    ExitCode::from(u8::try_from(code).unwrap_or(u8::MAX))
}

fn execute(config: &RunConfig) -> Result<i32> {
    let token = signals::install()?;
    orchestrator::run(config, token, &mut ProcessRunner)
}
