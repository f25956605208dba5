//! CLI argument parsing for runlock.
//!
//! Uses clap derive macros for declarative argument definitions. The parsed
//! `Cli` is turned into a `RunConfig` before anything else looks at it.

use crate::config::{RunConfig, WaitPolicy};
use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;

/// Runlock: run a command unless another instance of it is already running.
///
/// The lock is an advisory lock on LOCKPATH held for the lifetime of this
/// process. It disappears when runlock exits, however it exits, so there is
/// never a stale lock to clean up.
///
/// Exit status is the command's own status, or: 1 lock busy,
/// 3 unsafe lock directory, 4 locking failure.
#[derive(Parser, Debug)]
#[command(name = "runlock")]
#[command(author, version, about, long_about)]
pub struct Cli {
    /// Wait up to SECONDS for a busy lock instead of giving up immediately.
    #[arg(long, value_name = "SECONDS", require_equals = true)]
    pub wait: Option<u64>,

    /// Wait for a busy lock for as long as it takes.
    #[arg(long, conflicts_with = "wait")]
    pub wait_forever: bool,

    /// If the lock is busy, exit 0 without printing anything.
    #[arg(short, long)]
    pub quiet: bool,

    /// Print diagnostics to stderr.
    #[arg(short, long)]
    pub verbose: bool,

    /// Path of the lock file. Its directory must not be group/other-writable.
    #[arg(value_name = "LOCKPATH")]
    pub lock_path: PathBuf,

    /// Command to run while holding the lock, with its arguments.
    #[arg(
        value_name = "COMMAND",
        required = true,
        num_args = 1..,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command: Vec<OsString>,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Convert the parsed arguments into a run configuration.
    pub fn into_config(self) -> RunConfig {
        RunConfig {
            lock_path: self.lock_path,
            command: self.command,
            wait: WaitPolicy::from_flags(self.wait, self.wait_forever),
            quiet: self.quiet,
            verbose: self.verbose,
        }
    }
}
