//! Run configuration for runlock.
//!
//! `RunConfig` is what the rest of the crate sees; it is produced from the
//! parsed command line by `Cli::into_config`.

use std::ffi::OsString;
use std::path::PathBuf;

/// How long to keep retrying a busy lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPolicy {
    /// Give up on the first contended attempt.
    NoWait,
    /// Retry once per second until `max_wait_secs` seconds have elapsed.
    Bounded { max_wait_secs: u64 },
    /// Retry once per second until the lock is free.
    Unbounded,
}

impl WaitPolicy {
    /// Build a policy from `--wait=SECONDS` and `--wait-forever`.
    pub fn from_flags(wait: Option<u64>, forever: bool) -> Self {
        match (wait, forever) {
            (_, true) => WaitPolicy::Unbounded,
            (Some(max_wait_secs), false) => WaitPolicy::Bounded { max_wait_secs },
            (None, false) => WaitPolicy::NoWait,
        }
    }

    /// Whether another attempt is allowed after `elapsed_secs` of waiting.
    pub fn allows_retry(&self, elapsed_secs: u64) -> bool {
        match self {
            WaitPolicy::NoWait => false,
            WaitPolicy::Bounded { max_wait_secs } => elapsed_secs < *max_wait_secs,
            WaitPolicy::Unbounded => true,
        }
    }
}

/// Everything needed for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Path of the lock file.
    pub lock_path: PathBuf,

    /// Program and arguments to run once the lock is held. Never empty.
    pub command: Vec<OsString>,

    /// Retry behaviour when the lock is busy.
    pub wait: WaitPolicy,

    /// Exit 0 without a message when the lock is busy.
    pub quiet: bool,

    /// Emit debug diagnostics.
    pub verbose: bool,
}

impl RunConfig {
    /// The command line rendered for logs.
    pub fn command_line(&self) -> String {
        shell_words::join(self.command.iter().map(|arg| arg.to_string_lossy()))
    }
}
