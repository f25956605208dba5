//! Running the wrapped command.
//!
//! The child inherits stdin, stdout and stderr. While it runs, the wait
//! polls for termination signals so the lock can still be released if
//! runlock itself is told to stop.

use crate::error::{Result, RunlockError};
use crate::exit_codes;
use crate::signals::{CancelToken, Signal};
use std::ffi::OsString;
use std::io::{self, Write};
use std::os::unix::process::ExitStatusExt;
use std::process::{Child, Command, ExitStatus};
use std::time::Duration;

/// How often the child is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Runs a command to completion and reports its exit status.
pub trait CommandRunner {
    /// Run `argv` and return the status runlock should exit with.
    fn run(&mut self, argv: &[OsString], token: CancelToken) -> Result<i32>;
}

/// Runs commands as child processes.
#[derive(Debug, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&mut self, argv: &[OsString], token: CancelToken) -> Result<i32> {
        let (program, args) = argv.split_first().ok_or_else(|| RunlockError::Spawn {
            program: String::new(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "empty command"),
        })?;

        let mut child = Command::new(program)
            .args(args)
            .spawn()
            .map_err(|e| RunlockError::Spawn {
                program: program.to_string_lossy().into_owned(),
                source: e,
            })?;
        tracing::debug!(pid = child.id(), "command started");

        let result = wait_for_child(&mut child, token);

        let _ = io::stdout().flush();
        let _ = io::stderr().flush();

        if let Ok(code) = &result {
            tracing::debug!(code, "command finished");
        }
        result
    }
}

/// Wait for `child`, giving up early if a termination signal arrives.
///
/// A signal that lands between two polls still wins over the child's own
/// exit status.
fn wait_for_child(child: &mut Child, token: CancelToken) -> Result<i32> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                token.check()?;
                return Ok(status_code(status));
            }
            Ok(None) => {
                if let Some(signal) = token.pending() {
                    forward_signal(child, signal);
                    return Err(RunlockError::Interrupted(signal));
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                return Err(RunlockError::io("failed to check command status", e));
            }
        }
    }
}

/// Pass a termination signal on to the child.
///
/// SIGINT is not forwarded: a keyboard interrupt already reaches the whole
/// foreground process group.
fn forward_signal(child: &mut Child, signal: Signal) {
    if signal == Signal::Interrupt {
        return;
    }
    let Ok(pid) = libc::pid_t::try_from(child.id()) else {
        return;
    };
    // SAFETY: `pid` is our own unreaped child, so it cannot have been recycled.
    let rc = unsafe { libc::kill(pid, signal.signo()) };
    if rc != 0 {
        tracing::debug!(pid, error = %io::Error::last_os_error(), "failed to forward signal");
    }
    // Reap it if it is already gone; otherwise it is left to finish on its own.
    let _ = child.try_wait();
}

/// Exit status runlock reports for a finished child.
fn status_code(status: ExitStatus) -> i32 {
    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signo)) => exit_codes::from_signal(signo),
        (None, None) => exit_codes::LOCK_FAILURE,
    }
}
