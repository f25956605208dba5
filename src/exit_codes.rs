//! Exit code constants for the runlock CLI.
//!
//! Codes owned by runlock itself:
//! - 0: Success, or the lock was busy and `--quiet` was given
//! - 1: Lock not acquired (busy)
//! - 2: Usage error (reported by clap)
//! - 3: Unsafe lock directory
//! - 4: Lock I/O or integrity failure
//!
//! Anything else is the wrapped command's own status.

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// The lock is held by another process and `--quiet` was not given.
pub const LOCK_BUSY: i32 = 1;

/// Bad arguments. clap exits with this code on its own.
#[allow(dead_code)]
pub const USAGE_ERROR: i32 = 2;

/// The lock file's directory is writable by group or other.
pub const UNSAFE_DIRECTORY: i32 = 3;

/// Unexpected I/O error while locking, or the lock file vanished under us.
pub const LOCK_FAILURE: i32 = 4;

/// The command exists but could not be executed.
pub const COMMAND_NOT_EXECUTABLE: i32 = 126;

/// The command could not be found.
pub const COMMAND_NOT_FOUND: i32 = 127;

/// Base added to a signal number when a signal ends the run.
pub const SIGNAL_BASE: i32 = 128;

/// Exit status for a run ended by signal `signo`.
pub fn from_signal(signo: i32) -> i32 {
    SIGNAL_BASE + signo
}
