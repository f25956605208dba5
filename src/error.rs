//! Error types for the runlock CLI.
//!
//! Uses thiserror for derive macros. Every variant maps to an exit code;
//! contention is not an error (see `locks::AcquireOutcome`).

use crate::exit_codes;
use crate::signals::Signal;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for runlock operations.
#[derive(Error, Debug)]
pub enum RunlockError {
    /// The directory holding the lock file is writable by group or other.
    /// `mode` holds the permission bits only.
    #[error(
        "refusing to lock in '{}': directory is writable by group or other (mode {mode:o})",
        .path.display()
    )]
    UnsafeDirectory { path: PathBuf, mode: u32 },

    /// The lock file disappeared (or was replaced) right after it was locked.
    #[error("lock file '{}' was removed or replaced while being locked", .path.display())]
    RaceIntegrity { path: PathBuf },

    /// Unexpected OS error while preparing or taking the lock.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// The command could not be started.
    #[error("failed to execute '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// A termination signal or keyboard interrupt arrived.
    #[error("{}", .0.message())]
    Interrupted(Signal),
}

impl RunlockError {
    /// Build an `Io` error with a human-readable context.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        RunlockError::Io {
            context: context.into(),
            source,
        }
    }

    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunlockError::UnsafeDirectory { .. } => exit_codes::UNSAFE_DIRECTORY,
            RunlockError::RaceIntegrity { .. } => exit_codes::LOCK_FAILURE,
            RunlockError::Io { .. } => exit_codes::LOCK_FAILURE,
            RunlockError::Spawn { source, .. } => match source.kind() {
                io::ErrorKind::NotFound => exit_codes::COMMAND_NOT_FOUND,
                _ => exit_codes::COMMAND_NOT_EXECUTABLE,
            },
            RunlockError::Interrupted(signal) => exit_codes::from_signal(signal.signo()),
        }
    }
}

/// Result type alias for runlock operations.
pub type Result<T> = std::result::Result<T, RunlockError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsafe_directory_has_correct_exit_code() {
        let err = RunlockError::UnsafeDirectory {
            path: PathBuf::from("/tmp"),
            mode: 0o1777,
        };
        assert_eq!(err.exit_code(), exit_codes::UNSAFE_DIRECTORY);
        assert_eq!(
            err.to_string(),
            "refusing to lock in '/tmp': directory is writable by group or other (mode 1777)"
        );
    }

    #[test]
    fn race_integrity_is_a_lock_failure() {
        let err = RunlockError::RaceIntegrity {
            path: PathBuf::from("/var/lock/job.lock"),
        };
        assert_eq!(err.exit_code(), exit_codes::LOCK_FAILURE);
        assert!(err.to_string().contains("/var/lock/job.lock"));
    }

    #[test]
    fn io_error_includes_context() {
        let err = RunlockError::io(
            "failed to open lock file 'x'",
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert_eq!(err.exit_code(), exit_codes::LOCK_FAILURE);
        assert!(err.to_string().starts_with("failed to open lock file 'x': "));
    }

    #[test]
    fn spawn_error_uses_shell_exit_codes() {
        let missing = RunlockError::Spawn {
            program: "nope".to_string(),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert_eq!(missing.exit_code(), exit_codes::COMMAND_NOT_FOUND);

        let denied = RunlockError::Spawn {
            program: "/etc/passwd".to_string(),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        assert_eq!(denied.exit_code(), exit_codes::COMMAND_NOT_EXECUTABLE);
    }

    #[test]
    fn interruption_messages_distinguish_keyboard_from_kill() {
        let err = RunlockError::Interrupted(Signal::Interrupt);
        assert_eq!(err.to_string(), "interrupted!");
        assert_eq!(err.exit_code(), 130);

        let err = RunlockError::Interrupted(Signal::Terminate);
        assert_eq!(err.to_string(), "killed!");
        assert_eq!(err.exit_code(), 143);

        let err = RunlockError::Interrupted(Signal::Hangup);
        assert_eq!(err.to_string(), "killed!");
        assert_eq!(err.exit_code(), 129);
    }
}
