//! Top-level run: check the directory, take the lock, run the command.
//!
//! Every way out of [`run`] after the lock is taken drops the `LockHandle`,
//! which removes the lock file. A denied run never owns a handle and so
//! never touches the file.

use crate::config::RunConfig;
use crate::error::Result;
use crate::exit_codes;
use crate::locks::{self, AcquireOutcome, LockHandle};
use crate::runner::CommandRunner;
use crate::signals::CancelToken;

/// Run `config.command` under the lock and return the exit status to report.
pub fn run<R: CommandRunner>(
    config: &RunConfig,
    token: CancelToken,
    runner: &mut R,
) -> Result<i32> {
    locks::check_lock_directory(&config.lock_path)?;
    token.check()?;

    let handle: LockHandle = match locks::acquire(&config.lock_path, config.wait, token)? {
        AcquireOutcome::Acquired(handle) => handle,
        AcquireOutcome::Denied { waited_secs } => return Ok(deny(config, waited_secs)),
    };
    tracing::debug!(path = %handle.path().display(), "lock held");
    token.check()?;

    tracing::debug!(command = %config.command_line(), "running command");
    let code = runner.run(&config.command, token)?;
    // A signal that arrived as the command finished still ends the run.
    token.check()?;

    drop(handle);
    Ok(code)
}

/// Resolve a busy lock into an exit status, reporting it unless quiet.
fn deny(config: &RunConfig, waited_secs: u64) -> i32 {
    if config.quiet {
        tracing::debug!(waited_secs, "lock busy, exiting quietly");
        return exit_codes::SUCCESS;
    }

    let waited = if waited_secs > 0 {
        format!(" after waiting {}s", waited_secs)
    } else {
        String::new()
    };
    eprintln!(
        "runlock: lock '{}' is held by another process{}",
        config.lock_path.display(),
        waited
    );
    exit_codes::LOCK_BUSY
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WaitPolicy;
    use crate::error::RunlockError;
    use crate::signals::Signal;
    use crate::test_support::{dir_with_mode, quiet_token, safe_lock_dir};
    use serial_test::serial;
    use std::ffi::OsString;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicI32, Ordering};
    use tempfile::TempDir;

    /// Runner that records what the lock file looked like while it ran.
    struct FakeRunner {
        lock_path: PathBuf,
        result: Option<Result<i32>>,
        calls: usize,
        saw_lock_file: bool,
        saw_lock_len: Option<u64>,
        /// Signal to raise on this flag just before the command "exits".
        raise: Option<(&'static AtomicI32, i32)>,
    }

    impl FakeRunner {
        fn returning(lock_path: &Path, result: Result<i32>) -> Self {
            Self {
                lock_path: lock_path.to_path_buf(),
                result: Some(result),
                calls: 0,
                saw_lock_file: false,
                saw_lock_len: None,
                raise: None,
            }
        }
    }

    impl CommandRunner for FakeRunner {
        fn run(&mut self, _argv: &[OsString], _token: CancelToken) -> Result<i32> {
            self.calls += 1;
            self.saw_lock_file = self.lock_path.exists();
            self.saw_lock_len = std::fs::metadata(&self.lock_path).ok().map(|m| m.len());
            if let Some((flag, signo)) = self.raise {
                flag.store(signo, Ordering::SeqCst);
            }
            self.result.take().unwrap_or(Ok(0))
        }
    }

    fn config(lock_path: &Path, quiet: bool) -> RunConfig {
        RunConfig {
            lock_path: lock_path.to_path_buf(),
            command: vec!["backup".into(), "--all".into()],
            wait: WaitPolicy::NoWait,
            quiet,
            verbose: false,
        }
    }

    fn hold(path: &Path) -> LockHandle {
        match locks::acquire(path, WaitPolicy::NoWait, quiet_token()).unwrap() {
            AcquireOutcome::Acquired(handle) => handle,
            AcquireOutcome::Denied { .. } => panic!("lock unexpectedly busy"),
        }
    }

    #[test]
    #[serial]
    fn runs_command_while_holding_lock_then_cleans_up() {
        let (_temp, dir) = safe_lock_dir();
        let path = dir.join("job.lock");
        let mut runner = FakeRunner::returning(&path, Ok(0));

        let code = run(&config(&path, false), quiet_token(), &mut runner).unwrap();

        assert_eq!(code, 0);
        assert_eq!(runner.calls, 1);
        assert!(runner.saw_lock_file);
        assert_eq!(runner.saw_lock_len, Some(0), "lock file carries no data");
        assert!(!path.exists());
    }

    #[test]
    #[serial]
    fn command_exit_code_passes_through_after_cleanup() {
        let (_temp, dir) = safe_lock_dir();
        let path = dir.join("job.lock");
        let mut runner = FakeRunner::returning(&path, Ok(42));

        let code = run(&config(&path, false), quiet_token(), &mut runner).unwrap();

        assert_eq!(code, 42);
        assert!(!path.exists());
    }

    #[test]
    #[serial]
    fn busy_lock_is_denied_without_running() {
        let (_temp, dir) = safe_lock_dir();
        let path = dir.join("job.lock");
        let _held = hold(&path);
        let mut runner = FakeRunner::returning(&path, Ok(0));

        let code = run(&config(&path, false), quiet_token(), &mut runner).unwrap();

        assert_eq!(code, exit_codes::LOCK_BUSY);
        assert_eq!(runner.calls, 0);
        assert!(path.exists(), "denied run must not remove the holder's file");
    }

    #[test]
    #[serial]
    fn busy_lock_in_quiet_mode_exits_zero() {
        let (_temp, dir) = safe_lock_dir();
        let path = dir.join("job.lock");
        let _held = hold(&path);
        let mut runner = FakeRunner::returning(&path, Ok(0));

        let code = run(&config(&path, true), quiet_token(), &mut runner).unwrap();

        assert_eq!(code, exit_codes::SUCCESS);
        assert_eq!(runner.calls, 0);
        assert!(path.exists());
    }

    #[test]
    #[serial]
    fn unsafe_directory_is_refused_before_creating_lock() {
        let temp = TempDir::new().unwrap();
        let dir = dir_with_mode(&temp, "shared", 0o777);
        let path = dir.join("job.lock");
        let mut runner = FakeRunner::returning(&path, Ok(0));

        let err = run(&config(&path, true), quiet_token(), &mut runner).unwrap_err();

        assert!(matches!(err, RunlockError::UnsafeDirectory { .. }));
        assert_eq!(err.exit_code(), exit_codes::UNSAFE_DIRECTORY);
        assert_eq!(runner.calls, 0);
        assert!(!path.exists());
    }

    #[test]
    #[serial]
    fn interrupted_command_still_removes_lock() {
        let (_temp, dir) = safe_lock_dir();
        let path = dir.join("job.lock");
        let mut runner =
            FakeRunner::returning(&path, Err(RunlockError::Interrupted(Signal::Terminate)));

        let err = run(&config(&path, false), quiet_token(), &mut runner).unwrap_err();

        assert_eq!(err.to_string(), "killed!");
        assert!(runner.saw_lock_file);
        assert!(!path.exists());
    }

    #[test]
    #[serial]
    fn signal_as_command_finishes_still_interrupts() {
        static FLAG: AtomicI32 = AtomicI32::new(0);

        let (_temp, dir) = safe_lock_dir();
        let path = dir.join("job.lock");
        let mut runner = FakeRunner::returning(&path, Ok(0));
        runner.raise = Some((&FLAG, libc::SIGTERM));

        let err = run(
            &config(&path, false),
            CancelToken::from_flag(&FLAG),
            &mut runner,
        )
        .unwrap_err();

        assert_eq!(err.to_string(), "killed!");
        assert_eq!(err.exit_code(), 128 + libc::SIGTERM);
        assert_eq!(runner.calls, 1);
        assert!(!path.exists());
    }

    #[test]
    #[serial]
    fn pending_signal_stops_before_locking() {
        static FLAG: AtomicI32 = AtomicI32::new(0);
        FLAG.store(libc::SIGINT, Ordering::SeqCst);

        let (_temp, dir) = safe_lock_dir();
        let path = dir.join("job.lock");
        let mut runner = FakeRunner::returning(&path, Ok(0));

        let err = run(
            &config(&path, false),
            CancelToken::from_flag(&FLAG),
            &mut runner,
        )
        .unwrap_err();

        assert_eq!(err.to_string(), "interrupted!");
        assert_eq!(runner.calls, 0);
        assert!(!path.exists());
    }
}
