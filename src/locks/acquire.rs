//! Lock acquisition and the wait/retry policy.
//!
//! One attempt opens (creating if needed) the lock file and asks the kernel
//! for an exclusive `flock(2)` without blocking. A busy lock is retried
//! once per second for as long as the `WaitPolicy` allows. The retry loop is
//! an explicit state machine over a [`Pause`], so it can be driven by a fake
//! clock in tests.

use super::handle::LockHandle;
use crate::config::WaitPolicy;
use crate::error::{Result, RunlockError};
use crate::signals::CancelToken;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::{MetadataExt, OpenOptionsExt};
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::time::Duration;

/// Time between attempts on a busy lock.
pub const RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// How often a pause checks for a pending signal.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Mode for a newly created lock file.
const LOCK_FILE_MODE: u32 = 0o644;

/// Bits forced into the umask while the lock file may be created.
const CREATE_UMASK: libc::mode_t = 0o022;

/// Result of a single lock attempt.
#[derive(Debug)]
pub enum Attempt<T> {
    /// The lock is ours.
    Acquired(T),
    /// Someone else holds it.
    Contended,
}

/// Final result of acquisition under a wait policy.
#[derive(Debug)]
pub enum AcquireOutcome<T> {
    /// The lock is held.
    Acquired(T),
    /// The lock stayed busy for as long as the policy allowed.
    Denied { waited_secs: u64 },
}

/// Suspension between attempts.
pub trait Pause {
    /// Wait for `duration`, or fail early if the run is being interrupted.
    fn pause(&mut self, duration: Duration) -> Result<()>;
}

/// Real sleep that wakes early on a termination signal.
#[derive(Debug)]
pub struct SignalAwareSleep {
    token: CancelToken,
}

impl SignalAwareSleep {
    pub fn new(token: CancelToken) -> Self {
        Self { token }
    }
}

impl Pause for SignalAwareSleep {
    fn pause(&mut self, duration: Duration) -> Result<()> {
        let mut remaining = duration;
        while !remaining.is_zero() {
            self.token.check()?;
            let step = remaining.min(POLL_INTERVAL);
            std::thread::sleep(step);
            remaining -= step;
        }
        self.token.check()
    }
}

#[derive(Debug)]
enum AcquireState<T> {
    Attempting,
    Waiting,
    Locked(T),
    Denied,
}

/// Drive `attempt` until it succeeds or `policy` gives up.
///
/// Elapsed time is counted in whole retry intervals, not wall time.
pub fn acquire_with<T, F, P>(
    policy: WaitPolicy,
    mut attempt: F,
    pause: &mut P,
) -> Result<AcquireOutcome<T>>
where
    F: FnMut() -> Result<Attempt<T>>,
    P: Pause,
{
    let mut waited_secs = 0u64;
    let mut state = AcquireState::Attempting;

    loop {
        state = match state {
            AcquireState::Attempting => match attempt()? {
                Attempt::Acquired(held) => AcquireState::Locked(held),
                Attempt::Contended if policy.allows_retry(waited_secs) => AcquireState::Waiting,
                Attempt::Contended => AcquireState::Denied,
            },
            AcquireState::Waiting => {
                tracing::debug!(waited_secs, "lock busy, retrying");
                pause.pause(RETRY_INTERVAL)?;
                waited_secs += RETRY_INTERVAL.as_secs();
                AcquireState::Attempting
            }
            AcquireState::Locked(held) => return Ok(AcquireOutcome::Acquired(held)),
            AcquireState::Denied => return Ok(AcquireOutcome::Denied { waited_secs }),
        };
    }
}

/// Acquire the lock at `lock_path` under `policy`, sleeping for real between attempts.
pub fn acquire(
    lock_path: &Path,
    policy: WaitPolicy,
    token: CancelToken,
) -> Result<AcquireOutcome<LockHandle>> {
    let mut sleep = SignalAwareSleep::new(token);
    acquire_with(policy, || try_acquire(lock_path), &mut sleep)
}

/// Make one attempt at the lock.
///
/// A busy lock closes the descriptor again and leaves the file alone; it
/// belongs to whoever holds it.
pub fn try_acquire(lock_path: &Path) -> Result<Attempt<LockHandle>> {
    let file = open_lock_file(lock_path)?;

    match try_lock_exclusive(&file) {
        Ok(true) => {}
        Ok(false) => return Ok(Attempt::Contended),
        Err(e) => {
            return Err(RunlockError::io(
                format!("failed to lock '{}'", lock_path.display()),
                e,
            ));
        }
    }

    verify_still_linked(&file, lock_path)?;
    tracing::debug!(path = %lock_path.display(), "lock acquired");
    Ok(Attempt::Acquired(LockHandle::new(lock_path.to_path_buf(), file)))
}

/// Open the lock file for writing, creating it owner-writable only.
///
/// Never truncates: the file may belong to a holder in another process.
fn open_lock_file(lock_path: &Path) -> Result<File> {
    let _umask = UmaskGuard::tighten(CREATE_UMASK);
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .mode(LOCK_FILE_MODE)
        .open(lock_path)
        .map_err(|e| {
            RunlockError::io(
                format!("failed to open lock file '{}'", lock_path.display()),
                e,
            )
        })
}

/// Try to take an exclusive advisory lock without blocking.
///
/// Returns `Ok(false)` when another process holds it.
fn try_lock_exclusive(file: &File) -> io::Result<bool> {
    // SAFETY: `fd` comes from a live `File` borrowed for the whole call, and
    // `LOCK_EX | LOCK_NB` is a valid `flock` operation.
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    if is_contention(&err) {
        return Ok(false);
    }
    Err(err)
}

/// Errors meaning "someone else holds the lock". Everything else is fatal.
pub(crate) fn is_contention(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(code) if code == libc::EWOULDBLOCK
            || code == libc::EAGAIN
            || code == libc::EACCES
            || code == libc::EBUSY
    )
}

/// Check that the path still names the file we locked.
///
/// A previous holder may have unlinked it between our open and our lock;
/// holding a lock on an orphaned inode protects nothing.
fn verify_still_linked(file: &File, lock_path: &Path) -> Result<()> {
    let held = file.metadata().map_err(|e| {
        RunlockError::io(
            format!("failed to stat locked file '{}'", lock_path.display()),
            e,
        )
    })?;

    match std::fs::metadata(lock_path) {
        Ok(current) if current.dev() == held.dev() && current.ino() == held.ino() => Ok(()),
        Ok(_) => Err(RunlockError::RaceIntegrity {
            path: lock_path.to_path_buf(),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(RunlockError::RaceIntegrity {
            path: lock_path.to_path_buf(),
        }),
        Err(e) => Err(RunlockError::io(
            format!("failed to stat lock file '{}'", lock_path.display()),
            e,
        )),
    }
}

/// Narrows the process umask until dropped.
struct UmaskGuard {
    previous: libc::mode_t,
}

impl UmaskGuard {
    /// Add `bits` to the current umask. Never loosens it.
    fn tighten(bits: libc::mode_t) -> Self {
        // SAFETY: `umask` cannot fail. Reading it requires setting it, so the
        // first call is immediately followed by the real value.
        let previous = unsafe { libc::umask(bits) };
        unsafe { libc::umask(previous | bits) };
        Self { previous }
    }
}

impl Drop for UmaskGuard {
    fn drop(&mut self) {
        // SAFETY: see `tighten`.
        unsafe { libc::umask(self.previous) };
    }
}
