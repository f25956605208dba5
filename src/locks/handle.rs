//! The held lock.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// An acquired lock: the open lock file carrying the exclusive advisory lock.
///
/// The file itself stays empty; it is only ever a lock target.
///
/// Only successful acquisition produces one, so owning a `LockHandle` is
/// the proof that this process may remove the lock file. When dropped, the
/// file is unlinked while the lock is still held, then the descriptor is
/// closed, which releases the lock. Removal errors are ignored: the kernel
/// drops the lock at exit no matter what.
#[derive(Debug)]
pub struct LockHandle {
    /// Path to the lock file.
    path: PathBuf,

    /// Open descriptor holding the lock. Closed after the unlink in `drop`.
    _file: File,
}

impl LockHandle {
    pub(super) fn new(path: PathBuf, file: File) -> Self {
        Self { path, _file: file }
    }

    /// Get the path to the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "lock released"),
            Err(e) => tracing::debug!(
                path = %self.path.display(),
                error = %e,
                "lock file already gone at release"
            ),
        }
    }
}
