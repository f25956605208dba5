//! Lock directory permission check.
//!
//! If anyone but the owner can write to the directory holding the lock file,
//! they can swap the file for a symlink between our checks and our unlink,
//! and have us remove or truncate a file of their choosing. Such
//! directories are refused outright.

use crate::error::{Result, RunlockError};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Group-write and other-write permission bits.
const SHARED_WRITE_BITS: u32 = 0o022;

/// The directory a lock path lives in. A bare file name lives in `.`.
pub fn lock_directory(lock_path: &Path) -> &Path {
    match lock_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Resolve the lock file's directory and make sure only its owner can write to it.
///
/// Returns the canonical directory on success.
pub fn check_lock_directory(lock_path: &Path) -> Result<PathBuf> {
    let dir = lock_directory(lock_path);
    let resolved = fs::canonicalize(dir).map_err(|e| {
        RunlockError::io(
            format!("failed to resolve lock directory '{}'", dir.display()),
            e,
        )
    })?;

    let metadata = fs::metadata(&resolved).map_err(|e| {
        RunlockError::io(
            format!("failed to stat lock directory '{}'", resolved.display()),
            e,
        )
    })?;

    if !metadata.is_dir() {
        return Err(RunlockError::io(
            format!("lock directory '{}'", resolved.display()),
            std::io::Error::new(std::io::ErrorKind::NotADirectory, "not a directory"),
        ));
    }

    let mode = metadata.permissions().mode() & 0o7777;
    if mode & SHARED_WRITE_BITS != 0 {
        return Err(RunlockError::UnsafeDirectory {
            path: resolved,
            mode,
        });
    }

    tracing::debug!(
        dir = %resolved.display(),
        mode = %format!("{mode:o}"),
        "lock directory is safe"
    );
    Ok(resolved)
}
