use crate::signals::CancelToken;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::atomic::AtomicI32;
use tempfile::TempDir;

/// Flag that no signal handler ever writes to.
static NEVER_SIGNALLED: AtomicI32 = AtomicI32::new(0);

/// A cancel token that never fires.
pub(crate) fn quiet_token() -> CancelToken {
    CancelToken::from_flag(&NEVER_SIGNALLED)
}

/// Create `name` under `temp` with exactly `mode`, regardless of umask.
pub(crate) fn dir_with_mode(temp: &TempDir, name: &str, mode: u32) -> PathBuf {
    let dir = temp.path().join(name);
    fs::create_dir(&dir).unwrap();
    fs::set_permissions(&dir, fs::Permissions::from_mode(mode)).unwrap();
    dir
}

/// A temporary directory that passes the lock directory check.
pub(crate) fn safe_lock_dir() -> (TempDir, PathBuf) {
    let temp = TempDir::new().unwrap();
    let dir = dir_with_mode(&temp, "locks", 0o700);
    (temp, dir)
}

/// Read the process umask. Callers must be `#[serial]`.
pub(crate) fn current_umask() -> libc::mode_t {
    // SAFETY: `umask` cannot fail; the original value is put straight back.
    unsafe {
        let mask = libc::umask(0o022);
        libc::umask(mask);
        mask
    }
}
