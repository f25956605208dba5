//! Locking subsystem for runlock.
//!
//! # Protocol
//!
//! 1. The lock file's directory is checked: it must not be writable by
//!    group or other (`safety`).
//! 2. The lock file is opened (created `0644` if absent, never truncated)
//!    and an exclusive non-blocking `flock(2)` is requested (`acquire`).
//! 3. A busy lock is retried once per second while the `WaitPolicy`
//!    allows it.
//! 4. Once locked, the path is re-checked to still name the locked file.
//! 5. The returned `LockHandle` unlinks the file when dropped.
//!
//! The file is never read or written for data; it is only a lock target.

mod acquire;
mod handle;
mod safety;


// Re-export public API
pub use acquire::{AcquireOutcome, acquire};
pub use handle::LockHandle;
pub use safety::check_lock_directory;
