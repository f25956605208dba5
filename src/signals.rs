//! Termination signal handling.
//!
//! SIGHUP, SIGTERM and SIGINT are caught by a handler that only records the
//! signal number in an atomic. Code that suspends (the retry sleep, the wait
//! on the child) polls a [`CancelToken`] and unwinds with
//! [`RunlockError::Interrupted`], so the lock guard is dropped and the lock
//! file removed on the way out.

use crate::error::{Result, RunlockError};
use std::io;
use std::sync::atomic::{AtomicI32, Ordering};

/// Signal number of the most recent termination signal, or 0.
static PENDING: AtomicI32 = AtomicI32::new(0);

/// Signals that end a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// SIGHUP: controlling terminal went away.
    Hangup,
    /// SIGTERM: polite kill.
    Terminate,
    /// SIGINT: keyboard interrupt.
    Interrupt,
}

impl Signal {
    const ALL: [Signal; 3] = [Signal::Hangup, Signal::Terminate, Signal::Interrupt];

    /// The raw signal number.
    pub fn signo(self) -> i32 {
        match self {
            Signal::Hangup => libc::SIGHUP,
            Signal::Terminate => libc::SIGTERM,
            Signal::Interrupt => libc::SIGINT,
        }
    }

    /// Map a raw signal number back to a handled signal.
    pub fn from_signo(signo: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.signo() == signo)
    }

    /// The message printed when this signal ends the run.
    pub fn message(self) -> &'static str {
        match self {
            Signal::Interrupt => "interrupted!",
            Signal::Hangup | Signal::Terminate => "killed!",
        }
    }
}

extern "C" fn record_signal(signo: libc::c_int) {
    PENDING.store(signo, Ordering::SeqCst);
}

/// Install the handlers and return a token observing them.
pub fn install() -> Result<CancelToken> {
    for signal in Signal::ALL {
        // SAFETY: `sigaction` is zero-initialisable plain data. The handler
        // only performs an atomic store, which is async-signal-safe.
        let rc = unsafe {
            let mut action: libc::sigaction = std::mem::zeroed();
            action.sa_sigaction = record_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
            action.sa_flags = libc::SA_RESTART;
            libc::sigemptyset(&mut action.sa_mask);
            libc::sigaction(signal.signo(), &action, std::ptr::null_mut())
        };
        if rc != 0 {
            return Err(RunlockError::io(
                format!("failed to install handler for signal {}", signal.signo()),
                io::Error::last_os_error(),
            ));
        }
    }
    tracing::debug!("signal handlers installed");
    Ok(CancelToken::from_flag(&PENDING))
}

/// Cheap, copyable view of the pending-signal flag.
#[derive(Debug, Clone, Copy)]
pub struct CancelToken {
    flag: &'static AtomicI32,
}

impl CancelToken {
    pub(crate) fn from_flag(flag: &'static AtomicI32) -> Self {
        Self { flag }
    }

    /// The signal received so far, if any.
    pub fn pending(&self) -> Option<Signal> {
        Signal::from_signo(self.flag.load(Ordering::SeqCst))
    }

    /// Fail with `Interrupted` if a signal has arrived.
    pub fn check(&self) -> Result<()> {
        match self.pending() {
            Some(signal) => Err(RunlockError::Interrupted(signal)),
            None => Ok(()),
        }
    }
}
