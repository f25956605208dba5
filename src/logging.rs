//! Diagnostic logging setup.
//!
//! Everything goes to stderr so the wrapped command keeps stdout to itself.
//! `RUST_LOG` wins when set; otherwise `--verbose` selects debug, and the
//! default only shows warnings.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Default filter directive for the given verbosity.
fn default_directive(verbose: bool) -> &'static str {
    if verbose { "runlock=debug" } else { "warn" }
}

/// Install the global subscriber. Calling it twice is harmless.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .try_init();
}
