//! Diagnostic logging for the CLI.
//!
//! Patch status lines go to stdout; tracing output goes to stderr so it never
//! mixes with them.

use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set. Otherwise only warnings are shown, or
/// everything down to `debug` with `verbose`.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "text_patcher=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // try_init: a second call (tests, embedding) keeps the first subscriber
    let _ = fmt::Subscriber::builder()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(verbose)
        .without_time()
        .try_init();
}
