//! Opt-in tracing subscriber for hosts and tests
//!
//! The library only emits `tracing` events; nothing is printed until the
//! host installs a subscriber, either its own or the one below. The filter is
//! always passed in; a host that wants `RUST_LOG` reads it and hands it over.

use tracing_subscriber::EnvFilter;

/// Install a formatted subscriber with the given filter directives
/// (e.g. `"wavestudio=info"`)
///
/// Unparseable directives fall back to `"info"`. Returns `false` if a global
/// subscriber was already installed.
pub fn init_logging(filter: &str) -> bool {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

/// Subscriber for test binaries at `warn`: output goes through the test
/// writer so it is captured per test
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("warn"))
        .with_test_writer()
        .try_init();
}
