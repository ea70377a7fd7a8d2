//! Tracing initialisation helpers for tests.
//!
//! Call [`init_test_tracing`] at the top of any test that wants its log
//! output captured by the test harness. Lines use the legacy plain-text
//! format so captured output stays free of escape codes.
//!
//! The subscriber is initialised at most once per process (idempotent), so it
//! is safe to call from every test function.

use overlayctl_core::logging::LegacyFormat;
use tracing_subscriber::EnvFilter;

/// Initialise a tracing subscriber that writes to the test-harness writer
/// and respects the `RUST_LOG` environment variable (default `debug`).
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_ansi(false)
        .event_format(LegacyFormat::new())
        .with_test_writer()
        .try_init();
}
