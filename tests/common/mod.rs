//! Shared test utilities.
//!
//! Call [`init_tracing`] at the top of a test to get log output when the
//! crate is built with `--features tracing`:
//!
//! ```bash
//! RUST_LOG=snaptree=trace cargo test --features tracing stress -- --nocapture
//! ```

#![allow(dead_code)]

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install a console tracing subscriber once per test binary.
///
/// Safe to call from every test; only the first call takes effect. The
/// filter comes from `RUST_LOG`, defaulting to warnings.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
