//! Integration test infrastructure for Cadence.
//!
//! Provides in-memory fakes for every scheduler port, fixtures for
//! configuration and history, and a [`SchedulerContext`] that wires a full
//! producer together for end-to-end tests.

pub mod context;
pub mod fakes;
pub mod fixtures;
pub mod helpers;

pub use context::SchedulerContext;
pub use fakes::*;
pub use fixtures::*;
pub use helpers::*;

/// Initialize test logging (call once per test binary).
pub fn init_test_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,cadence_scheduler=debug")),
        )
        .with_test_writer()
        .try_init();
}
