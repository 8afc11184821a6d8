//! Shared pieces for Solocast: wire protocol, logging, error types.
//!
//! Used by the gateway binary and by anything that speaks to it.

#![forbid(unsafe_code)]

pub mod error;
pub mod protocol;

pub use error::{Error, Result};
pub use protocol::*;

/// Initialize tracing.
///
/// Log level is controlled by the `RUST_LOG` environment variable, falling
/// back to `default_level` when it is unset or unparsable.
pub fn init_tracing_with_default(default_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
