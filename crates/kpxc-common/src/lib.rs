//! Shared types for kpxc: wire envelopes, protocol error codes, logging.
//!
//! This crate holds everything both sides of the browser protocol agree on,
//! so the client and test peers serialize the exact same JSON.

#![forbid(unsafe_code)]

pub mod encoding;
pub mod error;
pub mod protocol;

pub use error::{ErrorCode, ProtocolError};
pub use protocol::*;

/// Initialize tracing with a specific default level.
///
/// Log level is controlled by the `RUST_LOG` environment variable, falling
/// back to `default_level`. Output goes to stderr so that stdout stays
/// reserved for command output.
pub fn init_tracing_with_default(default_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
