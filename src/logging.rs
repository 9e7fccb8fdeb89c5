//! Logging setup.
//!
//! Logs go to **stderr**; stdout carries only the handshake line. `RUST_LOG`
//! overrides the default filter, for example
//! `RUST_LOG=hetzner_provider::dns=debug`.
//!
//! Each API call runs inside a span named after the service operation, so a
//! debug log of one record create reads roughly as:
//!
//! ```text
//! DEBUG create{record_type=Some("TXT") name=Some("@")}: hetzner_provider::dns::client: request completed action="create record" status=200
//! ```
//!
//! The API token is never part of a span or event field.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter used without `RUST_LOG` and without `--debug`.
pub const DEFAULT_FILTER: &str = "info";

/// Filter used without `RUST_LOG` when debug output was requested.
pub const DEBUG_FILTER: &str = "debug";

/// `RUST_LOG` when set and valid, the built-in default otherwise.
fn filter(debug: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { DEBUG_FILTER } else { DEFAULT_FILTER }))
}

/// Install the global subscriber.
///
/// Events are written to stderr with their target. With `debug` the source
/// file and line are added as well.
///
/// Returns `false` if a subscriber was already installed, which happens when
/// the provider is embedded in a process that set up its own.
///
/// ```
/// hetzner_provider::init_logging(false);
/// assert!(!hetzner_provider::init_logging(true));
/// ```
pub fn init_logging(debug: bool) -> bool {
    tracing_subscriber::registry()
        .with(filter(debug))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(debug)
                .with_line_number(debug),
        )
        .try_init()
        .is_ok()
}
