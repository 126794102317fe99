//! Development-time tracing.
//!
//! # Separation of Concerns
//!
//! - **Tracing (this module)**: Diagnostics via `RUST_LOG`, output to stderr.
//!   Not persisted.
//!
//! - **Transcripts and reports (`io/transcript`, `io/report`)**: Product
//!   artifacts under the log directory. Always written, unaffected by
//!   `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "warn,redgreen=info";

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`, defaulting to `default_filter` (binaries in this crate
/// pass [`DEFAULT_FILTER`]).
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=redgreen=debug redgreen run --name add --file add.py --prompt "add two numbers"
/// ```
pub fn init(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
