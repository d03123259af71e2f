//! Tracing initialization.
//!
//! Logs are written to stderr so the stdio MCP transport keeps stdout for
//! protocol messages. Filtering follows `RUST_LOG`, for example:
//!
//! - `RUST_LOG=debug` - debug logging for all modules
//! - `RUST_LOG=imagegen_mcp_server=debug` - debug for the server crate only
//! - `RUST_LOG=warn,imagegen_mcp_common=debug` - warn by default, debug for common
//!
//! # Usage
//!
//! ```no_run
//! use imagegen_mcp_common::tracing::init_tracing;
//!
//! init_tracing();
//! tracing::info!("Server starting");
//! ```

use tracing::Subscriber;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    prelude::*,
    registry::LookupSpan,
    util::TryInitError,
};

/// Level used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// `RUST_LOG` filter, or `default_level` when unset or unparseable.
pub fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Console layer shared by every initializer.
pub fn fmt_layer<S>() -> impl Layer<S> + Send + Sync
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NONE)
}

/// Initialize the tracing subscriber with environment-based filtering.
///
/// Does nothing if a global subscriber is already installed.
pub fn init_tracing() {
    init_tracing_with_default(DEFAULT_LOG_LEVEL);
}

/// Initialize tracing with a custom default level.
///
/// Does nothing if a global subscriber is already installed.
pub fn init_tracing_with_default(default_level: &str) {
    let _ = try_init_tracing(default_level);
}

/// Try to initialize tracing, returning an error if already initialized.
///
/// # Example
///
/// ```
/// use imagegen_mcp_common::tracing::try_init_tracing;
///
/// // Ok on the first call in a process, Err afterwards
/// let _ = try_init_tracing("debug");
/// assert!(try_init_tracing("debug").is_err());
/// ```
pub fn try_init_tracing(default_level: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(fmt_layer())
        .try_init()
}
