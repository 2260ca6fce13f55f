//! Structured logging setup.
//!
//! Stdout belongs to the MCP protocol, so every log line goes to stderr as
//! newline-delimited JSON. The level comes from `LOG_LEVEL` (default `info`).

use std::io;

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber. Call once, before anything logs.
pub fn init() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .json()
        .with_writer(io::stderr) // stdout is reserved for JSON-RPC
        .with_env_filter(filter)
        .with_current_span(true)
        .with_span_list(false)
        .with_target(false)
        .init();
}
