//! GitNexus MCP gateway daemon.
//!
//! Sits between an AI agent (MCP JSON-RPC on stdio) and the browser-hosted
//! code-intelligence engine (WebSocket on a shared localhost port). Exposes a
//! fixed catalogue of 15 read-only analysis tools, validates and firewalls
//! every call, shields the backend with timeouts and a circuit breaker, and
//! multiplexes co-resident daemons through a hub/peer election so several
//! agents can share one browser session.

#![forbid(unsafe_code)]

pub mod bridge;
pub mod firewall;
pub mod handlers;
pub mod logging;
pub mod protocol;
pub mod server;
pub mod tools;
pub mod validation;

pub use bridge::{Bridge, BridgeMode};
pub use handlers::Handlers;
pub use server::McpServer;
