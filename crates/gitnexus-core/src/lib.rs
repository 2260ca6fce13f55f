//! Shared leaf types for the GitNexus MCP gateway.
//!
//! This crate holds everything both the daemon and its tests need without
//! touching I/O: configuration, the typed gateway error model, the codebase
//! context snapshot, and the resilience kit (circuit breaker, full-jitter
//! backoff, tool-category timeouts).

#![forbid(unsafe_code)]

pub mod config;
pub mod context;
pub mod error;
pub mod resilience;

pub use config::Config;
pub use context::{CodebaseContext, CodebaseStats, Hotspot};
pub use error::{GatewayError, GatewayResult, ValidationIssue};
