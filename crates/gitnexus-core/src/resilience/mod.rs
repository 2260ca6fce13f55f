//! Resilience kit: circuit breaker, reconnect backoff, category timeouts.
//!
//! All three are process-global and immutable after init; the breaker's
//! interior state is the only mutation, serialized under its own mutex.

mod backoff;
mod breaker;

pub use backoff::{backoff_ceiling, full_jitter_delay, BASE_DELAY, MAX_DELAY};
pub use breaker::{BreakerState, CircuitBreaker, FAILURE_THRESHOLD, RESET_TIMEOUT};

use std::time::Duration;

use crate::config::Config;

/// Per-category deadlines for backend calls.
#[derive(Debug, Clone, Copy)]
pub struct ToolTimeouts {
    pub quick: Duration,
    pub heavy: Duration,
}

impl ToolTimeouts {
    pub fn from_config(config: &Config) -> Self {
        Self {
            quick: config.quick_timeout,
            heavy: config.heavy_timeout,
        }
    }
}
