//! Consecutive-failure circuit breaker.
//!
//! One process-global breaker wraps every backend call. Five consecutive
//! failures open it; after the reset window a single probe is admitted, and
//! the probe's outcome decides whether it closes again.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Failures in a row before the breaker opens.
pub const FAILURE_THRESHOLD: u32 = 5;

/// How long the breaker stays open before admitting a probe.
pub const RESET_TIMEOUT: Duration = Duration::from_secs(30);

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    /// True while the half-open probe is in flight.
    probe_in_flight: bool,
}

/// Circuit breaker guarding the backend.
///
/// Writes are serialized under a mutex so the consecutive-failure invariant
/// holds under concurrent calls.
#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<BreakerInner>,
    threshold: u32,
    reset_timeout: Duration,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self::with_settings(FAILURE_THRESHOLD, RESET_TIMEOUT)
    }

    /// Construct with explicit settings, used by tests to shrink the clock.
    pub fn with_settings(threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                probe_in_flight: false,
            }),
            threshold,
            reset_timeout,
        }
    }

    /// Ask to make a backend call.
    ///
    /// `Ok(())` admits the call (possibly as the half-open probe).
    /// `Err(retry_after_secs)` means the circuit is open and the caller must
    /// fail fast with `CIRCUIT_OPEN`.
    pub fn try_acquire(&self) -> Result<(), u64> {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => Ok(()),
            BreakerState::Open => {
                let opened_at = inner.opened_at.expect("open breaker has opened_at");
                let elapsed = opened_at.elapsed();
                if elapsed >= self.reset_timeout {
                    // Admit exactly one probe.
                    inner.state = BreakerState::HalfOpen;
                    inner.probe_in_flight = true;
                    Ok(())
                } else {
                    let remaining = self.reset_timeout - elapsed;
                    Err(remaining.as_secs().max(1))
                }
            }
            BreakerState::HalfOpen => {
                if inner.probe_in_flight {
                    // The probe decides the next state; everyone else waits.
                    Err(0)
                } else {
                    inner.probe_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    /// Record a successful backend call.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.state = BreakerState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.probe_in_flight = false;
    }

    /// Record a failed backend call.
    ///
    /// Validation and firewall rejections must never reach here; only calls
    /// that actually touched the backend (or timed out trying) count.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::HalfOpen => {
                // Probe failed: re-open and restart the reset clock.
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
                inner.probe_in_flight = false;
            }
            BreakerState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.threshold {
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            BreakerState::Open => {}
        }
    }

    /// Record a call whose outcome says nothing about backend health, e.g.
    /// one that failed before reaching the backend.
    ///
    /// Releases the half-open probe slot without deciding the state, so the
    /// next call probes again.
    pub fn record_aborted(&self) {
        let mut inner = self.inner.lock();
        if inner.state == BreakerState::HalfOpen {
            inner.probe_in_flight = false;
        }
    }

    /// Current state, for health reporting.
    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    /// Consecutive failure count, for health reporting.
    pub fn consecutive_failures(&self) -> u32 {
        self.inner.lock().consecutive_failures
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}
