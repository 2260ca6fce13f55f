//! Full-jitter exponential backoff for peer reconnects.

use std::time::Duration;

use rand::Rng;

/// Base delay before jitter.
pub const BASE_DELAY: Duration = Duration::from_millis(500);

/// Cap on the exponential component.
pub const MAX_DELAY: Duration = Duration::from_secs(60);

/// Compute the delay before reconnect attempt `attempt` (0-based).
///
/// Full jitter: uniform in `[0, min(MAX_DELAY, BASE_DELAY * 2^attempt)]`.
/// The uniform draw (rather than a +/- percentage) keeps simultaneously
/// reconnecting peers from thundering in lockstep.
pub fn full_jitter_delay(attempt: u32) -> Duration {
    let ceiling = backoff_ceiling(attempt);
    if ceiling.is_zero() {
        return Duration::ZERO;
    }
    let millis = rand::thread_rng().gen_range(0..=ceiling.as_millis() as u64);
    Duration::from_millis(millis)
}

/// The cap the jittered delay is drawn under, exposed for logging the
/// expected reconnect window.
pub fn backoff_ceiling(attempt: u32) -> Duration {
    let exp = BASE_DELAY.saturating_mul(2u32.saturating_pow(attempt.min(31)));
    exp.min(MAX_DELAY)
}
