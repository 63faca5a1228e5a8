//! Exponential backoff with jitter

use std::time::Duration;

use rand::Rng;

/// Base delay for the first retry
pub const BASE_DELAY: Duration = Duration::from_millis(1000);

/// Upper bound on any single backoff delay
pub const MAX_DELAY: Duration = Duration::from_secs(30);

/// Relative jitter applied to the exponential delay
pub const JITTER_RATIO: f64 = 0.25;

/// Delay before the retry with 0-based index `retry_index`
///
/// `2^retry_index * 1000ms ± 25%`, capped at 30s. `floor` (used for rate
/// limits) is applied last so it is never undercut by jitter.
pub fn backoff_delay(retry_index: u32, floor: Option<Duration>) -> Duration {
    let jitter = rand::thread_rng().gen_range(-JITTER_RATIO..=JITTER_RATIO);
    delay_with_jitter(retry_index, jitter, floor)
}

/// Deterministic core of [`backoff_delay`]; `jitter` is a ratio in `[-0.25, 0.25]`
pub fn delay_with_jitter(retry_index: u32, jitter: f64, floor: Option<Duration>) -> Duration {
    let exponent = retry_index.min(16);
    let base_ms = BASE_DELAY.as_millis() as f64 * f64::from(1u32 << exponent);
    let jittered_ms = (base_ms * (1.0 + jitter.clamp(-JITTER_RATIO, JITTER_RATIO))).max(0.0);

    let delay = Duration::from_millis(jittered_ms as u64).min(MAX_DELAY);
    match floor {
        Some(floor) => delay.max(floor.min(MAX_DELAY)),
        None => delay,
    }
}
