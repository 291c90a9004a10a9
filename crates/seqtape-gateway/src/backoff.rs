//! Reconnect backoff schedule.

use std::time::Duration;

const BASE_DELAY: Duration = Duration::from_secs(1);
const MAX_DELAY: Duration = Duration::from_secs(60);

/// `min(1s * 2^retry, 60s)`. Negative retry counts fall back to the base
/// delay; counts above 30 are clamped before the shift can overflow.
pub fn backoff_delay(retry: i32) -> Duration {
    if retry < 0 {
        return BASE_DELAY;
    }
    if retry > 30 {
        return MAX_DELAY;
    }
    let backoff = BASE_DELAY.saturating_mul(1u32 << retry);
    backoff.min(MAX_DELAY)
}
