use std::time::Duration;

use rand::Rng;

/// Exponential backoff with full jitter, capped.
///
/// `attempt` is zero-based: the delay before the second try is drawn from
/// `0..=base`, before the third from `0..=2*base`, and so on.
pub fn backoff_delay(attempt: u32, base: Duration, cap: Duration) -> Duration {
    let exp = base.saturating_mul(1u32 << attempt.min(16));
    let ceiling = exp.min(cap);
    if ceiling.is_zero() {
        return Duration::ZERO;
    }
    let mut rng = rand::rng();
    Duration::from_millis(rng.random_range(0..=ceiling.as_millis() as u64))
}
