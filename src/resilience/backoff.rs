//! Exponential backoff with optional jitter.

use std::time::Duration;

use rand::Rng;

/// Delay before retrying after the attempt with index `attempt` failed.
///
/// The first retry (attempt 0) waits `base`, then `base * 2`, `base * 4`, …
/// capped at `max`. A `jitter_ratio` above zero adds up to that fraction of
/// the delay on top.
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration, jitter_ratio: f64) -> Duration {
    let factor = 2u32.saturating_pow(attempt);
    let delay = base.saturating_mul(factor).min(max);

    if jitter_ratio <= 0.0 || delay.is_zero() {
        return delay;
    }

    let jitter = rand::thread_rng().gen_range(0.0..=jitter_ratio.min(1.0));
    delay.saturating_add(delay.mul_f64(jitter))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_millis(100);
    const MAX: Duration = Duration::from_secs(2);

    #[test]
    fn test_backoff_doubles() {
        assert_eq!(calculate_backoff(0, BASE, MAX, 0.0), Duration::from_millis(100));
        assert_eq!(calculate_backoff(1, BASE, MAX, 0.0), Duration::from_millis(200));
        assert_eq!(calculate_backoff(2, BASE, MAX, 0.0), Duration::from_millis(400));
    }

    #[test]
    fn test_backoff_is_capped() {
        assert_eq!(calculate_backoff(10, BASE, MAX, 0.0), MAX);
        assert_eq!(calculate_backoff(u32::MAX, BASE, MAX, 0.0), MAX);
    }

    #[test]
    fn test_jitter_stays_in_range() {
        for _ in 0..100 {
            let delay = calculate_backoff(1, BASE, MAX, 0.1);
            assert!(delay >= Duration::from_millis(200));
            assert!(delay < Duration::from_millis(221));
        }
    }
}
