//! Artificial response latency (§4.8.1). Grounded on
//! `mockforge-core::latency`'s fixed-vs-ranged delay resolution.

use rand::Rng;
use std::time::Duration;

use crate::model::Delay;

/// Resolve a `Delay` config to a concrete duration. `exact` wins if
/// non-zero; otherwise a uniform random value in `[min, max]` (clamped so
/// `min <= max`); if neither is set, no delay.
pub fn resolve(delay: &Delay) -> Duration {
    if delay.exact > 0 {
        return Duration::from_millis(delay.exact);
    }
    if delay.max > 0 {
        let (min, max) = if delay.min <= delay.max { (delay.min, delay.max) } else { (delay.max, delay.min) };
        let millis = if min == max { min } else { rand::rng().random_range(min..=max) };
        return Duration::from_millis(millis);
    }
    Duration::ZERO
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_wins_over_range() {
        let delay = Delay { exact: 50, min: 1, max: 2 };
        assert_eq!(resolve(&delay), Duration::from_millis(50));
    }

    #[test]
    fn ranged_delay_is_within_bounds() {
        let delay = Delay { exact: 0, min: 10, max: 20 };
        let d = resolve(&delay);
        assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(20));
    }

    #[test]
    fn no_delay_configured_is_zero() {
        let delay = Delay::default();
        assert_eq!(resolve(&delay), Duration::ZERO);
    }
}
