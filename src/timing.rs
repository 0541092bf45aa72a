//! Refresh-interval randomisation (`spec.md` §4.1 "Refresh scheduling").
//!
//! Every subscriber independently re-subscribes somewhere inside a window
//! derived from the granted Expires, rather than all at `Expires - 5`, so
//! that a large population of subscribers to the same resource does not
//! refresh in lockstep and spike the notifier.

use rand::Rng;
use std::time::Duration;

/// Compute the delay before a refresh SUBSCRIBE should be sent, given the
/// granted `expires` in seconds.
///
/// For `expires >= 140`: uniform in `[expires/2, expires - 70]`.
/// For `expires < 140`: fixed at `expires - 5` (saturating at 0).
pub fn refresh_delay(expires: u32) -> Duration {
    if expires >= 140 {
        let low = expires / 2;
        let high = expires - 70;
        let secs = if low >= high {
            low
        } else {
            rand::thread_rng().gen_range(low..=high)
        };
        Duration::from_secs(secs as u64)
    } else {
        Duration::from_secs(expires.saturating_sub(5) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_expires_uses_fixed_tail() {
        assert_eq!(refresh_delay(30), Duration::from_secs(25));
        assert_eq!(refresh_delay(5), Duration::from_secs(0));
    }

    #[test]
    fn long_expires_window_bounds_hold_across_many_trials() {
        for expires in [140, 200, 900, 3600, 86400] {
            for _ in 0..500 {
                let d = refresh_delay(expires).as_secs() as u32;
                assert!(d >= expires / 2, "delay {d} below E/2 for E={expires}");
                assert!(d <= expires - 70, "delay {d} above E-70 for E={expires}");
            }
        }
    }

    #[test]
    fn boundary_expires_140_is_stable() {
        // E/2 = 70, E-70 = 70: window collapses to a single point.
        assert_eq!(refresh_delay(140), Duration::from_secs(70));
    }
}
