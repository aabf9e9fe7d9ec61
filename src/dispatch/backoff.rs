//! Relaunch pacing for failed connections.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::RelaunchBackoff;

/// Exponential backoff with jitter, applied between consecutive gap-fill
/// relaunches. The first relaunch after a healthy stretch is immediate;
/// each consecutive one waits longer, capped at the configured maximum.
#[derive(Debug)]
pub(crate) struct Backoff {
    cfg: RelaunchBackoff,
    current_delay_ms: u64,
    consecutive: u32,
}

impl Backoff {
    pub(crate) fn new(cfg: RelaunchBackoff) -> Self {
        let initial = cfg.initial_delay_ms;
        Self {
            cfg,
            current_delay_ms: initial,
            consecutive: 0,
        }
    }

    /// Delay to apply before the next relaunch, advancing internal state.
    pub(crate) fn next_delay(&mut self) -> Duration {
        if self.consecutive == 0 {
            self.consecutive = 1;
            return Duration::ZERO;
        }
        self.consecutive = self.consecutive.saturating_add(1);
        let base = Duration::from_millis(self.current_delay_ms);
        let delay = base + Duration::from_millis(jitter_ms(base));
        let next = (self.current_delay_ms as f64 * self.cfg.multiplier) as u64;
        self.current_delay_ms = next.min(self.cfg.max_delay_ms);
        delay
    }

    /// Clear backoff state after a replacement survived its launch.
    pub(crate) fn reset(&mut self) {
        self.current_delay_ms = self.cfg.initial_delay_ms;
        self.consecutive = 0;
    }
}

/// Up to 20% jitter, sourced from the clock's sub-second noise so relaunch
/// storms against a recovering endpoint spread out.
fn jitter_ms(base: Duration) -> u64 {
    let range_ms = (base.as_millis() as u64) / 5;
    if range_ms == 0 {
        return 0;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos as u64) % (range_ms + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> RelaunchBackoff {
        RelaunchBackoff {
            initial_delay_ms: 100,
            max_delay_ms: 400,
            multiplier: 2.0,
        }
    }

    #[test]
    fn first_relaunch_is_immediate() {
        let mut b = Backoff::new(cfg());
        assert_eq!(b.next_delay(), Duration::ZERO);
    }

    #[test]
    fn consecutive_relaunches_grow_to_the_cap() {
        let mut b = Backoff::new(cfg());
        let in_range = |d: Duration, base_ms: u64| {
            let ms = d.as_millis() as u64;
            (base_ms..=base_ms + base_ms / 5).contains(&ms)
        };
        assert_eq!(b.next_delay(), Duration::ZERO);
        assert!(in_range(b.next_delay(), 100));
        assert!(in_range(b.next_delay(), 200));
        assert!(in_range(b.next_delay(), 400));
        assert!(in_range(b.next_delay(), 400)); // capped
    }

    #[test]
    fn reset_restores_immediate_relaunch() {
        let mut b = Backoff::new(cfg());
        b.next_delay();
        b.next_delay();
        b.reset();
        assert_eq!(b.next_delay(), Duration::ZERO);
    }

    #[test]
    fn zero_base_has_zero_jitter() {
        assert_eq!(jitter_ms(Duration::ZERO), 0);
    }
}
