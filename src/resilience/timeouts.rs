//! Poll-driven timeout for stalled sends.
//!
//! The poll tick is the only clock a response sees. A peer that never opens
//! its receive window would otherwise pin the connection forever, so each
//! stream counts consecutive poll ticks without progress and gives up once the
//! configured limit is exceeded.

/// Counts poll ticks that made no progress.
#[derive(Debug, Clone)]
pub struct StallGuard {
    idle_ticks: u32,
    /// `0` means retry forever.
    max_idle_ticks: u32,
}

impl StallGuard {
    pub fn new(max_idle_ticks: u32) -> Self {
        Self {
            idle_ticks: 0,
            max_idle_ticks,
        }
    }

    /// Progress was made: bytes were written or acknowledged.
    pub fn reset(&mut self) {
        self.idle_ticks = 0;
    }

    /// Record a poll tick without progress. Returns true once the limit is exceeded.
    pub fn record_idle_tick(&mut self) -> bool {
        self.idle_ticks = self.idle_ticks.saturating_add(1);
        self.is_exhausted()
    }

    pub fn is_exhausted(&self) -> bool {
        self.max_idle_ticks != 0 && self.idle_ticks > self.max_idle_ticks
    }

    pub fn idle_ticks(&self) -> u32 {
        self.idle_ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trips_after_limit() {
        let mut guard = StallGuard::new(2);
        assert!(!guard.record_idle_tick());
        assert!(!guard.record_idle_tick());
        assert!(guard.record_idle_tick());
        assert_eq!(guard.idle_ticks(), 3);
    }

    #[test]
    fn progress_resets_the_count() {
        let mut guard = StallGuard::new(1);
        assert!(!guard.record_idle_tick());
        guard.reset();
        assert!(!guard.record_idle_tick());
        assert!(guard.record_idle_tick());
    }

    #[test]
    fn zero_limit_never_trips() {
        let mut guard = StallGuard::new(0);
        for _ in 0..1000 {
            assert!(!guard.record_idle_tick());
        }
    }
}
