//! Restart schedule following the Luby sequence.

/// Element `i` (starting at one) of the Luby sequence `1, 1, 2, 1, 1, 2, 4, 1, ...`.
pub(crate) fn s_univ(mut i: u64) -> u64 {
    debug_assert!(i > 0);
    while i > 2 {
        let msb = u64::BITS - 1 - (i + 1).leading_zeros();
        if 1 << msb == i + 1 {
            return 1 << (msb - 1);
        }
        i -= (1 << msb) - 1;
    }
    1
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Restart {
    period: i64,
    /// Negative if restarts are disabled.
    conflicts_until_next_restart: i64,
    restart_count: u64,
}

impl Restart {
    /// Resets the schedule; a period of zero disables restarts.
    pub(crate) fn new(period: i64) -> Self {
        Self {
            period,
            conflicts_until_next_restart: if period > 0 { period } else { -1 },
            restart_count: 0,
        }
    }

    pub(crate) fn on_conflict(&mut self) {
        if self.conflicts_until_next_restart > 0 {
            self.conflicts_until_next_restart -= 1;
        }
    }

    /// Returns true once the conflict budget of the current run is used up and schedules the
    /// next run.
    pub(crate) fn should_do_restart(&mut self) -> bool {
        if self.conflicts_until_next_restart != 0 {
            return false;
        }
        self.restart_count += 1;
        let factor = i64::try_from(s_univ(self.restart_count + 1)).unwrap_or(i64::MAX);
        self.conflicts_until_next_restart = self.period.saturating_mul(factor);
        true
    }

    pub(crate) fn restart_count(&self) -> u64 {
        self.restart_count
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn luby_sequence() {
        let sequence: Vec<u64> = (1..=15).map(s_univ).collect();
        assert_eq!(sequence, vec![1, 1, 2, 1, 1, 2, 4, 1, 1, 2, 1, 1, 2, 4, 8]);
    }

    #[test]
    fn schedule() {
        let mut restart = Restart::new(2);
        assert!(!restart.should_do_restart());
        restart.on_conflict();
        restart.on_conflict();
        assert!(restart.should_do_restart());
        assert_eq!(restart.restart_count(), 1);
        // second run is 2 * s_univ(2) conflicts long, the third 2 * s_univ(3)
        restart.on_conflict();
        assert!(!restart.should_do_restart());
        restart.on_conflict();
        assert!(restart.should_do_restart());
        for _ in 0..3 {
            restart.on_conflict();
            assert!(!restart.should_do_restart());
        }
        restart.on_conflict();
        assert!(restart.should_do_restart());
    }

    #[test]
    fn disabled() {
        let mut restart = Restart::new(0);
        for _ in 0..100 {
            restart.on_conflict();
            assert!(!restart.should_do_restart());
        }
    }
}
