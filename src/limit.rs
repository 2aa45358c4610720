use std::time::{Duration, Instant};

/// A wall clock deadline that is polled cooperatively by the search loop.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TimeLimit {
    start: Instant,
    deadline: Option<Instant>,
}

impl TimeLimit {
    /// A limit of `seconds` from now; non-finite or huge values never expire.
    pub(crate) fn new(seconds: f64) -> Self {
        let start = Instant::now();
        let deadline = Duration::try_from_secs_f64(seconds.max(0.0))
            .ok()
            .and_then(|duration| start.checked_add(duration));
        Self { start, deadline }
    }

    pub(crate) fn limit_reached(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn infinite_limit() {
        let limit = TimeLimit::new(f64::INFINITY);
        assert!(limit.deadline.is_none());
        assert!(!limit.limit_reached());
    }

    #[test]
    fn zero_limit() {
        assert!(TimeLimit::new(0.0).limit_reached());
        assert!(TimeLimit::new(-3.0).limit_reached());
    }
}
