//! Consecutive-failure breaker.
//!
//! The upstream ID space is open-ended and sparse, so a sync run has no known
//! upper bound. It stops once a run of consecutive per-ID failures reaches a
//! per-kind threshold.

/// Outcome of recording one per-ID result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Keep going.
    Closed { consecutive_failures: u32 },
    /// Threshold reached; the run is exhausted.
    Open { consecutive_failures: u32 },
}

impl BreakerState {
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerState::Open { .. })
    }
}

/// Counts consecutive failures and trips at `max_consecutive_failures`.
#[derive(Debug, Clone)]
pub struct ConsecutiveFailureBreaker {
    max_consecutive_failures: u32,
    consecutive_failures: u32,
}

impl ConsecutiveFailureBreaker {
    /// A threshold of 0 is treated as 1: the first failure ends the run.
    pub fn new(max_consecutive_failures: u32) -> Self {
        Self {
            max_consecutive_failures: max_consecutive_failures.max(1),
            consecutive_failures: 0,
        }
    }

    pub fn threshold(&self) -> u32 {
        self.max_consecutive_failures
    }

    /// Current state without recording anything.
    pub fn check(&self) -> BreakerState {
        if self.consecutive_failures >= self.max_consecutive_failures {
            BreakerState::Open {
                consecutive_failures: self.consecutive_failures,
            }
        } else {
            BreakerState::Closed {
                consecutive_failures: self.consecutive_failures,
            }
        }
    }

    /// A successful ID resets the run.
    pub fn record_success(&mut self) -> BreakerState {
        self.consecutive_failures = 0;
        self.check()
    }

    pub fn record_failure(&mut self) -> BreakerState {
        self.consecutive_failures += 1;
        let state = self.check();
        if state.is_open() {
            log::debug!(
                "Breaker: OPEN after {} consecutive failures",
                self.consecutive_failures
            );
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trips_at_threshold() {
        let mut breaker = ConsecutiveFailureBreaker::new(3);
        assert!(!breaker.record_failure().is_open());
        assert!(!breaker.record_failure().is_open());
        assert_eq!(
            breaker.record_failure(),
            BreakerState::Open {
                consecutive_failures: 3
            }
        );
    }

    #[test]
    fn test_success_resets_the_run() {
        let mut breaker = ConsecutiveFailureBreaker::new(2);
        breaker.record_failure();
        assert_eq!(
            breaker.record_success(),
            BreakerState::Closed {
                consecutive_failures: 0
            }
        );
        assert!(!breaker.record_failure().is_open());
        assert!(breaker.record_failure().is_open());
    }

    #[test]
    fn test_zero_threshold_stops_on_first_failure() {
        let mut breaker = ConsecutiveFailureBreaker::new(0);
        assert_eq!(breaker.threshold(), 1);
        assert!(!breaker.check().is_open());
        assert!(breaker.record_failure().is_open());
    }
}
