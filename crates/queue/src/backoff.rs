use std::time::Duration;

/// Strategy for spacing retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffKind {
    /// Constant delay between attempts.
    Fixed,
    /// Delay doubles with every failed attempt.
    Exponential,
}

/// Retry delay schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub kind: BackoffKind,
}

impl Backoff {
    /// Creates an exponential backoff with the given base delay.
    pub fn exponential(base: Duration) -> Self {
        Self {
            base,
            kind: BackoffKind::Exponential,
        }
    }

    /// Creates a fixed backoff with the given delay.
    pub fn fixed(base: Duration) -> Self {
        Self {
            base,
            kind: BackoffKind::Fixed,
        }
    }

    /// Returns the delay before re-dispatching after the given failed attempt.
    ///
    /// `attempt` is 1-based: the first failed attempt waits `base`, the
    /// second `2 * base`, and so on for the exponential kind.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.kind {
            BackoffKind::Fixed => self.base,
            BackoffKind::Exponential => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                self.base.saturating_mul(factor)
            }
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::exponential(Duration::from_secs(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_schedule() {
        let backoff = Backoff::default();
        let delays: Vec<u64> = (1..=4).map(|a| backoff.delay_for(a).as_secs()).collect();
        assert_eq!(delays, vec![2, 4, 8, 16]);
    }

    #[test]
    fn test_fixed_schedule() {
        let backoff = Backoff::fixed(Duration::from_millis(500));
        assert_eq!(backoff.delay_for(1), Duration::from_millis(500));
        assert_eq!(backoff.delay_for(4), Duration::from_millis(500));
    }

    #[test]
    fn test_large_attempt_saturates() {
        let backoff = Backoff::exponential(Duration::from_secs(2));
        // Far past any realistic attempt cap; must not panic.
        let delay = backoff.delay_for(64);
        assert!(delay >= Duration::from_secs(2));
    }
}
