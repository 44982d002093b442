//! Exponential backoff schedule
//!
//! The schedule is a pure function of the attempt number so polling loops can
//! be tested without sleeping. There is no jitter: the only caller polls a
//! single replication endpoint.

use std::time::Duration;

/// Bounded exponential backoff
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Backoff {
    /// Maximum number of attempts
    pub max_attempts: u32,
    /// Delay after the first attempt; doubles after every further attempt
    pub base: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            max_attempts: 13,
            base: Duration::from_millis(1),
        }
    }
}

impl Backoff {
    /// Delay to sleep after the given zero-based attempt
    pub fn delay(&self, attempt: u32) -> Duration {
        backoff_delay(attempt, self.base)
    }

    /// Every delay of the schedule, in order
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_attempts).map(|a| self.delay(a))
    }

    /// Sum of every delay of the schedule
    pub fn total(&self) -> Duration {
        self.delays().sum()
    }
}

/// `base * 2^attempt`, saturating instead of overflowing
pub fn backoff_delay(attempt: u32, base: Duration) -> Duration {
    let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    base.saturating_mul(factor)
}
