//! Restart back-off policy for supervised workload services.

use std::time::Duration;

/// A fixed or exponential back-off schedule. Used by the Workload Runner's
/// worker service definitions (`spec.md` §4.5: "restarted with a 5 s
/// back-off").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    base_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f64,
}

impl RetryPolicy {
    /// A constant delay between restart attempts, with no growth.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            base_delay: delay,
            max_delay: delay,
            backoff_multiplier: 1.0,
        }
    }

    /// Delay that doubles on each attempt, capped at `max_delay`.
    pub fn exponential(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            backoff_multiplier: 2.0,
        }
    }

    /// Delay before the `attempt`-th restart (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let scaled = self.base_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_secs_f64(scaled.min(self.max_delay.as_secs_f64()))
    }
}

impl Default for RetryPolicy {
    /// The Workload Runner's default: worker services restart after a flat
    /// 5 s back-off (`spec.md` §4.5).
    fn default() -> Self {
        Self::fixed(Duration::from_secs(5))
    }
}
