//! Backoff policy for status polling.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the retry delay grows with consecutive poll failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// `base_delay` after every failure
    Fixed,
    /// `base_delay` doubled per consecutive failure, up to `max_delay`
    #[default]
    Exponential,
}

/// How long to wait before polling again after `n` consecutive failures.
///
/// Polling itself never gives up; the policy only spaces out attempts while
/// the backend is unreachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub strategy: BackoffStrategy,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::exponential(Duration::from_millis(2000), Duration::from_secs(30))
    }
}

impl PollPolicy {
    /// Same delay after every failure.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            base_delay: delay,
            max_delay: delay,
            strategy: BackoffStrategy::Fixed,
        }
    }

    pub fn exponential(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay: max_delay.max(base_delay),
            strategy: BackoffStrategy::Exponential,
        }
    }

    /// Delay after `failures` consecutive failed polls. Zero failures means no delay.
    pub fn delay_for_attempt(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        match self.strategy {
            BackoffStrategy::Fixed => self.base_delay,
            BackoffStrategy::Exponential => {
                // 2^31 already exceeds any sane cap, so larger shifts are pointless.
                let factor = 1u32 << (failures - 1).min(31);
                self.base_delay
                    .checked_mul(factor)
                    .map_or(self.max_delay, |d| d.min(self.max_delay))
            }
        }
    }
}
