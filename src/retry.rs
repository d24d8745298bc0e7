//! Bounded retry and failure-streak bookkeeping for remote calls.

use std::time::Duration;

/// How many times to try a remote read and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    /// No waiting between attempts
    pub const fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO)
    }

    /// Delay before retrying after the given (1-based) failed attempt
    pub fn delay_after(&self, attempt: u32) -> Duration {
        bounded_exponential_backoff(self.base_delay, attempt.saturating_sub(1), self.max_delay)
    }
}

/// `base * 2^streak`, capped at `cap` (never below `base`)
pub fn bounded_exponential_backoff(base: Duration, streak: u32, cap: Duration) -> Duration {
    if base.is_zero() {
        return Duration::ZERO;
    }
    let clamped = streak.min(16);
    base.saturating_mul(1u32 << clamped).min(cap.max(base))
}

/// Counts consecutive failures and decides when to raise an alert.
#[derive(Debug, Clone)]
pub struct FailureStreak {
    count: u32,
    escalate_after: u32,
}

impl FailureStreak {
    /// `escalate_after == 0` disables escalation
    pub fn new(escalate_after: u32) -> Self {
        Self {
            count: 0,
            escalate_after,
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Record a failure; returns true when this failure should be escalated.
    ///
    /// Fires when the streak first reaches the threshold and again every
    /// `escalate_after` failures after that.
    pub fn record_failure(&mut self) -> bool {
        self.count = self.count.saturating_add(1);
        self.escalate_after > 0 && self.count % self.escalate_after == 0
    }

    /// Clear the streak, returning how long it was
    pub fn reset(&mut self) -> u32 {
        std::mem::take(&mut self.count)
    }
}
