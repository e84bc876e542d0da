//! Exponential backoff schedule for push export retries.
//!
//! Transport agnostic and clock free: callers pass the elapsed time since the
//! first attempt, so the schedule can be driven by a real or a fake clock.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub initial_interval: Duration,
    pub multiplier: f64,
    pub max_interval: Duration,
    /// Total retry budget for one batch. Past it the batch is given up.
    pub max_elapsed_time: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(5),
            multiplier: 1.5,
            max_interval: Duration::from_secs(30),
            max_elapsed_time: Duration::from_secs(60),
        }
    }
}

impl BackoffPolicy {
    /// Fresh schedule for one batch.
    pub fn start(&self) -> Backoff {
        Backoff {
            policy: *self,
            next: self.initial_interval.min(self.max_interval),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    next: Duration,
}

impl Backoff {
    /// Delay before the next attempt, or `None` once waiting it would exceed
    /// the elapsed-time budget.
    pub fn next_delay(&mut self, elapsed: Duration) -> Option<Duration> {
        let delay = self.next;
        if elapsed.saturating_add(delay) > self.policy.max_elapsed_time {
            return None;
        }
        let grown = delay.as_secs_f64() * self.policy.multiplier.max(1.0);
        self.next = Duration::try_from_secs_f64(grown)
            .unwrap_or(self.policy.max_interval)
            .min(self.policy.max_interval);
        Some(delay)
    }
}
