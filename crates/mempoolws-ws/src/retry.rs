//! Reconnect schedule: a fixed delay, forever.

use std::time::Duration;

use tokio_retry::strategy::FixedInterval;

/// Yields the delay before each reconnect attempt. Never exhausts and never
/// grows.
#[derive(Debug, Clone)]
pub struct ReconnectSchedule {
    delays: FixedInterval,
    attempts: u64,
}

impl ReconnectSchedule {
    pub fn new(delay: Duration) -> Self {
        Self {
            delays: FixedInterval::new(delay),
            attempts: 0,
        }
    }

    /// Delay before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        self.attempts += 1;
        // FixedInterval is an infinite iterator.
        self.delays.next().unwrap_or_default()
    }

    /// Number of delays handed out so far.
    pub fn attempts(&self) -> u64 {
        self.attempts
    }
}
