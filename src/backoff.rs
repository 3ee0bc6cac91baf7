//! Reconnect delay policies for the connection loop.

use std::time::Duration;

/// Decides how long the connection loop waits after a failed connect.
///
/// `attempt` counts consecutive failures and starts at 0. It resets once a
/// connect succeeds.
pub trait ReconnectStrategy: Send + Sync {
    fn next_delay(&self, attempt: u32) -> Duration;
}

/// The same delay after every failure.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl ReconnectStrategy for FixedDelay {
    fn next_delay(&self, _attempt: u32) -> Duration {
        self.0
    }
}

/// `initial * factor^attempt`, capped at `max`.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    pub initial: Duration,
    pub max: Duration,
    pub factor: f64,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(30),
            factor: 2.0,
        }
    }
}

impl ReconnectStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Duration {
        let initial = self.initial.as_secs_f64();
        let max = self.max.as_secs_f64();
        let delay = (initial * self.factor.max(1.0).powf(f64::from(attempt))).min(max);
        Duration::from_secs_f64(delay)
    }
}

