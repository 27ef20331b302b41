//! Retry delays for the accept loop.

use std::time::Duration;

/// Exponential back-off applied after accept errors.
///
/// The delay starts at `initial_delay`, doubles after every consecutive
/// failure and is capped at `max_delay`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use ackframe::server::BackoffConfig;
///
/// let backoff = BackoffConfig::default();
/// assert_eq!(backoff.initial_delay, Duration::from_millis(10));
/// assert_eq!(backoff.next_delay(Duration::from_millis(800)), Duration::from_secs(1));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
        }
    }
}

impl BackoffConfig {
    /// Clamp both delays to at least 1 ms and order them.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.initial_delay = self.initial_delay.max(Duration::from_millis(1));
        self.max_delay = self.max_delay.max(Duration::from_millis(1));
        if self.initial_delay > self.max_delay {
            std::mem::swap(&mut self.initial_delay, &mut self.max_delay);
        }
        self
    }

    /// Delay to use after another failure following `current`.
    #[must_use]
    pub fn next_delay(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max_delay)
    }
}
