use std::time::Duration;

use crate::client::config::BackoffConfig;

/// Exponential delay between reconnect attempts
///
/// Never gives up; the delay grows until it reaches the cap and stays there
/// until [`reset`](Self::reset).
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    initial_delay: Duration,
    multiplier: f64,
    max_delay: Duration,
    current_delay: Duration,
    attempts: u32,
}

impl ReconnectBackoff {
    pub fn new(config: &BackoffConfig) -> Self {
        let initial_delay = Duration::from_millis(config.initial_delay_ms);
        Self {
            initial_delay,
            multiplier: config.multiplier.max(1.0),
            max_delay: Duration::from_millis(config.max_delay_ms).max(initial_delay),
            current_delay: initial_delay,
            attempts: 0,
        }
    }

    /// Delay to wait now; advances the next one
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current_delay;
        self.attempts += 1;
        self.current_delay = Duration::try_from_secs_f64(self.current_delay.as_secs_f64() * self.multiplier)
            .map_or(self.max_delay, |next| next.min(self.max_delay));
        delay
    }

    /// Called once the game answers again
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.current_delay = self.initial_delay;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
