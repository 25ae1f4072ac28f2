use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: u32,
    /// Fraction of the delay that is randomized, 0 disables jitter.
    pub jitter: f64,
}

impl ReconnectPolicy {
    /// Reconnect right away, every time.
    pub fn immediate() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1,
            jitter: 0.0,
        }
    }

    pub fn exponential(max_delay: Duration) -> Self {
        Self {
            max_delay,
            ..Self::default()
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            multiplier: 2,
            jitter: 0.2,
        }
    }
}

/// The first retry after a successful session is always immediate, consecutive failures back off
/// until [`Backoff::reset`] is called.
#[derive(Debug)]
pub struct Backoff {
    policy: ReconnectPolicy,
    attempt: u32,
}

impl Backoff {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn next_delay(&mut self) -> Duration {
        let attempt = self.attempt;
        self.attempt = self.attempt.saturating_add(1);

        if attempt == 0 || self.policy.max_delay.is_zero() {
            return Duration::ZERO;
        }

        let factor = self
            .policy
            .multiplier
            .max(1)
            .saturating_pow(attempt - 1);
        let delay = self
            .policy
            .initial_delay
            .saturating_mul(factor)
            .min(self.policy.max_delay);

        if self.policy.jitter <= 0.0 || delay.is_zero() {
            return delay;
        }

        let jitter = self.policy.jitter.min(1.0);
        let scale = rand::rng().random_range((1.0 - jitter)..=1.0);
        delay.mul_f64(scale)
    }
}
