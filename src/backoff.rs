use rand::Rng;
use std::time::Duration;

/// Jittered exponential delay generator used between reconnect attempts.
///
/// Every call to [`delay`](Self::delay) bumps the retry counter and returns a
/// uniformly random value in `[0, base * 2^retries)`. Once the counter passes
/// `max_retries` it wraps back to 1. The base never changes, so a fresh
/// instance is the only way to start over from the smallest window.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base: Duration,
    max_retries: u32,
    retries: u32,
}

impl ExponentialBackoff {
    pub fn new(base: Duration, max_retries: u32) -> Self {
        Self {
            base,
            max_retries: max_retries.max(1),
            retries: 0,
        }
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Compute the next delay
    pub fn delay(&mut self) -> Duration {
        self.retries += 1;
        if self.retries > self.max_retries {
            self.retries = 1;
        }

        let upper = 2f64.powi(self.retries as i32);
        let factor = rand::rng().random_range(0.0..upper);
        self.base.mul_f64(factor)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), 20)
    }
}
