//! The opaque issuance function.
//!
//! Token minting is external to this system; the engine only observes its
//! effects on the response channel. [`Issuer`] is the seam a real backend
//! would implement. [`SimulatedIssuer`] reproduces the reference
//! behavior: a random delay followed by a constant token, with an
//! optional failure rate for exercising the timeout path.

use async_trait::async_trait;
use core::time::Duration;
use tokenrelay_core::{Error, Result};

/// An opaque token issuance backend.
#[async_trait]
pub trait Issuer: Send + Sync {
    /// Mints a token for `user` given `credential`.
    async fn issue(&self, user: &str, credential: &str) -> Result<String>;
}

/// Latency-and-failure simulation of a real issuance backend.
pub struct SimulatedIssuer {
    min_delay: Duration,
    max_delay: Duration,
    failure_rate: f64,
}

impl SimulatedIssuer {
    /// Simulates issuance latency uniformly drawn from `min..=max`.
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay,
            max_delay,
            failure_rate: 0.0,
        }
    }

    /// Fraction of requests (0.0..=1.0) that fail instead of issuing.
    pub fn with_failure_rate(mut self, failure_rate: f64) -> Self {
        self.failure_rate = failure_rate.clamp(0.0, 1.0);
        self
    }
}

impl Default for SimulatedIssuer {
    /// The reference simulation: 1-5 seconds of latency, no failures.
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(5))
    }
}

#[async_trait]
impl Issuer for SimulatedIssuer {
    async fn issue(&self, user: &str, _credential: &str) -> Result<String> {
        // Draw before the await: the thread-local rng is not Send.
        let (delay_ms, failed) = {
            let mut rng = rand::rng();
            use rand::Rng;
            let min = self.min_delay.as_millis() as u64;
            let max = self.max_delay.as_millis() as u64;
            let delay_ms = rng.random_range(min..=max);
            let failed = self.failure_rate > 0.0 && rng.random_bool(self.failure_rate);
            (delay_ms, failed)
        };

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;

        if failed {
            return Err(Error::Issuance {
                context: format!("simulated issuance failure for user {user}"),
            });
        }
        Ok("TOKEN".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn zero_delay_issuer_returns_the_constant_token() {
        let issuer = SimulatedIssuer::new(Duration::ZERO, Duration::ZERO);
        let token = issuer.issue("alice", "s3cret").await.unwrap();
        assert_eq!(token, "TOKEN");
    }

    #[tokio::test]
    async fn certain_failure_rate_always_fails() {
        let issuer =
            SimulatedIssuer::new(Duration::ZERO, Duration::ZERO).with_failure_rate(1.0);
        assert!(issuer.issue("alice", "s3cret").await.is_err());
    }
}
