//! Retry backoff for the gateway loop.
//!
//! The delay before attempt `n + 1` is
//! `min(backoff_max, backoff_base * 2^(n-1)) + uniform(0, jitter)`.
//! Sleeping goes through [`Sleeper`] so only the calling task waits and
//! tests can record the schedule instead of waiting it out.

use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;

use crate::config::GatewayConfig;

/// Awaits a backoff delay on the calling task.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Attempt budget and backoff shape.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&GatewayConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &GatewayConfig) -> Self {
        Self {
            max_retries: cfg.max_retries.max(1),
            backoff_base: cfg.backoff_base,
            backoff_max: cfg.backoff_max,
            jitter: cfg.backoff_jitter,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_max = max;
        self
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Deterministic part of the delay after the given (1-based) failed attempt.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let factor = 1u32 << exp;
        self.backoff_base
            .checked_mul(factor)
            .unwrap_or(self.backoff_max)
            .min(self.backoff_max)
    }

    /// Full delay including jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let extra = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ms)
        };
        self.base_delay(attempt) + Duration::from_millis(extra)
    }

    pub fn has_attempts_after(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}
