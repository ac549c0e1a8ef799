use std::sync::Arc;
use std::time::Duration;

use super::Gateway;
use crate::config::GatewayConfig;
use crate::provider::{GeminiProvider, Provider};
use crate::resilience::circuit_breaker::BreakerRegistry;
use crate::resilience::clock::Clock;
use crate::resilience::retry::{RetryPolicy, Sleeper, TokioSleeper};
use crate::{Error, Result};

/// Builder for [`Gateway`].
///
/// Without an explicit provider the gateway talks to Gemini using the
/// credentials from the config; tests inject a scripted provider, a manual
/// clock and a recording sleeper instead.
pub struct GatewayBuilder {
    config: GatewayConfig,
    provider: Option<Arc<dyn Provider>>,
    breakers: Option<Arc<BreakerRegistry>>,
    clock: Option<Arc<dyn Clock>>,
    sleeper: Arc<dyn Sleeper>,
    retry: Option<RetryPolicy>,
    timeout: Option<Duration>,
    /// Override base URL (primarily for testing with mock servers)
    base_url_override: Option<String>,
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self {
            config: GatewayConfig::default(),
            provider: None,
            breakers: None,
            clock: None,
            sleeper: Arc::new(TokioSleeper),
            retry: None,
            timeout: None,
            base_url_override: None,
        }
    }

    pub fn with_config(mut self, config: &GatewayConfig) -> Self {
        self.config = config.clone();
        self
    }

    /// Use a custom provider instead of Gemini.
    pub fn with_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Share a breaker registry across gateways.
    pub fn with_breakers(mut self, breakers: Arc<BreakerRegistry>) -> Self {
        self.breakers = Some(breakers);
        self
    }

    /// Clock for the breaker registry built by this builder.
    ///
    /// Ignored when a registry is supplied with [`Self::with_breakers`].
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Default per-call deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Override the Gemini endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url_override = Some(base_url.into());
        self
    }

    pub fn build(self) -> Result<Gateway> {
        self.config.validate()?;

        let provider: Arc<dyn Provider> = match self.provider {
            Some(p) => p,
            None => {
                let mut gemini = GeminiProvider::from_config(&self.config)?;
                if let Some(url) = self.base_url_override.as_deref() {
                    gemini = gemini.with_base_url(url)?;
                }
                Arc::new(gemini)
            }
        };

        let breakers = match (self.breakers, self.clock) {
            (Some(registry), _) => registry,
            (None, Some(clock)) => Arc::new(BreakerRegistry::with_clock(self.config.breaker.clone(), clock)),
            (None, None) => Arc::new(BreakerRegistry::new(self.config.breaker.clone())),
        };

        let timeout = self.timeout.unwrap_or(self.config.request_timeout);
        if timeout.is_zero() {
            return Err(Error::config("request timeout must be greater than 0"));
        }

        Ok(Gateway {
            provider,
            breakers,
            retry: self
                .retry
                .unwrap_or_else(|| RetryPolicy::from_config(&self.config)),
            sleeper: self.sleeper,
            default_timeout: timeout,
            text_model: self.config.text_model,
            vision_model: self.config.vision_model,
        })
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}
