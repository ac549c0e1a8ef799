//! 网关配置：环境变量、YAML 与构建器三种来源。
//!
//! [`GatewayConfig`] collects every tunable of the gateway: provider
//! credentials and model names, the request deadline, retry/backoff shape,
//! breaker tuning ([`BreakerConfig`]) and guardrail settings
//! ([`SafetyConfig`]). Values come from the process environment
//! ([`GatewayConfig::from_env`]), a YAML document
//! ([`GatewayConfig::from_yaml_str`]) or the `with_*` builder methods.

use crate::guardrails::SafetyConfig;
use crate::resilience::circuit_breaker::BreakerConfig;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::time::Duration;

const DEFAULT_TEXT_MODEL: &str = "gemini-1.5-pro";
const DEFAULT_VISION_MODEL: &str = "gemini-2.5-flash-image-preview";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_BACKOFF_BASE_SECS: f64 = 0.6;
const DEFAULT_BACKOFF_MAX_SECS: f64 = 4.0;
const DEFAULT_BACKOFF_JITTER_SECS: f64 = 0.2;

/// Provider API key that never shows up in `Debug` output or logs.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into().trim().to_string())
    }

    /// Raw key value; only for placing on the wire.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("ApiKey(<unset>)")
        } else {
            f.write_str("ApiKey([REDACTED])")
        }
    }
}

/// Full gateway configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub api_key: ApiKey,
    pub text_model: String,
    pub vision_model: String,
    #[serde(deserialize_with = "de_secs")]
    pub request_timeout: Duration,
    pub max_retries: u32,
    #[serde(deserialize_with = "de_secs")]
    pub backoff_base: Duration,
    #[serde(deserialize_with = "de_secs")]
    pub backoff_max: Duration,
    #[serde(deserialize_with = "de_secs")]
    pub backoff_jitter: Duration,
    pub breaker: BreakerConfig,
    pub safety: SafetyConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_key: ApiKey::default(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            vision_model: DEFAULT_VISION_MODEL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: Duration::from_secs_f64(DEFAULT_BACKOFF_BASE_SECS),
            backoff_max: Duration::from_secs_f64(DEFAULT_BACKOFF_MAX_SECS),
            backoff_jitter: Duration::from_secs_f64(DEFAULT_BACKOFF_JITTER_SECS),
            breaker: BreakerConfig::default(),
            safety: SafetyConfig::default(),
        }
    }
}

impl GatewayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the process environment, then validate.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable lookup (the environment in production,
    /// a map in tests). Unset or blank variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut cfg = Self::default();
        if let Some(key) = get("GEMINI_API_KEY") {
            cfg.api_key = ApiKey::new(key);
        }
        if let Some(model) = get("GEMINI_TEXT_MODEL") {
            cfg.text_model = model;
        }
        if let Some(model) = get("GEMINI_VISION_MODEL") {
            cfg.vision_model = model;
        }
        if let Some(raw) = get("AI_REQUEST_TIMEOUT") {
            cfg.request_timeout = parse_secs("AI_REQUEST_TIMEOUT", &raw)?;
        }
        if let Some(raw) = get("AI_MAX_RETRIES") {
            cfg.max_retries = parse_u32("AI_MAX_RETRIES", &raw)?;
        }
        if let Some(raw) = get("AI_BACKOFF_BASE") {
            cfg.backoff_base = parse_secs("AI_BACKOFF_BASE", &raw)?;
        }
        if let Some(raw) = get("AI_BACKOFF_MAX") {
            cfg.backoff_max = parse_secs("AI_BACKOFF_MAX", &raw)?;
        }
        if let Some(raw) = get("AI_BACKOFF_JITTER") {
            cfg.backoff_jitter = parse_secs("AI_BACKOFF_JITTER", &raw)?;
        }
        if let Some(raw) = get("AI_BREAKER_FAILURE_THRESHOLD") {
            cfg.breaker.failure_threshold = parse_u32("AI_BREAKER_FAILURE_THRESHOLD", &raw)?;
        }
        if let Some(raw) = get("AI_BREAKER_BASE_COOLDOWN_S") {
            cfg.breaker.base_cooldown = parse_secs("AI_BREAKER_BASE_COOLDOWN_S", &raw)?;
        }
        if let Some(raw) = get("AI_BREAKER_MAX_COOLDOWN_S") {
            cfg.breaker.max_cooldown = parse_secs("AI_BREAKER_MAX_COOLDOWN_S", &raw)?;
        }
        if let Some(raw) = get("AI_BREAKER_HALF_OPEN_INTERVAL_S") {
            cfg.breaker.half_open_probe_interval =
                parse_secs("AI_BREAKER_HALF_OPEN_INTERVAL_S", &raw)?;
        }
        if let Some(raw) = get("AI_BREAKER_REOPEN_JITTER_S") {
            cfg.breaker.reopen_jitter = parse_secs("AI_BREAKER_REOPEN_JITTER_S", &raw)?;
        }
        if let Some(raw) = get("AI_LOG_RATE_LIMIT_S") {
            cfg.breaker.log_rate_limit = parse_secs("AI_LOG_RATE_LIMIT_S", &raw)?;
        }
        if let Some(raw) = get("ENABLE_SAFETY_FILTERS") {
            cfg.safety.enable_filters = parse_bool("ENABLE_SAFETY_FILTERS", &raw)?;
        }
        if let Some(raw) = get("CRISIS_WORDS") {
            cfg.safety.crisis_words = raw
                .split(',')
                .map(|w| w.trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect();
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a YAML document; missing fields keep their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let cfg: Self = serde_yaml::from_str(yaml).map_err(|e| {
            Error::config(format!("invalid gateway config: {}", e))
                .with_context(ErrorContext::new().with_source("config"))
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(Error::config("max_retries must be greater than 0"));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::config("request_timeout must be greater than 0"));
        }
        if self.backoff_max < self.backoff_base {
            return Err(Error::config("backoff_max must be >= backoff_base"));
        }
        self.breaker.validate()
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = ApiKey::new(key);
        self
    }

    pub fn with_text_model(mut self, model: impl Into<String>) -> Self {
        self.text_model = model.into();
        self
    }

    pub fn with_vision_model(mut self, model: impl Into<String>) -> Self {
        self.vision_model = model.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_backoff(mut self, base: Duration, max: Duration, jitter: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_max = max;
        self.backoff_jitter = jitter;
        self
    }

    pub fn with_breaker(mut self, breaker: BreakerConfig) -> Self {
        self.breaker = breaker;
        self
    }

    pub fn with_safety(mut self, safety: SafetyConfig) -> Self {
        self.safety = safety;
        self
    }
}

/// Deserialize a (possibly fractional) number of seconds into a `Duration`.
pub(crate) fn de_secs<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(secs).map_err(|_| {
        serde::de::Error::custom(format!(
            "expected a non-negative number of seconds in range, got {}",
            secs
        ))
    })
}

fn parse_u32(name: &str, raw: &str) -> Result<u32> {
    raw.parse::<u32>()
        .map_err(|_| Error::config(format!("{} must be a non-negative integer, got '{}'", name, raw)))
}

fn parse_secs(name: &str, raw: &str) -> Result<Duration> {
    raw.parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| {
            Error::config(format!(
                "{} must be a non-negative number of seconds in range, got '{}'",
                name, raw
            ))
        })
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::config(format!("{} must be a boolean, got '{}'", name, raw))),
    }
}
